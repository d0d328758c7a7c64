pub mod callback;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod header;
pub mod io_utils;
pub mod reader;
pub mod result;
pub mod rows;
pub mod schema;
pub mod table;
pub mod transform;
pub mod unique;
pub mod validate;

use std::{env, io, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, ColumnsArgs, Commands, ValidateArgs};

pub use crate::{
    callback::{CallbackOutcome, Progress},
    config::{ExportConfig, ReaderConfig},
    error::{ConfigError, InputError, IntakeError},
    io_utils::{InputKind, InputSource, UploadDescriptor},
    reader::CsvReader,
    result::{FailureKind, ReadResult, ReadState, ValidationError},
    rows::Record,
    schema::{ColumnSpec, ColumnType},
    transform::Transform,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_intake", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(args) => handle_validate(&args),
        Commands::Columns(args) => handle_columns(&args),
    }
}

fn handle_validate(args: &ValidateArgs) -> Result<()> {
    let config = apply_overrides(
        ReaderConfig::load(&args.config)
            .with_context(|| format!("Loading reader config from {:?}", args.config))?,
        args,
    );
    let source = if args.input.as_os_str() == "-" {
        InputSource::stream(io::stdin())
    } else {
        InputSource::from(args.input.clone())
    };
    info!(
        "Validating {} against {} column(s) from {:?}",
        source.describe(),
        config.columns.len(),
        args.config
    );

    let result = CsvReader::new(config).read(source)?;
    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Serializing read result")?;
        println!("{json}");
    } else {
        print!("{}", table::render_report(&result, args.max_errors));
    }
    if !result.status {
        bail!("Validation failed: {}", result.error);
    }
    Ok(())
}

fn apply_overrides(mut config: ReaderConfig, args: &ValidateArgs) -> ReaderConfig {
    if let Some(delimiter) = args.delimiter {
        config.delimiter = delimiter;
    }
    if args.no_header {
        config.has_header = false;
    }
    if let Some(threshold) = args.error_threshold {
        config.error_threshold = threshold;
    }
    if let Some(label) = &args.input_encoding {
        config.encoding = Some(label.clone());
    }
    if args.export_dir.is_some() || args.export_name.is_some() {
        let mut export = config.export.take().unwrap_or_default();
        if let Some(directory) = &args.export_dir {
            export.directory = directory.clone();
        }
        if let Some(name) = &args.export_name {
            export.file_name = name.clone();
        }
        config.export = Some(export);
    }
    config
}

fn handle_columns(args: &ColumnsArgs) -> Result<()> {
    let config = ReaderConfig::load(&args.config)
        .with_context(|| format!("Loading reader config from {:?}", args.config))?;
    let resolved = config
        .resolve()
        .with_context(|| format!("Resolving columns from {:?}", args.config))?;
    print!("{}", table::render_columns(&resolved.schema));
    Ok(())
}

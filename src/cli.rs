use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Validate CSV uploads against a column schema", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate a CSV file against a reader configuration
    Validate(ValidateArgs),
    /// List the columns a reader configuration expects
    Columns(ColumnsArgs),
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Reader configuration (YAML) with the dialect and column definitions
    #[arg(short, long)]
    pub config: PathBuf,
    /// Input CSV file to validate ('-' reads from stdin)
    #[arg(short, long)]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<char>,
    /// Treat the first row as data and map fields by column position
    #[arg(long)]
    pub no_header: bool,
    /// Stop reading once this many errors have been reported
    #[arg(long)]
    pub error_threshold: Option<usize>,
    /// Directory for the failed-row export (enables the export)
    #[arg(long)]
    pub export_dir: Option<PathBuf>,
    /// File name for the failed-row export (enables the export)
    #[arg(long)]
    pub export_name: Option<String>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Print the full result as JSON instead of a table
    #[arg(long)]
    pub json: bool,
    /// Maximum number of error rows to print in table output
    #[arg(long, default_value_t = 50)]
    pub max_errors: usize,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Reader configuration (YAML) to describe
    #[arg(short, long)]
    pub config: PathBuf,
}

pub fn parse_delimiter(value: &str) -> Result<char, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok('\t'),
        "comma" | "," => Ok(','),
        "|" | "pipe" => Ok('|'),
        ";" | "semicolon" => Ok(';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names_and_single_characters() {
        assert_eq!(parse_delimiter("tab"), Ok('\t'));
        assert_eq!(parse_delimiter("semicolon"), Ok(';'));
        assert_eq!(parse_delimiter("#"), Ok('#'));
    }

    #[test]
    fn parse_delimiter_rejects_bad_input() {
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn cli_parses_validate_overrides() {
        let cli = Cli::try_parse_from([
            "csv-intake",
            "validate",
            "-c",
            "reader.yaml",
            "-i",
            "upload.csv",
            "--delimiter",
            "pipe",
            "--no-header",
            "--error-threshold",
            "3",
        ])
        .expect("parse args");
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate command");
        };
        assert_eq!(args.delimiter, Some('|'));
        assert!(args.no_header);
        assert_eq!(args.error_threshold, Some(3));
        assert!(!args.json);
    }
}

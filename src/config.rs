//! Reader configuration.
//!
//! [`ReaderConfig`] is an immutable value built once (from YAML or in code) and
//! handed to [`crate::reader::CsvReader`]. Nothing in it changes during a read;
//! per-read state lives in the read invocation itself.

use std::{fs::File, io::BufReader, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    io_utils::{self, CsvDialect},
    schema::{ColumnSpec, ResolvedSchema},
};

pub const DEFAULT_ERROR_THRESHOLD: usize = 1000;
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "ExportConfig::default_directory")]
    pub directory: PathBuf,
    #[serde(default = "ExportConfig::default_file_name")]
    pub file_name: String,
    /// Keep `rows_processed` in the result even though an export was written.
    #[serde(default)]
    pub keep_processed_rows: bool,
}

impl ExportConfig {
    fn default_directory() -> PathBuf {
        PathBuf::from("errors")
    }

    fn default_file_name() -> String {
        "rows_with_errors.csv".to_string()
    }

    pub fn new(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
            keep_processed_rows: false,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self::new(Self::default_directory(), Self::default_file_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    #[serde(default = "ReaderConfig::default_delimiter")]
    pub delimiter: char,
    #[serde(default = "ReaderConfig::default_enclosure")]
    pub enclosure: char,
    #[serde(default = "ReaderConfig::default_escape")]
    pub escape: Option<char>,
    #[serde(default = "ReaderConfig::default_has_header")]
    pub has_header: bool,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default = "ReaderConfig::default_error_threshold")]
    pub error_threshold: usize,
    /// Present when failed rows should be written to a downloadable file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportConfig>,
    #[serde(default = "ReaderConfig::default_progress_interval")]
    pub progress_interval: usize,
    /// Encoding label used when the input carries no UTF-8 BOM (defaults to utf-8).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            delimiter: Self::default_delimiter(),
            enclosure: Self::default_enclosure(),
            escape: Self::default_escape(),
            has_header: Self::default_has_header(),
            columns: Vec::new(),
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            export: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            encoding: None,
        }
    }
}

impl ReaderConfig {
    const fn default_delimiter() -> char {
        ','
    }

    const fn default_enclosure() -> char {
        '"'
    }

    const fn default_escape() -> Option<char> {
        Some('\\')
    }

    const fn default_has_header() -> bool {
        true
    }

    const fn default_error_threshold() -> usize {
        DEFAULT_ERROR_THRESHOLD
    }

    const fn default_progress_interval() -> usize {
        DEFAULT_PROGRESS_INTERVAL
    }

    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).context("Parsing reader config YAML")
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Parsing reader config YAML")
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_enclosure(mut self, enclosure: char) -> Self {
        self.enclosure = enclosure;
        self
    }

    pub fn with_escape(mut self, escape: Option<char>) -> Self {
        self.escape = escape;
        self
    }

    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn with_error_threshold(mut self, threshold: usize) -> Self {
        self.error_threshold = threshold;
        self
    }

    pub fn with_export(mut self, export: ExportConfig) -> Self {
        self.export = Some(export);
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    /// Validates every option and the column schema. Never touches the input.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        if self.progress_interval == 0 {
            return Err(ConfigError::InvalidProgressInterval);
        }
        Ok(ResolvedConfig {
            schema: ResolvedSchema::resolve(&self.columns)?,
            dialect: CsvDialect::new(self.delimiter, self.enclosure, self.escape)?,
            encoding: io_utils::resolve_encoding(self.encoding.as_deref())?,
        })
    }
}

/// Per-read validated view of a [`ReaderConfig`].
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema: ResolvedSchema,
    pub dialect: CsvDialect,
    pub encoding: &'static Encoding,
}

//! Error types for configuration, input acceptance, and callback failures.
//!
//! Configuration and input problems never escape [`crate::reader::CsvReader::read`]
//! as `Err`: they are folded into a `status = false` [`crate::result::ReadResult`].
//! Only [`IntakeError`] is returned to the caller, and only for conditions the
//! engine must not absorb.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "Column definition error: each column must have both a 'column_name' (the CSV header) and a 'name' (the key for the resulting record). Offending column #{position}: {spec}"
    )]
    IncompleteColumn { position: usize, spec: String },
    #[error("Column '{column}' declares an unknown rule '{token}'")]
    UnknownRule { column: String, token: String },
    #[error("Column '{column}' has a malformed rule '{token}': {reason}")]
    MalformedRule {
        column: String,
        token: String,
        reason: String,
    },
    #[error("The {option} must be a single ASCII character, got '{value}'")]
    InvalidCharacter { option: &'static str, value: char },
    #[error("Unknown input encoding '{0}'")]
    UnknownEncoding(String),
    #[error("The progress interval must be at least 1")]
    InvalidProgressInterval,
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("File does not exist: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Uploaded file is not a CSV. Please upload a valid CSV file.")]
    NotCsv,
    #[error("Failed to open file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read input stream: {0}")]
    Read(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Row callback failed on row {row}")]
    Callback {
        row: usize,
        #[source]
        source: anyhow::Error,
    },
}

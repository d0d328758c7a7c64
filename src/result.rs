//! The terminal read result and the aggregator that builds it row by row.

use std::path::PathBuf;

use serde::Serialize;

use crate::{callback::Progress, header::HeaderMismatch, io_utils::InputKind, rows::Record};

pub const TOO_MANY_ERRORS_MESSAGE: &str =
    "The uploaded file has too many errors. Please take time to review and try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub message: String,
    pub row: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Config,
    Header,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadState {
    /// Every row was read.
    Finalized,
    /// The error threshold stopped the scan early; results are partial.
    Aborted,
    Failed(FailureKind),
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadResult {
    pub status: bool,
    pub error: String,
    pub state: ReadState,
    pub input_type: InputKind,
    pub processed: usize,
    pub skipped: usize,
    pub errors: Vec<ValidationError>,
    pub rows_processed: Vec<Record>,
    pub rows_with_errors: Vec<Vec<String>>,
    pub total_error_rows: usize,
    pub error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_mismatch: Option<HeaderMismatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloadable: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_error: Option<String>,
}

impl ReadResult {
    fn empty(input_type: InputKind) -> Self {
        Self {
            status: false,
            error: String::new(),
            state: ReadState::Finalized,
            input_type,
            processed: 0,
            skipped: 0,
            errors: Vec::new(),
            rows_processed: Vec::new(),
            rows_with_errors: Vec::new(),
            total_error_rows: 0,
            error_count: 0,
            header_mismatch: None,
            downloadable: None,
            export_error: None,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.state == ReadState::Aborted
    }

    /// Messages reported against `row`, in the order they were raised.
    pub fn errors_for_row(&self, row: usize) -> impl Iterator<Item = &str> {
        self.errors
            .iter()
            .filter(move |error| error.row == row)
            .map(|error| error.message.as_str())
    }
}

/// Accumulates counts, errors, and output rows for a single read.
#[derive(Debug)]
pub(crate) struct ResultAggregator {
    result: ReadResult,
}

impl ResultAggregator {
    pub(crate) fn new(input_type: InputKind) -> Self {
        Self {
            result: ReadResult::empty(input_type),
        }
    }

    pub(crate) fn error_count(&self) -> usize {
        self.result.errors.len()
    }

    pub(crate) fn rows_with_errors(&self) -> &[Vec<String>] {
        &self.result.rows_with_errors
    }

    pub(crate) fn progress(&self, rows_read: usize) -> Progress {
        Progress {
            rows_read,
            processed: self.result.processed,
            error_count: self.error_count(),
            finished: false,
        }
    }

    /// Logs every message against `row` and keeps the raw row once.
    pub(crate) fn record_failed_row(&mut self, row: usize, messages: Vec<String>, raw: &[String]) {
        self.result.errors.extend(
            messages
                .into_iter()
                .map(|message| ValidationError { message, row }),
        );
        self.result.rows_with_errors.push(raw.to_vec());
        self.result.total_error_rows += 1;
    }

    pub(crate) fn record_processed(&mut self, record: Record) {
        self.result.rows_processed.push(record);
        self.result.processed += 1;
    }

    pub(crate) fn record_skipped(&mut self) {
        self.result.skipped += 1;
    }

    pub(crate) fn record_export(&mut self, outcome: anyhow::Result<PathBuf>, keep_processed: bool) {
        match outcome {
            Ok(path) => {
                self.result.downloadable = Some(path);
                if !keep_processed {
                    self.result.rows_processed = Vec::new();
                }
            }
            Err(err) => self.result.export_error = Some(format!("{err:#}")),
        }
    }

    pub(crate) fn fail(mut self, kind: FailureKind, message: impl Into<String>) -> ReadResult {
        self.result.status = false;
        self.result.error = message.into();
        self.result.state = ReadState::Failed(kind);
        self.settle()
    }

    pub(crate) fn fail_header(mut self, mismatch: HeaderMismatch) -> ReadResult {
        let message = mismatch.message.clone();
        self.result.header_mismatch = Some(mismatch);
        self.fail(FailureKind::Header, message)
    }

    pub(crate) fn abort(mut self) -> ReadResult {
        self.result.status = true;
        self.result.error = TOO_MANY_ERRORS_MESSAGE.to_string();
        self.result.state = ReadState::Aborted;
        self.settle()
    }

    pub(crate) fn finalize(mut self) -> ReadResult {
        self.result.status = true;
        self.result.state = ReadState::Finalized;
        self.settle()
    }

    fn settle(mut self) -> ReadResult {
        self.result.error_count = self.result.errors.len();
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|cell| cell.to_string()).collect()
    }

    #[test]
    fn failed_rows_are_stored_once_with_every_message() {
        let mut aggregator = ResultAggregator::new(InputKind::Stream);
        aggregator.record_failed_row(
            2,
            vec!["first".to_string(), "second".to_string()],
            &raw(&["a", "b"]),
        );
        let result = aggregator.finalize();
        assert!(result.status);
        assert_eq!(result.error_count, 2);
        assert_eq!(result.total_error_rows, 1);
        assert_eq!(result.rows_with_errors, vec![raw(&["a", "b"])]);
        assert_eq!(result.errors_for_row(2).collect::<Vec<_>>(), vec!["first", "second"]);
    }

    #[test]
    fn abort_is_a_successful_truncation() {
        let mut aggregator = ResultAggregator::new(InputKind::FilePath);
        aggregator.record_failed_row(2, vec!["bad".to_string()], &raw(&["x"]));
        let result = aggregator.abort();
        assert!(result.status);
        assert!(result.is_truncated());
        assert_eq!(result.error, TOO_MANY_ERRORS_MESSAGE);
        assert_eq!(result.error_count, 1);
    }

    #[test]
    fn export_drops_processed_rows_unless_kept() {
        let mut aggregator = ResultAggregator::new(InputKind::FilePath);
        aggregator.record_processed(Record::from_pairs(2, [("a", "1")]));
        aggregator.record_export(Ok(PathBuf::from("errors/out.csv")), false);
        let result = aggregator.finalize();
        assert_eq!(result.processed, 1);
        assert!(result.rows_processed.is_empty());
        assert_eq!(result.downloadable, Some(PathBuf::from("errors/out.csv")));
    }

    #[test]
    fn export_failure_does_not_change_status() {
        let mut aggregator = ResultAggregator::new(InputKind::FilePath);
        aggregator.record_processed(Record::from_pairs(2, [("a", "1")]));
        aggregator.record_export(Err(anyhow::anyhow!("disk full")), false);
        let result = aggregator.finalize();
        assert!(result.status);
        assert_eq!(result.rows_processed.len(), 1);
        assert_eq!(result.export_error.as_deref(), Some("disk full"));
    }

    #[test]
    fn failed_state_serializes_with_its_kind() {
        let result = ResultAggregator::new(InputKind::Upload).fail(FailureKind::Io, "boom");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["state"], serde_json::json!({"failed": "io"}));
        assert_eq!(json["input_type"], "upload");
        assert_eq!(json["status"], false);
    }
}

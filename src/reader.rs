//! The read engine.
//!
//! One call to [`CsvReader::read`] walks a single input through
//! `Init -> SchemaResolved -> HeaderReconciled -> Scanning` and ends in one of
//! `Finalized`, `Aborted` (error threshold reached), or `Failed` (config,
//! header, or I/O). Rows are pulled one at a time and fully resolved
//! (normalized, validated, handed to the callback, aggregated) before the next
//! is read. The uniqueness tracker and every counter are allocated per call, so
//! one configured reader can serve any number of reads.

use std::{fmt, io::Read, sync::Arc};

use anyhow::Result;
use csv::ByteRecord;
use log::{debug, info, warn};

use crate::{
    callback::{CallbackOutcome, Progress, ProgressCallback, ProgressReporter, RowCallback},
    config::{ReaderConfig, ResolvedConfig},
    error::IntakeError,
    export, header,
    io_utils::{self, InputSource, TrackedInput},
    result::{FailureKind, ReadResult, ResultAggregator},
    rows::{Normalized, Record, RecordSpan, RowNormalizer},
    unique::UniquenessTracker,
    validate,
};

/// Stops the scan once the running error count reaches the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreaker {
    threshold: usize,
}

impl CircuitBreaker {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Checked before each data row. A zero threshold trips on the first error.
    pub fn is_tripped(&self, error_count: usize) -> bool {
        error_count > 0 && error_count >= self.threshold
    }
}

#[derive(Clone)]
pub struct CsvReader {
    config: ReaderConfig,
    row_callback: Option<RowCallback>,
    progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for CsvReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvReader")
            .field("config", &self.config)
            .field("row_callback", &self.row_callback.is_some())
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl CsvReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self {
            config,
            row_callback: None,
            progress_callback: None,
        }
    }

    pub fn with_row_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Record, usize) -> Result<CallbackOutcome> + Send + Sync + 'static,
    {
        self.row_callback = Some(Arc::new(callback));
        self
    }

    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Reads one input to completion.
    ///
    /// Configuration, header, and I/O problems are reported through a
    /// `status = false` result. `Err` is returned only when the row callback
    /// itself fails.
    pub fn read(&self, source: impl Into<InputSource>) -> Result<ReadResult, IntakeError> {
        let source = source.into();
        let aggregator = ResultAggregator::new(source.kind());

        let resolved = match self.config.resolve() {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!("Rejecting read of {}: {err}", source.describe());
                return Ok(aggregator.fail(FailureKind::Config, err.to_string()));
            }
        };
        info!(
            "Reading {} (delimiter '{}', {} column(s))",
            source.describe(),
            io_utils::printable_delimiter(resolved.dialect.delimiter),
            resolved.schema.columns().len()
        );

        let (reader, encoding) =
            match io_utils::open_csv_source(source, resolved.dialect, resolved.encoding) {
                Ok(opened) => opened,
                Err(err) => {
                    warn!("{err}");
                    return Ok(aggregator.fail(FailureKind::Io, err.to_string()));
                }
            };
        debug!("Decoding input as {}", encoding.name());

        let scan = Scan {
            reader: self,
            resolved: &resolved,
            encoding,
            aggregator,
            tracker: UniquenessTracker::new(),
            progress: ProgressReporter::new(
                self.progress_callback.clone(),
                self.config.progress_interval,
            ),
        };
        scan.run(reader)
    }
}

/// Mutable state owned by one read invocation.
struct Scan<'a> {
    reader: &'a CsvReader,
    resolved: &'a ResolvedConfig,
    encoding: &'static encoding_rs::Encoding,
    aggregator: ResultAggregator,
    tracker: UniquenessTracker,
    progress: ProgressReporter,
}

impl Scan<'_> {
    fn run<R: Read>(
        mut self,
        mut csv: csv::Reader<TrackedInput<R>>,
    ) -> Result<ReadResult, IntakeError> {
        let reader = self.reader;
        let config = &reader.config;
        let breaker = CircuitBreaker::new(config.error_threshold);
        let mut record = ByteRecord::new();
        let mut raw_header: Option<Vec<String>> = None;

        let mut next_line = 1u64;

        let mut normalizer = if config.has_header {
            let header_row = match next_record(&mut csv, &mut record) {
                Ok(Some(span)) => {
                    next_line = span.next_line();
                    io_utils::decode_record(&record, self.encoding)
                }
                Ok(None) => Vec::new(),
                Err(err) => {
                    return Ok(self
                        .aggregator
                        .fail(FailureKind::Io, format!("Failed to read the header row: {err}")));
                }
            };
            match header::reconcile(&header_row, &self.resolved.schema) {
                Ok(header) => {
                    debug!(
                        "Header reconciled: {} column(s) across {} field(s)",
                        header.header_count(),
                        header.width()
                    );
                    raw_header = Some(header.raw().to_vec());
                    RowNormalizer::with_header(header)
                }
                Err(mismatch) => {
                    warn!("Header mismatch: {}", mismatch.message);
                    return Ok(self.aggregator.fail_header(mismatch));
                }
            }
        } else {
            RowNormalizer::positional(&self.resolved.schema)
        };

        let mut rows_read = 0usize;
        loop {
            let span = match next_record(&mut csv, &mut record) {
                Ok(Some(span)) => span,
                Ok(None) => break,
                Err(err) => {
                    let message =
                        format!("Failed to read row {}: {err}", csv.position().line());
                    warn!("{message}");
                    return Ok(self.aggregator.fail(FailureKind::Io, message));
                }
            };
            let start_line = span.start_line();
            let blank_lines = start_line.saturating_sub(next_line);
            next_line = span.next_line();
            let row_index = start_line as usize;

            if breaker.is_tripped(self.aggregator.error_count()) {
                warn!(
                    "Stopping at row {row_index}: {} error(s) reached the threshold of {}",
                    self.aggregator.error_count(),
                    config.error_threshold
                );
                self.progress.finish(self.aggregator.progress(rows_read));
                self.export(raw_header.as_deref());
                return Ok(self.aggregator.abort());
            }

            if normalizer.is_positional() {
                for _ in 0..blank_lines {
                    self.aggregator.record_skipped();
                }
            }
            rows_read += 1;
            let raw = io_utils::decode_record(&record, self.encoding);
            self.process_row(&mut normalizer, raw, row_index)?;
            self.progress.row_done(self.aggregator.progress(rows_read));
        }

        self.progress.finish(self.aggregator.progress(rows_read));
        self.export(raw_header.as_deref());
        let result = self.aggregator.finalize();
        info!(
            "Read finished: {} processed, {} skipped, {} failed row(s), {} error(s)",
            result.processed, result.skipped, result.total_error_rows, result.error_count
        );
        Ok(result)
    }

    fn process_row(
        &mut self,
        normalizer: &mut RowNormalizer,
        raw: Vec<String>,
        row: usize,
    ) -> Result<(), IntakeError> {
        match normalizer.normalize(&raw, row) {
            Normalized::Empty => {
                debug!("Row {row} is empty; skipped");
                self.aggregator.record_skipped();
            }
            Normalized::ShapeMismatch { expected, found } => {
                debug!("Row {row} has {found} field(s), expected {expected}");
                self.aggregator.record_failed_row(
                    row,
                    vec![Normalized::shape_message(expected, found)],
                    &raw,
                );
            }
            Normalized::Record(mut record) => {
                let errors =
                    validate::validate_record(&self.resolved.schema, &mut record, &mut self.tracker);
                if errors.is_empty() {
                    self.dispatch(record, row, &raw, normalizer.is_positional())?;
                } else {
                    debug!("Row {row} failed with {} error(s)", errors.len());
                    self.aggregator.record_failed_row(row, errors, &raw);
                }
            }
        }
        Ok(())
    }

    /// Hands a validated record to the row callback, if any, and aggregates the outcome.
    fn dispatch(
        &mut self,
        record: Record,
        row: usize,
        raw: &[String],
        positional: bool,
    ) -> Result<(), IntakeError> {
        let outcome = match &self.reader.row_callback {
            Some(callback) => {
                callback(&record, row).map_err(|source| IntakeError::Callback { row, source })?
            }
            None => CallbackOutcome::Accept,
        };
        let schema = &self.resolved.schema;
        match outcome {
            CallbackOutcome::Accept => {
                self.aggregator
                    .record_processed(record.into_output(schema, positional));
            }
            CallbackOutcome::AcceptModified(replacement) => {
                let unknown = replacement
                    .keys()
                    .filter(|key| schema.output_key(key).is_none())
                    .collect::<Vec<_>>();
                if !positional && !unknown.is_empty() {
                    warn!(
                        "Row {row}: dropping callback field(s) not keyed by a header name: {}",
                        unknown.join(", ")
                    );
                }
                let replacement = Record::from_pairs(row, replacement.iter());
                self.aggregator
                    .record_processed(replacement.into_output(schema, positional));
            }
            CallbackOutcome::Reject(messages) => {
                debug!("Row {row} rejected by callback");
                self.aggregator.record_failed_row(row, messages, raw);
            }
            CallbackOutcome::Skip => {
                debug!("Row {row} skipped by callback");
                self.aggregator.record_skipped();
            }
        }
        Ok(())
    }

    fn export(&mut self, header: Option<&[String]>) {
        let Some(export) = &self.reader.config.export else {
            return;
        };
        let outcome = export::write_error_rows(
            export,
            self.resolved.dialect,
            header,
            self.aggregator.rows_with_errors(),
        );
        if let Err(err) = &outcome {
            warn!("Could not write the error export: {err:#}");
        }
        self.aggregator
            .record_export(outcome, export.keep_processed_rows);
    }
}

/// Reads the next record and works out where it sat in the physical input.
fn next_record<R: Read>(
    csv: &mut csv::Reader<TrackedInput<R>>,
    record: &mut ByteRecord,
) -> csv::Result<Option<RecordSpan>> {
    let line_before = csv.position().line();
    if !csv.read_byte_record(record)? {
        return Ok(None);
    }
    let end = csv.position().clone();
    Ok(Some(RecordSpan {
        line_before,
        line_after: end.line(),
        embedded_newlines: record.as_slice().iter().filter(|byte| **byte == b'\n').count() as u64,
        ends_with_newline: csv.get_mut().newline_before(end.byte()),
    }))
}

//! Caller-supplied hooks: the per-row callback and the progress callback.

use std::{fmt, sync::Arc};

use anyhow::Result;
use serde::Serialize;

use crate::rows::Record;

/// What a row callback decided about a row that passed built-in validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CallbackOutcome {
    /// Keep the row unchanged.
    #[default]
    Accept,
    /// Keep the row, replacing its data before output mapping.
    ///
    /// The replacement must be keyed by header name (`column_name`), like the
    /// record the callback received. Other keys are dropped with a warning.
    AcceptModified(Record),
    /// Fail the row; every message is reported against it.
    Reject(Vec<String>),
    /// Drop the row without counting it as processed or errored.
    Skip,
}

impl CallbackOutcome {
    pub fn reject<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CallbackOutcome::Reject(messages.into_iter().map(Into::into).collect())
    }
}

/// Receives the validated record (keyed by header name) and its row index.
/// A returned error aborts the read and reaches the caller of `read`.
pub type RowCallback = Arc<dyn Fn(&Record, usize) -> Result<CallbackOutcome> + Send + Sync>;

/// Invoked synchronously on the reading thread.
pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    /// Data rows read so far (header excluded).
    pub rows_read: usize,
    pub processed: usize,
    pub error_count: usize,
    pub finished: bool,
}

/// Fires the progress callback every `interval` data rows and once at the end.
pub(crate) struct ProgressReporter {
    callback: Option<ProgressCallback>,
    interval: usize,
}

impl ProgressReporter {
    pub(crate) fn new(callback: Option<ProgressCallback>, interval: usize) -> Self {
        Self {
            callback,
            interval: interval.max(1),
        }
    }

    pub(crate) fn row_done(&self, progress: Progress) {
        if let Some(callback) = &self.callback
            && progress.rows_read % self.interval == 0
        {
            callback(&progress);
        }
    }

    pub(crate) fn finish(&self, progress: Progress) {
        if let Some(callback) = &self.callback {
            callback(&Progress {
                finished: true,
                ..progress
            });
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.callback.is_some())
            .field("interval", &self.interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_fires_on_interval_and_finish() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |progress: &Progress| {
            sink.lock().unwrap().push((progress.rows_read, progress.finished));
        });
        let reporter = ProgressReporter::new(Some(callback), 2);
        for rows_read in 1..=5 {
            reporter.row_done(Progress {
                rows_read,
                ..Progress::default()
            });
        }
        reporter.finish(Progress {
            rows_read: 5,
            ..Progress::default()
        });
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(2, false), (4, false), (5, true)]
        );
    }

    #[test]
    fn zero_interval_is_clamped() {
        let reporter = ProgressReporter::new(None, 0);
        assert_eq!(reporter.interval, 1);
    }

    #[test]
    fn reject_collects_messages() {
        assert_eq!(
            CallbackOutcome::reject(["Jane is not allowed"]),
            CallbackOutcome::Reject(vec!["Jane is not allowed".to_string()])
        );
    }
}

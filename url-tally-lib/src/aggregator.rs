//! Serialized result sink.
//!
//! All fetch tasks report through one [`Aggregator`]. A single mutex guards
//! the running total and the output writer together, so each `record` prints
//! its line and adds its count as one step: no interleaved lines and no lost
//! updates, whatever the scheduling.

use crate::types::{FetchOutcome, ReportFormat, TallySummary};
use serde_json::json;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

/// Running total plus the sink result lines are written to.
#[derive(Debug)]
pub struct Aggregator<W: Write + Send> {
    state: Mutex<AggregatorState<W>>,
    format: ReportFormat,
}

#[derive(Debug)]
struct AggregatorState<W> {
    total: u64,
    succeeded: usize,
    out: W,
}

impl<W: Write + Send> Aggregator<W> {
    pub fn new(out: W, format: ReportFormat) -> Self {
        Self {
            state: Mutex::new(AggregatorState {
                total: 0,
                succeeded: 0,
                out,
            }),
            format,
        }
    }

    /// Report one successful fetch.
    ///
    /// Never fails from the caller's point of view: a write error is logged and
    /// the count is still added.
    pub fn record(&self, url: &str, count: u64) {
        let mut state = self.lock();

        let line = match self.format {
            ReportFormat::Text => format!("Count for {}: {}", url, count),
            ReportFormat::Json => json!(FetchOutcome {
                url: url.to_string(),
                count,
            })
            .to_string(),
        };
        if let Err(e) = writeln!(state.out, "{}", line).and_then(|_| state.out.flush()) {
            tracing::warn!(url, error = %e, "failed to write result line");
        }

        state.total += count;
        state.succeeded += 1;
    }

    /// Running total so far.
    pub fn total(&self) -> u64 {
        self.lock().total
    }

    /// Number of `record` calls so far.
    pub fn succeeded(&self) -> usize {
        self.lock().succeeded
    }

    /// Write the final line for a drained run and return the completed summary.
    ///
    /// `total` and `succeeded` always come from the aggregator's own state;
    /// the caller only contributes what the dispatch loop counted itself.
    pub fn finish(&self, mut summary: TallySummary) -> TallySummary {
        let mut state = self.lock();
        summary.total = state.total;
        summary.succeeded = state.succeeded;

        let line = match self.format {
            ReportFormat::Text => format!("Total: {}", summary.total),
            ReportFormat::Json => json!(summary).to_string(),
        };
        if let Err(e) = writeln!(state.out, "{}", line).and_then(|_| state.out.flush()) {
            tracing::warn!(error = %e, "failed to write total line");
        }
        summary
    }

    /// Hand back the sink, e.g. to inspect captured output.
    pub fn into_inner(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .out
    }

    // A panic while holding the lock can only happen inside the writer, before
    // the total is touched, so the state behind a poisoned lock is consistent.
    fn lock(&self) -> MutexGuard<'_, AggregatorState<W>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

//! Dispatch loop.
//!
//! Reads input one line at a time, validates each line, takes an admission
//! permit and spawns a fetch task per URL. Reading stops at the sentinel or at
//! end of input; the loop then drains every spawned task before writing the
//! total.
//!
//! The loop only ever waits in two places: on the gate when every permit is
//! held, and on the join set while draining.

use crate::aggregator::Aggregator;
use crate::concurrent::AdmissionGate;
use crate::error::TallyError;
use crate::fetcher::{run_fetch_task, Fetcher};
use crate::types::{TallyConfig, TallySummary, SENTINEL};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::task::{JoinError, JoinSet};
use url::Url;

/// What a single input line means to the dispatch loop.
#[derive(Debug)]
pub enum LineKind {
    /// Empty line, ignored
    Blank,
    /// The `exit` token: stop reading
    Sentinel,
    /// Not something that can be fetched
    Invalid(TallyError),
    /// A URL ready for dispatch
    Url(Url),
}

/// Classify one input line (without its line terminator).
///
/// The sentinel must match exactly; `" exit"` or `"EXIT"` are treated like any
/// other line. Only `http` and `https` URLs are accepted.
pub fn classify_line(line: &str) -> LineKind {
    if line.is_empty() {
        return LineKind::Blank;
    }
    if line == SENTINEL {
        return LineKind::Sentinel;
    }

    match Url::parse(line) {
        Ok(url) => match url.scheme() {
            "http" | "https" => LineKind::Url(url),
            other => LineKind::Invalid(TallyError::unsupported_scheme(line, other)),
        },
        Err(e) => LineKind::Invalid(TallyError::invalid_url(line, e.to_string())),
    }
}

/// Longest accepted input line, terminator excluded.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Result of reading one bounded line.
#[derive(Debug, PartialEq, Eq)]
enum ReadLine {
    Eof,
    Line,
    TooLong,
}

/// Read one line into `buf`, holding at most `MAX_LINE_BYTES` plus the
/// terminator in memory. The tail of an over-long line is consumed and
/// discarded so the next read starts on a fresh line.
async fn read_line_capped<R: AsyncBufRead + Unpin>(
    input: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<ReadLine> {
    let limit = MAX_LINE_BYTES as u64 + 1;

    buf.clear();
    let read = (&mut *input).take(limit).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(ReadLine::Eof);
    }
    if buf.ends_with(b"\n") || buf.len() <= MAX_LINE_BYTES {
        return Ok(ReadLine::Line);
    }

    loop {
        buf.clear();
        let read = (&mut *input).take(limit).read_until(b'\n', buf).await?;
        if read == 0 || buf.ends_with(b"\n") {
            break;
        }
    }
    buf.clear();
    Ok(ReadLine::TooLong)
}

/// Strip the line terminator (`\n` or `\r\n`) and decode as UTF-8.
fn decode_line(raw: &[u8]) -> Result<&str, TallyError> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    std::str::from_utf8(raw).map_err(|e| TallyError::input(e.to_string()))
}

/// Drives a whole run: input in, result lines and total out.
///
/// The gate and the aggregator are shared with every fetch task for the
/// lifetime of the dispatcher.
pub struct Dispatcher<F: Fetcher, W: Write + Send + 'static> {
    config: TallyConfig,
    fetcher: Arc<F>,
    gate: AdmissionGate,
    aggregator: Arc<Aggregator<W>>,
}

impl<F: Fetcher, W: Write + Send + 'static> Dispatcher<F, W> {
    /// Create a dispatcher writing result lines to `out`.
    pub fn new(config: TallyConfig, fetcher: F, out: W) -> Self {
        let gate = AdmissionGate::new(config.concurrency);
        let aggregator = Arc::new(Aggregator::new(out, config.format));

        Self {
            config,
            fetcher: Arc::new(fetcher),
            gate,
            aggregator,
        }
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn aggregator(&self) -> &Arc<Aggregator<W>> {
        &self.aggregator
    }

    /// Process `input` until the sentinel or end of input, wait for every
    /// launched fetch, write the total line and return the run summary.
    ///
    /// Never fails: bad lines and failed fetches are logged and skipped. A read
    /// error on `input` ends reading as if input had been exhausted.
    pub async fn run<R: AsyncBufRead + Unpin>(&self, mut input: R) -> TallySummary {
        let target: Arc<str> = Arc::from(self.config.target.as_str());
        let mut tasks = JoinSet::new();
        let mut summary = TallySummary::default();
        let mut buf = Vec::new();

        loop {
            match read_line_capped(&mut input, &mut buf).await {
                Ok(ReadLine::Eof) => {
                    tracing::debug!("end of input");
                    break;
                }
                Ok(ReadLine::Line) => {}
                Ok(ReadLine::TooLong) => {
                    let e = TallyError::input(format!("line longer than {} bytes", MAX_LINE_BYTES));
                    tracing::warn!("{}", e);
                    summary.rejected += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "reading input failed, no further lines will be read");
                    break;
                }
            }

            let line = match decode_line(&buf) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("{}", e);
                    summary.rejected += 1;
                    continue;
                }
            };

            let url = match classify_line(line) {
                LineKind::Blank => continue,
                LineKind::Sentinel => {
                    tracing::debug!("sentinel read, no further lines will be read");
                    break;
                }
                LineKind::Invalid(e) => {
                    tracing::warn!("{}", e);
                    summary.rejected += 1;
                    continue;
                }
                LineKind::Url(url) => url,
            };

            let permit = self.gate.acquire().await;
            let raw = line.to_string();
            let fetcher = Arc::clone(&self.fetcher);
            let aggregator = Arc::clone(&self.aggregator);
            let target = Arc::clone(&target);

            tracing::debug!(url = %raw, in_flight = self.gate.in_flight(), "dispatching");
            tasks.spawn(async move {
                run_fetch_task(fetcher.as_ref(), &raw, &url, &target, &aggregator, permit).await
            });
            summary.dispatched += 1;

            // Reap whatever already finished so the set only holds live tasks.
            while let Some(joined) = tasks.try_join_next() {
                settle(&mut summary, joined);
            }
        }

        tracing::debug!(outstanding = tasks.len(), "draining");
        while let Some(joined) = tasks.join_next().await {
            settle(&mut summary, joined);
        }

        let summary = self.aggregator.finish(summary);
        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            rejected = summary.rejected,
            "run complete"
        );
        summary
    }
}

fn settle(summary: &mut TallySummary, joined: Result<Result<u64, TallyError>, JoinError>) {
    match joined {
        // Successes are tallied by the aggregator itself.
        Ok(Ok(_)) => {}
        Ok(Err(_)) => summary.failed += 1,
        Err(e) => {
            // The permit was released while the task unwound.
            tracing::error!(error = %e, "fetch task panicked, URL counted as failed");
            summary.failed += 1;
        }
    }
}

//! Fetch collaborator and the per-URL fetch task.
//!
//! [`Fetcher`] is the seam to the network: the dispatch loop only needs
//! "give me the body of this URL". [`HttpFetcher`] is the reqwest-backed
//! implementation; tests plug in in-memory fetchers.

use crate::aggregator::Aggregator;
use crate::concurrent::GatePermit;
use crate::error::TallyError;
use std::future::Future;
use std::io::Write;
use url::Url;

/// Something that can retrieve the body behind a URL.
pub trait Fetcher: Send + Sync + 'static {
    /// Fetch the whole body of `url`.
    ///
    /// Any failure, including a non-2xx status, is an error.
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Vec<u8>, TallyError>> + Send;
}

/// HTTP GET fetcher over a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    http_client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher sending `user_agent` with every request.
    ///
    /// No request timeout is configured; a fetch runs until it completes or
    /// fails.
    pub fn new(user_agent: &str) -> Result<Self, TallyError> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                TallyError::network_with_source("", "Failed to create HTTP client", e.to_string())
            })?;

        Ok(Self { http_client })
    }

    async fn get_body(&self, url: &Url) -> Result<Vec<u8>, TallyError> {
        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;

        let body = response
            .bytes()
            .await
            .map_err(|e| TallyError::body_read(url.as_str(), e.to_string()))?;

        Ok(body.to_vec())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Vec<u8>, TallyError>> + Send {
        self.get_body(url)
    }
}

/// Count non-overlapping occurrences of `target` in `haystack`.
///
/// Matching is done on raw bytes, so a body that is not valid UTF-8 is counted
/// as-is. An empty target counts as zero.
pub fn count_occurrences(haystack: &[u8], target: &str) -> u64 {
    let needle = target.as_bytes();
    if needle.is_empty() {
        return 0;
    }

    let mut count = 0;
    let mut pos = 0;
    while haystack.len() - pos >= needle.len() {
        if haystack[pos..].starts_with(needle) {
            count += 1;
            pos += needle.len();
        } else {
            pos += 1;
        }
    }
    count
}

/// Run one fetch task to completion.
///
/// On success the count is recorded exactly once and returned. On failure a
/// diagnostic is logged, nothing is recorded, and the error is returned.
/// `permit` is released before this function returns on either path.
pub async fn run_fetch_task<F, W>(
    fetcher: &F,
    raw: &str,
    url: &Url,
    target: &str,
    aggregator: &Aggregator<W>,
    permit: GatePermit,
) -> Result<u64, TallyError>
where
    F: Fetcher,
    W: Write + Send,
{
    let result = fetcher.fetch(url).await;
    drop(permit);

    match result {
        Ok(body) => {
            let count = count_occurrences(&body, target);
            tracing::debug!(url = raw, count, bytes = body.len(), "fetch complete");
            aggregator.record(raw, count);
            Ok(count)
        }
        Err(e) => {
            tracing::warn!(url = raw, error = %e, "fetch failed");
            Err(e)
        }
    }
}

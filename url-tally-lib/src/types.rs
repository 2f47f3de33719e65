//! Core data types for URL tallying.
//!
//! This module defines the run configuration, the per-URL outcome handed to
//! the aggregator and the summary returned once the dispatch loop has drained.

use serde::{Deserialize, Serialize};

/// Default ceiling on simultaneously active fetches.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Upper bound accepted for the concurrency ceiling.
pub const MAX_CONCURRENCY: usize = 100;

/// Substring counted in every response body unless configured otherwise.
pub const DEFAULT_TARGET: &str = "Go";

/// Input token that stops reading further lines.
pub const SENTINEL: &str = "exit";

/// Configuration options for a tally run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyConfig {
    /// Maximum number of fetches holding a permit at the same time
    /// Default: 5, Range: 1-100
    pub concurrency: usize,

    /// Substring whose non-overlapping occurrences are counted
    /// Default: "Go"
    pub target: String,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// How result lines are written
    pub format: ReportFormat,
}

/// Shape of the lines the aggregator writes to its sink.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// `Count for <url>: <n>` per URL, `Total: <sum>` at the end
    #[default]
    Text,

    /// One JSON object per line
    Json,
}

/// Successful result of one fetch task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchOutcome {
    /// The URL exactly as it was read from input
    pub url: String,

    /// Occurrences of the target substring in the body
    pub count: u64,
}

/// What a finished run looked like.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TallySummary {
    /// Sum of counts over every successful fetch
    pub total: u64,

    /// Fetches that reached the aggregator
    pub succeeded: usize,

    /// Fetches that failed (network, status, body or panic)
    pub failed: usize,

    /// Input lines rejected before dispatch (invalid URL, undecodable line)
    pub rejected: usize,

    /// Fetch tasks launched
    pub dispatched: usize,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            target: DEFAULT_TARGET.to_string(),
            user_agent: format!("url-tally/{}", crate::VERSION),
            format: ReportFormat::Text,
        }
    }
}

impl TallyConfig {
    /// Set the concurrency ceiling.
    ///
    /// Clamped to 1..=100 so the gate always admits at least one fetch.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn with_target<T: Into<String>>(mut self, target: T) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_user_agent<U: Into<String>>(mut self, user_agent: U) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("Unknown output format '{}', use text or json", other)),
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Text => write!(f, "text"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

//! # url-tally Library
//!
//! Fetch a stream of URLs under a fixed concurrency ceiling, count a target
//! substring in every response body and keep one serialized running total.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use url_tally_lib::{Dispatcher, HttpFetcher, TallyConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TallyConfig::default().with_concurrency(5).with_target("Go");
//!     let fetcher = HttpFetcher::new(&config.user_agent)?;
//!     let dispatcher = Dispatcher::new(config, fetcher, std::io::stdout());
//!
//!     let input = tokio::io::BufReader::new(tokio::io::stdin());
//!     let summary = dispatcher.run(input).await;
//!     eprintln!("{} fetches failed", summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Pieces
//!
//! - **Admission gate** ([`AdmissionGate`]): counting permit pool, released on drop
//! - **Fetch task** ([`run_fetch_task`]): fetch, count, report once
//! - **Aggregator** ([`Aggregator`]): mutex-guarded total and output sink
//! - **Dispatch loop** ([`Dispatcher`]): read, validate, admit, spawn, drain

// Re-export main public API types and functions
pub use aggregator::Aggregator;
pub use concurrent::{AdmissionGate, GatePermit};
pub use config::{load_env_config, ConfigManager, DefaultsConfig, EnvConfig, FileConfig, OutputConfig};
pub use dispatcher::{classify_line, Dispatcher, LineKind, MAX_LINE_BYTES};
pub use error::TallyError;
pub use fetcher::{count_occurrences, run_fetch_task, Fetcher, HttpFetcher};
pub use types::{
    FetchOutcome, ReportFormat, TallyConfig, TallySummary, DEFAULT_CONCURRENCY, DEFAULT_TARGET,
    MAX_CONCURRENCY, SENTINEL,
};

mod aggregator;
mod concurrent;
mod config;
mod dispatcher;
mod error;
mod fetcher;
mod types;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

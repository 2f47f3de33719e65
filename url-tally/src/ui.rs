//! Terminal chrome for url-tally.
//!
//! Everything here goes to stderr so stdout stays a clean stream of result
//! lines. Uses only the `console` crate.

use console::{style, Term};
use url_tally_lib::{TallyConfig, TallySummary, VERSION};

// ── Banner ───────────────────────────────────────────────────────────────────

/// Print the version banner and input prompt for interactive sessions.
pub fn print_banner(config: &TallyConfig) {
    let term = Term::stderr();
    let _ = term.write_line(&format!(
        "{} {}",
        style("url-tally").for_stderr().bold(),
        style(format!("v{}", VERSION))
            .for_stderr()
            .dim(),
    ));
    let _ = term.write_line(
        &style(format!(
            "Counting '{}' | Concurrency: {}",
            config.target, config.concurrency
        ))
        .for_stderr()
        .dim()
        .to_string(),
    );
    let _ = term.write_line("Please, input the URL, URL list or 'exit'");
}

// ── Completion ───────────────────────────────────────────────────────────────

/// Print the closing note after the total has been written.
pub fn print_completion(summary: &TallySummary) {
    let term = Term::stderr();

    let mut parts = vec![format!("{} fetched", summary.succeeded)];
    if summary.failed > 0 {
        parts.push(
            style(format!("{} failed", summary.failed))
                .for_stderr()
                .red()
                .to_string(),
        );
    }
    if summary.rejected > 0 {
        parts.push(
            style(format!("{} skipped", summary.rejected))
                .for_stderr()
                .yellow()
                .to_string(),
        );
    }

    let _ = term.write_line(&format!(
        "{} {}",
        style("Successful complete").for_stderr().green().bold(),
        style(format!("({})", parts.join(", "))).for_stderr().dim(),
    ));
}

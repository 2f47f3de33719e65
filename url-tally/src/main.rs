//! url-tally CLI Application
//!
//! Reads URLs from standard input (one per line, `exit` to stop), fetches them
//! concurrently and prints how often the target substring appears in each body
//! together with the running total.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use std::io::IsTerminal;
use std::process;
use tracing_subscriber::EnvFilter;
use url_tally_lib::{load_env_config, ConfigManager, EnvConfig, FileConfig};
use url_tally_lib::{Dispatcher, HttpFetcher, ReportFormat, TallyConfig, MAX_CONCURRENCY};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for url-tally
#[derive(Parser, Debug, Default)]
#[command(name = "url-tally")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Count a substring across many URLs, fetched concurrently")]
#[command(
    long_about = "Reads URLs from standard input, one per line, until 'exit' or end of input.\n\nEach URL is fetched concurrently (bounded by --concurrency) and the occurrences of the target substring in its body are printed, followed by the total."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Max concurrent fetches (default: 5, max: 100)
    #[arg(
        short = 'c',
        long = "concurrency",
        value_name = "N",
        help_heading = "Performance"
    )]
    pub concurrency: Option<usize>,

    /// Substring to count in every response body (default: "Go")
    #[arg(
        short = 't',
        long = "target",
        value_name = "TEXT",
        help_heading = "Counting"
    )]
    pub target: Option<String>,

    /// Output one JSON object per line instead of text
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// User-Agent header sent with every request
    #[arg(long = "user-agent", value_name = "UA", help_heading = "Protocol")]
    pub user_agent: Option<String>,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show debug diagnostics on stderr
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_tracing(&args);

    // Validate arguments
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    if let Err(e) = run_tally(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Send diagnostics to stderr; stdout carries result lines only.
///
/// `RUST_LOG` takes precedence over `--verbose`/`--debug`.
fn init_tracing(args: &Args) {
    let default_directives = if args.debug {
        "warn,url_tally=debug,url_tally_lib=debug"
    } else if args.verbose {
        "warn,url_tally=info,url_tally_lib=info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(args.debug)
        .init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 || concurrency > MAX_CONCURRENCY {
            return Err(format!(
                "Concurrency must be between 1 and {}",
                MAX_CONCURRENCY
            ));
        }
    }

    if let Some(target) = &args.target {
        if target.is_empty() {
            return Err("Target substring cannot be empty".to_string());
        }
    }

    if let Some(user_agent) = &args.user_agent {
        if user_agent.trim().is_empty() {
            return Err("User agent cannot be empty".to_string());
        }
    }

    Ok(())
}

/// Read stdin to the end (or `exit`), then report the total.
async fn run_tally(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(&args)?;
    let interactive = std::io::stdin().is_terminal();

    if interactive {
        ui::print_banner(&config);
    }
    tracing::info!(
        concurrency = config.concurrency,
        target = %config.target,
        format = %config.format,
        "starting"
    );

    let fetcher = HttpFetcher::new(&config.user_agent)?;
    let dispatcher = Dispatcher::new(config, fetcher, std::io::stdout());

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let summary = dispatcher.run(input).await;

    ui::print_completion(&summary);
    Ok(())
}

/// Build TallyConfig from CLI arguments with config file integration.
///
/// Precedence order (highest to lowest):
/// 1. CLI arguments (explicit user input)
/// 2. Environment variables (UT_*)
/// 3. Config file (--config, UT_CONFIG, or discovered)
/// 4. Built-in defaults
fn build_config(args: &Args) -> Result<TallyConfig, Box<dyn std::error::Error>> {
    let mut config = TallyConfig::default();
    let config_manager = ConfigManager::new(args.verbose);
    let env_config = load_env_config();

    // Step 1: Determine config file path and load config files
    if let Some(explicit_config_path) = &args.config {
        tracing::info!(path = %explicit_config_path, "using explicit config file (--config)");

        let file_config = config_manager
            .load_file(explicit_config_path)
            .map_err(|e| {
                format!(
                    "Failed to load config file '{}': {}",
                    explicit_config_path, e
                )
            })?;

        config = merge_file_config_into_tally_config(config, file_config)?;
    } else if let Some(env_config_path) = &env_config.config {
        tracing::info!(path = %env_config_path, "using explicit config file (UT_CONFIG)");

        let file_config = config_manager
            .load_file(env_config_path)
            .map_err(|e| format!("Failed to load config file '{}': {}", env_config_path, e))?;

        config = merge_file_config_into_tally_config(config, file_config)?;
    } else {
        match config_manager.discover_and_load() {
            Ok(file_config) => {
                config = merge_file_config_into_tally_config(config, file_config)?;
            }
            Err(e) => {
                tracing::warn!("Config discovery warning: {}", e);
            }
        }
    }

    // Step 2: Apply environment variables (UT_*)
    config = apply_environment_config(config, &env_config);

    // Step 3: Apply CLI arguments (highest precedence)
    config = apply_cli_args_to_config(config, args);

    Ok(config)
}

/// Merge FileConfig into TallyConfig
fn merge_file_config_into_tally_config(
    mut config: TallyConfig,
    file_config: FileConfig,
) -> Result<TallyConfig, Box<dyn std::error::Error>> {
    if let Some(defaults) = file_config.defaults {
        if let Some(concurrency) = defaults.concurrency {
            config = config.with_concurrency(concurrency);
        }
        if let Some(target) = defaults.target {
            config = config.with_target(target);
        }
        if let Some(user_agent) = defaults.user_agent {
            config = config.with_user_agent(user_agent);
        }
    }

    if let Some(output) = file_config.output {
        if let Some(format) = output.format {
            config = config.with_format(format.parse::<ReportFormat>()?);
        }
    }

    Ok(config)
}

/// Apply UT_* environment values; invalid ones were already dropped.
fn apply_environment_config(mut config: TallyConfig, env_config: &EnvConfig) -> TallyConfig {
    if let Some(concurrency) = env_config.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(target) = &env_config.target {
        config = config.with_target(target.clone());
    }
    if let Some(user_agent) = &env_config.user_agent {
        config = config.with_user_agent(user_agent.clone());
    }
    if let Some(format) = env_config.format {
        config = config.with_format(format);
    }
    config
}

/// Apply CLI arguments to config (highest precedence).
///
/// `--json` only ever switches JSON on; leaving it off keeps whatever the
/// environment or config file chose.
fn apply_cli_args_to_config(mut config: TallyConfig, args: &Args) -> TallyConfig {
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(target) = &args.target {
        config = config.with_target(target.clone());
    }
    if let Some(user_agent) = &args.user_agent {
        config = config.with_user_agent(user_agent.clone());
    }
    if args.json {
        config = config.with_format(ReportFormat::Json);
    }
    config
}

//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and environment
//! variables and merging them with proper precedence rules.

use crate::error::TallyError;
use crate::types::{ReportFormat, MAX_CONCURRENCY};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Default values for CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Output formatting preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

/// Default configuration values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Default concurrency ceiling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Default substring to count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Default User-Agent header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// "text" or "json"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to report which files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, TallyError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(TallyError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            TallyError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            TallyError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config is applied first, then the home directory file, then a file
    /// in the current directory; later files win field by field.
    pub fn discover_and_load(&self) -> Result<FileConfig, TallyError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring config file");
                }
            }
        }

        if self.verbose && loaded_files.len() > 1 {
            for (i, path) in loaded_files.iter().enumerate() {
                tracing::info!(
                    path = %path.display(),
                    precedence = i,
                    "merged config file"
                );
            }
        }

        Ok(merged_config)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        let candidates = ["./url-tally.toml", "./.url-tally.toml"];

        candidates
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        let candidates = [".url-tally.toml", "url-tally.toml"];

        candidates
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("url-tally").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations; values from `higher` win.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(mut lower_defaults), Some(higher_defaults)) => {
                    if higher_defaults.concurrency.is_some() {
                        lower_defaults.concurrency = higher_defaults.concurrency;
                    }
                    if higher_defaults.target.is_some() {
                        lower_defaults.target = higher_defaults.target;
                    }
                    if higher_defaults.user_agent.is_some() {
                        lower_defaults.user_agent = higher_defaults.user_agent;
                    }
                    Some(lower_defaults)
                }
                (lower_defaults, higher_defaults) => higher_defaults.or(lower_defaults),
            },
            output: match (lower.output, higher.output) {
                (Some(mut lower_output), Some(higher_output)) => {
                    if higher_output.format.is_some() {
                        lower_output.format = higher_output.format;
                    }
                    Some(lower_output)
                }
                (lower_output, higher_output) => higher_output.or(lower_output),
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), TallyError> {
        if let Some(defaults) = &config.defaults {
            if let Some(concurrency) = defaults.concurrency {
                if concurrency == 0 || concurrency > MAX_CONCURRENCY {
                    return Err(TallyError::config(format!(
                        "Concurrency must be between 1 and {}",
                        MAX_CONCURRENCY
                    )));
                }
            }

            if let Some(target) = &defaults.target {
                if target.is_empty() {
                    return Err(TallyError::config("Target substring cannot be empty"));
                }
            }

            if let Some(user_agent) = &defaults.user_agent {
                if user_agent.trim().is_empty() {
                    return Err(TallyError::config("User agent cannot be empty"));
                }
            }
        }

        if let Some(output) = &config.output {
            if let Some(format) = &output.format {
                format.parse::<ReportFormat>().map_err(TallyError::config)?;
            }
        }

        Ok(())
    }
}

/// Environment variable configuration that mirrors CLI options.
///
/// Values come from the UT_* environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub concurrency: Option<usize>,
    pub target: Option<String>,
    pub user_agent: Option<String>,
    pub format: Option<ReportFormat>,
    pub config: Option<String>,
}

/// Load configuration from environment variables.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    env_config_from(|key| env::var(key).ok())
}

fn env_config_from<L>(lookup: L) -> EnvConfig
where
    L: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    // UT_CONCURRENCY - concurrency ceiling
    if let Some(val) = lookup("UT_CONCURRENCY") {
        match val.trim().parse::<usize>() {
            Ok(concurrency) if concurrency > 0 && concurrency <= MAX_CONCURRENCY => {
                tracing::debug!(concurrency, "using UT_CONCURRENCY");
                env_config.concurrency = Some(concurrency);
            }
            _ => {
                tracing::warn!(
                    "Invalid UT_CONCURRENCY='{}', must be 1-{}",
                    val,
                    MAX_CONCURRENCY
                );
            }
        }
    }

    // UT_TARGET - substring to count (taken verbatim, may contain spaces)
    if let Some(target) = lookup("UT_TARGET") {
        if target.is_empty() {
            tracing::warn!("Invalid UT_TARGET='', target cannot be empty");
        } else {
            tracing::debug!(target = %target, "using UT_TARGET");
            env_config.target = Some(target);
        }
    }

    // UT_USER_AGENT - User-Agent header
    if let Some(user_agent) = lookup("UT_USER_AGENT") {
        if !user_agent.trim().is_empty() {
            tracing::debug!(user_agent = %user_agent, "using UT_USER_AGENT");
            env_config.user_agent = Some(user_agent);
        }
    }

    // UT_FORMAT - text or json
    if let Some(val) = lookup("UT_FORMAT") {
        match val.parse::<ReportFormat>() {
            Ok(format) => {
                tracing::debug!(%format, "using UT_FORMAT");
                env_config.format = Some(format);
            }
            Err(e) => tracing::warn!("Invalid UT_FORMAT: {}", e),
        }
    }

    // UT_CONFIG - explicit config file
    if let Some(config_path) = lookup("UT_CONFIG") {
        if !config_path.trim().is_empty() {
            tracing::debug!(path = %config_path, "using UT_CONFIG");
            env_config.config = Some(config_path);
        }
    }

    env_config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_load_valid_config() {
        let temp_file = write_config(
            r#"
[defaults]
concurrency = 8
target = "Rust"
user_agent = "tally-bot/2"

[output]
format = "json"
"#,
        );

        let manager = ConfigManager::new(false);
        let config = manager.load_file(temp_file.path()).unwrap();

        let defaults = config.defaults.unwrap();
        assert_eq!(defaults.concurrency, Some(8));
        assert_eq!(defaults.target, Some("Rust".to_string()));
        assert_eq!(defaults.user_agent, Some("tally-bot/2".to_string()));
        assert_eq!(config.output.unwrap().format, Some("json".to_string()));
    }

    #[test]
    fn test_invalid_concurrency() {
        let temp_file = write_config("[defaults]\nconcurrency = 0\n");
        let manager = ConfigManager::new(false);
        assert!(manager.load_file(temp_file.path()).is_err());

        let temp_file = write_config("[defaults]\nconcurrency = 101\n");
        assert!(manager.load_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_empty_target_rejected() {
        let temp_file = write_config("[defaults]\ntarget = \"\"\n");
        let manager = ConfigManager::new(false);
        let err = manager.load_file(temp_file.path()).unwrap_err();
        assert!(matches!(err, TallyError::ConfigError { .. }));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let temp_file = write_config("[output]\nformat = \"xml\"\n");
        let manager = ConfigManager::new(false);
        assert!(manager.load_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let manager = ConfigManager::new(false);
        let err = manager
            .load_file("/definitely/not/here/url-tally.toml")
            .unwrap_err();
        assert!(matches!(err, TallyError::FileError { .. }));
    }

    #[test]
    fn test_merge_configs() {
        let manager = ConfigManager::new(false);

        let lower = FileConfig {
            defaults: Some(DefaultsConfig {
                concurrency: Some(10),
                target: Some("Go".to_string()),
                ..Default::default()
            }),
            output: Some(OutputConfig {
                format: Some("json".to_string()),
            }),
        };

        let higher = FileConfig {
            defaults: Some(DefaultsConfig {
                concurrency: Some(3),
                ..Default::default()
            }),
            output: None,
        };

        let merged = manager.merge_configs(lower, higher);
        let defaults = merged.defaults.unwrap();

        assert_eq!(defaults.concurrency, Some(3)); // Higher wins
        assert_eq!(defaults.target, Some("Go".to_string())); // Lower preserved
        assert_eq!(merged.output.unwrap().format, Some("json".to_string()));
    }

    #[test]
    fn test_env_config_parsing() {
        let vars: HashMap<&str, &str> = [
            ("UT_CONCURRENCY", "12"),
            ("UT_TARGET", "Hello World"),
            ("UT_FORMAT", "JSON"),
            ("UT_CONFIG", "/tmp/tally.toml"),
        ]
        .into_iter()
        .collect();

        let env_config = env_config_from(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(env_config.concurrency, Some(12));
        assert_eq!(env_config.target, Some("Hello World".to_string()));
        assert_eq!(env_config.format, Some(ReportFormat::Json));
        assert_eq!(env_config.config, Some("/tmp/tally.toml".to_string()));
        assert_eq!(env_config.user_agent, None);
    }

    #[test]
    fn test_env_config_ignores_invalid_values() {
        let vars: HashMap<&str, &str> = [
            ("UT_CONCURRENCY", "0"),
            ("UT_TARGET", ""),
            ("UT_FORMAT", "yaml"),
            ("UT_USER_AGENT", "   "),
        ]
        .into_iter()
        .collect();

        let env_config = env_config_from(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(env_config.concurrency, None);
        assert_eq!(env_config.target, None);
        assert_eq!(env_config.format, None);
        assert_eq!(env_config.user_agent, None);
    }
}

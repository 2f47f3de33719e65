//! Error handling for URL tallying operations.
//!
//! Every variant here is recoverable at the level it occurs: input and URL
//! errors skip one line, network errors drop one URL. Only configuration
//! errors surface to the binary.

use std::fmt;

/// Main error type for the library.
#[derive(Debug, Clone)]
pub enum TallyError {
    /// Line could not be parsed as a URL
    InvalidUrl { input: String, reason: String },

    /// Line parsed as a URL, but not one the HTTP collaborator can fetch
    UnsupportedScheme { input: String, scheme: String },

    /// Connection, DNS or request-level failure
    NetworkError {
        url: String,
        message: String,
        source: Option<String>,
    },

    /// Server answered with a non-2xx status
    HttpStatus { url: String, status: u16 },

    /// Response started but the body could not be read to the end
    BodyRead { url: String, message: String },

    /// Input line could not be read or decoded
    InputError { message: String },

    /// Configuration errors (invalid settings, etc.)
    ConfigError { message: String },

    /// File I/O errors when reading configuration files
    FileError { path: String, message: String },
}

impl TallyError {
    /// Create a new invalid URL error.
    pub fn invalid_url<I: Into<String>, R: Into<String>>(input: I, reason: R) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a new unsupported scheme error.
    pub fn unsupported_scheme<I: Into<String>, S: Into<String>>(input: I, scheme: S) -> Self {
        Self::UnsupportedScheme {
            input: input.into(),
            scheme: scheme.into(),
        }
    }

    /// Create a new network error.
    pub fn network<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::NetworkError {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<U: Into<String>, M: Into<String>, S: Into<String>>(
        url: U,
        message: M,
        source: S,
    ) -> Self {
        Self::NetworkError {
            url: url.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn body_read<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::BodyRead {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn input<M: Into<String>>(message: M) -> Self {
        Self::InputError {
            message: message.into(),
        }
    }

    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error was raised while fetching a URL, as opposed to
    /// while reading or validating input.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. } | Self::HttpStatus { .. } | Self::BodyRead { .. }
        )
    }
}

impl fmt::Display for TallyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { input, reason } => {
                write!(f, "It isn't a valid url: '{}' ({}). Skipping", input, reason)
            }
            Self::UnsupportedScheme { input, scheme } => {
                write!(
                    f,
                    "Unsupported scheme '{}' in '{}'. Only http and https can be fetched",
                    scheme, input
                )
            }
            Self::NetworkError {
                url,
                message,
                source,
            } => {
                if let Some(source) = source {
                    write!(f, "Network error for '{}': {} (source: {})", url, message, source)
                } else {
                    write!(f, "Network error for '{}': {}", url, message)
                }
            }
            Self::HttpStatus { url, status } => {
                write!(f, "HTTP {} from '{}'", status, url)
            }
            Self::BodyRead { url, message } => {
                write!(f, "Failed to read body of '{}': {}", url, message)
            }
            Self::InputError { message } => {
                write!(f, "Reading standard input error: {}. Ignoring line", message)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
        }
    }
}

impl std::error::Error for TallyError {}

impl From<reqwest::Error> for TallyError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();

        if let Some(status) = err.status() {
            Self::HttpStatus {
                url,
                status: status.as_u16(),
            }
        } else if err.is_body() || err.is_decode() {
            Self::body_read(url, err.to_string())
        } else if err.is_connect() {
            Self::network_with_source(url, "Connection failed", err.to_string())
        } else {
            Self::network_with_source(url, "HTTP request failed", err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_failures_are_classified() {
        assert!(TallyError::network("http://a.test", "refused").is_fetch_failure());
        assert!(TallyError::HttpStatus {
            url: "http://a.test".to_string(),
            status: 503
        }
        .is_fetch_failure());
        assert!(TallyError::body_read("http://a.test", "reset").is_fetch_failure());

        assert!(!TallyError::invalid_url("not a url", "relative URL without a base").is_fetch_failure());
        assert!(!TallyError::input("invalid UTF-8").is_fetch_failure());
        assert!(!TallyError::config("bad").is_fetch_failure());
    }

    #[test]
    fn test_display_mentions_offending_input() {
        let err = TallyError::invalid_url("not a url", "relative URL without a base");
        let msg = err.to_string();
        assert!(msg.contains("not a url"));
        assert!(msg.contains("Skipping"));

        let err = TallyError::network_with_source("http://a.test", "Connection failed", "refused");
        assert_eq!(
            err.to_string(),
            "Network error for 'http://a.test': Connection failed (source: refused)"
        );

        let err = TallyError::unsupported_scheme("ftp://a.test", "ftp");
        assert!(err.to_string().contains("'ftp'"));
    }
}

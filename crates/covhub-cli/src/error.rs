//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Coverage library error
    #[error("Coverage error: {0}")]
    Coverage(#[from] covhub::CoverageError),

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// HTTP server error
    #[error("Server error: {message}")]
    Server {
        /// Error message
        message: String,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a server error
    #[must_use]
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("mount must start with '/'");
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("mount must start"));
    }

    #[test]
    fn test_invalid_argument_error() {
        let err = CliError::invalid_argument("bad json");
        assert_eq!(err.to_string(), "Invalid argument: bad json");
    }

    #[test]
    fn test_server_error() {
        let err = CliError::server("address in use");
        assert!(err.to_string().contains("Server error"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CliError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_coverage_error_conversion() {
        let err: CliError = covhub::CoverageError::not_found("/x.js").into();
        assert_eq!(
            err.to_string(),
            "Coverage error: No coverage for file path [/x.js]"
        );
    }
}

//! Result and error types for covhub.

use thiserror::Error;

/// Result type for covhub operations
pub type CoverageResult<T> = Result<T, CoverageError>;

/// Errors that can occur while tracking, rendering or exporting coverage
#[derive(Debug, Error)]
pub enum CoverageError {
    /// Invalid setup (bad hook matcher, bad options). Raised before anything is installed.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Report target did not resolve to any node of the coverage tree
    #[error("No coverage for file path [{path}]")]
    NotFound {
        /// Path that was requested
        path: String,
    },

    /// Missing parameter or malformed payload
    #[error("{message}")]
    BadRequest {
        /// Error message
        message: String,
    },

    /// A single file failed to instrument
    #[error("Error instrumenting file {path}: {message}")]
    Instrumentation {
        /// File that failed
        path: String,
        /// Error message
        message: String,
    },

    /// Archive encoder failure or protocol violation
    #[error("Archive error: {message}")]
    Archive {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoverageError {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a not-found error for a report target
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a bad-request error
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create an instrumentation error
    #[must_use]
    pub fn instrumentation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Instrumentation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an archive error
    #[must_use]
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }
}

impl From<zip::result::ZipError> for CoverageError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::archive(err.to_string())
    }
}

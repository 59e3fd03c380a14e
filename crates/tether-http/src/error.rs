//! HTTP client error types

use thiserror::Error;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, HttpError>;

/// HTTP client errors
///
/// These never cross the public request surface: [`crate::HttpClient`]
/// folds each one into a status code through
/// [`FailureKind::classify`](crate::outcome::FailureKind::classify).
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network request failed
    #[error("Network request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid proxy configuration
    #[error("Invalid proxy configuration: {0}")]
    InvalidProxy(String),

    /// Header name or value rejected by the wire encoder
    #[error("Invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// TLS context could not be assembled
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// Trust store could not be read or parsed
    #[error("Trust store error: {0}")]
    TrustStore(String),

    /// Local I/O failure (payload files, trust store files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Request body could not be serialized
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Retry limit exceeded
    #[error("Retry limit exceeded after {attempts} attempts: {last}")]
    RetryLimitExceeded {
        attempts: u32,
        #[source]
        last: Box<HttpError>,
    },

    /// Client build error
    #[error("Failed to build HTTP client: {0}")]
    BuildError(String),
}

impl HttpError {
    /// Build an [`HttpError::InvalidHeader`] from any displayable cause.
    pub(crate) fn invalid_header(name: &str, reason: impl std::fmt::Display) -> Self {
        HttpError::InvalidHeader {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Innermost error behind any retry wrapping.
    pub fn root(&self) -> &HttpError {
        match self {
            HttpError::RetryLimitExceeded { last, .. } => last.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_unwraps_nested_retry() {
        let err = HttpError::RetryLimitExceeded {
            attempts: 3,
            last: Box::new(HttpError::RetryLimitExceeded {
                attempts: 1,
                last: Box::new(HttpError::InvalidProxy("bad".to_string())),
            }),
        };

        assert!(matches!(err.root(), HttpError::InvalidProxy(_)));
    }

    #[test]
    fn test_display_includes_last_error() {
        let err = HttpError::RetryLimitExceeded {
            attempts: 2,
            last: Box::new(HttpError::InvalidUrl("nope".to_string())),
        };

        let msg = err.to_string();
        assert!(msg.contains("2 attempts"));
        assert!(msg.contains("Invalid URL: nope"));
    }
}

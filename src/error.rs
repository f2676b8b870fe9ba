use std::time::Duration;

use thiserror::Error;

use crate::core::SongId;

/// Main error type for the rating engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Upstream call timed out (recoverable, scored as 0 by the scheduler)
    #[error("Upstream request timed out")]
    Timeout,

    /// Upstream answered with something we cannot trust
    #[error("Bad upstream response: {0}")]
    BadUpstreamResponse(String),

    /// HTTP request errors other than timeouts
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[source] reqwest::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML errors (config and catalog sheets)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Filesystem errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Catalog could not be built
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Song id not present in the catalog
    #[error("Unknown song: {0}")]
    UnknownSong(SongId),

    /// Whole best-N batch exceeded its deadline
    #[error("Batch did not finish within {0:?}")]
    BatchTimeout(Duration),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Whether the failure only affects one call and the batch may go on
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Timeout)
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            EngineError::Timeout
        } else {
            EngineError::HttpRequest(e)
        }
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Other(s)
    }
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        EngineError::Other(s.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeout_is_transient() {
        assert!(EngineError::Timeout.is_transient());
        assert!(!EngineError::BadUpstreamResponse("x".into()).is_transient());
        assert!(!EngineError::BatchTimeout(Duration::from_secs(1)).is_transient());
        assert!(!EngineError::from("boom").is_transient());
    }

    #[test]
    fn test_display() {
        let err = EngineError::BadUpstreamResponse("result is not a string".into());
        assert_eq!(err.to_string(), "Bad upstream response: result is not a string");
        assert_eq!(EngineError::UnknownSong(42).to_string(), "Unknown song: 42");
    }
}

//! Error kinds for dataset resolution.
//!
//! Every entry in an aggregation resolves to its own `Result`, so these
//! errors are always scoped to a single named dataset.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving a single dataset.
#[derive(Debug, Error)]
pub enum DataError {
    /// A required descriptor field or credential is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// A local file is missing or could not be parsed.
    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// The request never produced a response.
    #[error("request to {url} failed: {message}")]
    Fetch { url: String, message: String },

    /// The remote answered with an error status.
    #[error("request to {url} returned {status}")]
    Status { url: String, status: u16 },

    /// A body could not be decoded in the expected format.
    #[error("could not parse {format} data: {message}")]
    Parse { format: String, message: String },

    /// A cache file exists but is unreadable or corrupt.
    #[error("cache entry {name} is unusable: {message}")]
    Cache { name: String, message: String },

    /// Filesystem failure outside of reading a source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    pub(crate) fn read(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        DataError::Read {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn parse(format: impl Into<String>, message: impl ToString) -> Self {
        DataError::Parse {
            format: format.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn fetch(url: impl Into<String>, err: reqwest::Error) -> Self {
        DataError::Fetch {
            url: url.into(),
            message: err.to_string(),
        }
    }

    /// Short label for the error kind, used in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            DataError::Config(_) => "config",
            DataError::Read { .. } => "read",
            DataError::Fetch { .. } | DataError::Status { .. } => "fetch",
            DataError::Parse { .. } => "parse",
            DataError::Cache { .. } => "cache",
            DataError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DataError::Status {
            url: "https://example.test/a.json".to_string(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "request to https://example.test/a.json returned 404"
        );
        assert_eq!(err.kind(), "fetch");
    }

    #[test]
    fn test_read_helper() {
        let err = DataError::read("missing.csv", "not found");
        assert!(err.to_string().contains("missing.csv"));
        assert_eq!(err.kind(), "read");
    }
}

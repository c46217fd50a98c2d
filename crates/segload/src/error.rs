use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    /// Missing or contradictory run parameters; fatal before any input is read
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The image behind a case id could not be resolved or has unusable dimensions
    #[error("Lookup error for case '{case_id}': {reason}")]
    Lookup { case_id: String, reason: String },

    #[error("Parse error in {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("Mask vectorization failed: {0}")]
    Mask(#[from] mask::MaskError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl LoaderError {
    pub fn parse(path: &Path, reason: impl Into<String>) -> Self {
        Self::Parse { path: path.to_path_buf(), reason: reason.into() }
    }

    pub fn lookup(case_id: &str, reason: impl Into<String>) -> Self {
        Self::Lookup { case_id: case_id.to_string(), reason: reason.into() }
    }
}

/// Failures talking to the results store.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Network trouble, server-side errors, throttling: worth another attempt
    #[error("Transient sink failure: {0}")]
    Transient(String),

    /// The store refused the request or the document could not be encoded
    #[error("Sink rejected request: {0}")]
    Permanent(String),

    #[error("Sink call timed out after {0:?}")]
    Timeout(Duration),
}

impl SinkError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        let retryable_status = err
            .status()
            .map(|s| s.is_server_error() || s.as_u16() == 429)
            .unwrap_or(false);
        if err.is_timeout() || err.is_connect() || err.is_request() || retryable_status {
            Self::Transient(err.to_string())
        } else {
            Self::Permanent(err.to_string())
        }
    }
}

impl From<mongodb::error::Error> for SinkError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, RETRYABLE_WRITE_ERROR, TRANSIENT_TRANSACTION_ERROR};

        let transient = match *err.kind {
            ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. }
            | ErrorKind::DnsResolve { .. } => true,
            _ => err.contains_label(RETRYABLE_WRITE_ERROR) || err.contains_label(TRANSIENT_TRANSACTION_ERROR),
        };
        if transient {
            Self::Transient(err.to_string())
        } else {
            Self::Permanent(err.to_string())
        }
    }
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        Self::Transient(err.to_string())
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Permanent(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LoaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SinkError::Transient("reset".into()).is_transient());
        assert!(SinkError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!SinkError::Permanent("400".into()).is_transient());
    }

    #[test]
    fn test_database_errors_are_split_by_kind() {
        #[derive(Debug, serde::Deserialize)]
        struct Dimensions {
            #[allow(dead_code)]
            width: f64,
        }

        let missing_field = mongodb::bson::from_document::<Dimensions>(mongodb::bson::doc! {}).unwrap_err();
        let err = SinkError::from(mongodb::error::Error::from(missing_field));
        assert!(matches!(err, SinkError::Permanent(_)));

        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = SinkError::from(mongodb::error::Error::from(reset));
        assert!(err.is_transient());
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let err = LoaderError::parse(Path::new("/data/a.tsv"), "missing header");
        assert_eq!(err.to_string(), "Parse error in /data/a.tsv: missing header");
    }
}

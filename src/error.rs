// Error handling module
// Defines the error taxonomy shared by the dataset loader, transports and runner

use std::path::PathBuf;
use thiserror::Error;

/// Why a single request/response cycle failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    /// Connection refused, reset, DNS failure, ...
    Network(String),
    /// Store answered with a non-success HTTP status
    Status(u16),
    /// Per-request timeout expired
    Timeout,
}

impl std::fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestFailure::Network(msg) => write!(f, "network error: {}", msg),
            RequestFailure::Status(status) => write!(f, "status {}", status),
            RequestFailure::Timeout => write!(f, "timed out"),
        }
    }
}

/// Errors that can occur while preparing or driving a benchmark run
#[derive(Error, Debug)]
pub enum BenchError {
    /// Streaming transport failed to open, authenticate or write
    #[error("Connection error: {0}")]
    Connection(String),

    /// A single request/response cycle failed
    #[error("Request {index} failed: {kind}")]
    Request { index: usize, kind: RequestFailure },

    /// Keys and values do not line up
    #[error("Dataset mismatch: {0}")]
    DatasetMismatch(String),

    /// Finalize was called before anything was measured
    #[error("Empty run: no measurements were recorded")]
    EmptyRun,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dataset file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BenchError {
    /// Whether this error ends the run regardless of failure policy
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BenchError::Request { .. })
    }
}

/// Result type alias for benchmark operations
pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BenchError::Connection("HTTP error: 401 Unauthorized".to_string());
        assert_eq!(
            err.to_string(),
            "Connection error: HTTP error: 401 Unauthorized"
        );

        let err = BenchError::DatasetMismatch("5 keys but 4 values".to_string());
        assert_eq!(err.to_string(), "Dataset mismatch: 5 keys but 4 values");

        let err = BenchError::EmptyRun;
        assert_eq!(err.to_string(), "Empty run: no measurements were recorded");
    }

    #[test]
    fn test_request_error_messages() {
        let err = BenchError::Request {
            index: 3,
            kind: RequestFailure::Status(500),
        };
        assert_eq!(err.to_string(), "Request 3 failed: status 500");

        let err = BenchError::Request {
            index: 0,
            kind: RequestFailure::Timeout,
        };
        assert_eq!(err.to_string(), "Request 0 failed: timed out");

        let err = BenchError::Request {
            index: 7,
            kind: RequestFailure::Network("connection refused".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Request 7 failed: network error: connection refused"
        );
    }

    #[test]
    fn test_io_error_message() {
        let err = BenchError::Io {
            path: PathBuf::from("/tmp/keys.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "Failed to read /tmp/keys.txt: not found");
    }

    #[test]
    fn test_is_fatal() {
        assert!(BenchError::Connection("refused".to_string()).is_fatal());
        assert!(BenchError::EmptyRun.is_fatal());
        assert!(BenchError::Config("bad".to_string()).is_fatal());
        assert!(!BenchError::Request {
            index: 0,
            kind: RequestFailure::Timeout
        }
        .is_fatal());
    }
}

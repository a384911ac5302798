//! Configuration structs for benchmarking.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::pacer::Pacing;
use crate::error::{BenchError, Result};

/// Which transport carries commands to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// One persistent WebSocket, unacknowledged text frames
    #[default]
    Streaming,
    /// One HTTP POST per command, each awaited
    RequestResponse,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Streaming => write!(f, "streaming"),
            TransportKind::RequestResponse => write!(f, "request-response"),
        }
    }
}

/// What a single measurement brackets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Granularity {
    /// One measurement per command
    #[default]
    PerItem,
    /// One measurement per full pass over the dataset, repeated
    PerBatch { repetitions: usize },
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::PerItem => write!(f, "per-item"),
            Granularity::PerBatch { repetitions } => {
                write!(f, "per-batch x{}", repetitions)
            }
        }
    }
}

/// What to do when one request/response cycle fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and keep going
    #[default]
    Skip,
    /// Stop the run at the first failure
    Abort,
}

/// Configuration for the in-process mock store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockServerConfig {
    /// Port to listen on (0 for random)
    pub port: u16,
    /// Password expected in the `password` query parameter
    pub password: String,
    /// Answer every n-th POST with a 500
    pub fail_every: Option<usize>,
    /// Random POST error rate (0.0 to 1.0)
    pub error_rate: f64,
    /// Simulated processing latency per POST in milliseconds
    pub latency_ms: u64,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            password: "benchmark".to_string(),
            fail_every: None,
            error_rate: 0.0,
            latency_ms: 0,
        }
    }
}

/// Configuration for a benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Store host
    pub host: String,
    /// Store port
    pub port: u16,
    /// Password sent as the `password` query parameter
    pub password: String,
    /// WebSocket endpoint path
    pub ws_path: String,
    /// Transport carrying the commands
    pub transport: TransportKind,
    /// Gap between successive sends
    pub pacing: Pacing,
    /// Per-item or per-batch measurement
    pub granularity: Granularity,
    /// Reaction to a failed request
    pub failure_policy: FailurePolicy,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Connection open timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Suppress the per-unit `Run i took Xms` lines
    pub quiet: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            password: "benchmark".to_string(),
            ws_path: "/ws".to_string(),
            transport: TransportKind::Streaming,
            pacing: Pacing::Burst,
            granularity: Granularity::PerItem,
            failure_policy: FailurePolicy::Skip,
            request_timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
            quiet: false,
        }
    }
}

impl BenchmarkConfig {
    /// Create config pointing at a mock store on localhost
    pub fn standalone(port: u16, password: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port,
            password: password.to_string(),
            ..Default::default()
        }
    }

    /// Validate the run parameters
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(BenchError::Config("host must not be empty".to_string()));
        }

        if !self.ws_path.starts_with('/') {
            return Err(BenchError::Config(format!(
                "WebSocket path must start with '/': {}",
                self.ws_path
            )));
        }

        if let Granularity::PerBatch { repetitions: 0 } = self.granularity {
            return Err(BenchError::Config(
                "per-batch mode needs at least one repetition".to_string(),
            ));
        }

        if self.request_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(BenchError::Config("timeouts must be positive".to_string()));
        }

        self.streaming_url()?;
        self.request_url()?;

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// `ws://host:port/ws?password=...`
    pub fn streaming_url(&self) -> Result<String> {
        self.build_url("ws", &self.ws_path)
    }

    /// `http://host:port/?password=...`
    pub fn request_url(&self) -> Result<String> {
        self.build_url("http", "/")
    }

    /// Target URL for the configured transport with the password masked
    pub fn display_target(&self) -> String {
        let (scheme, path) = match self.transport {
            TransportKind::Streaming => ("ws", self.ws_path.as_str()),
            TransportKind::RequestResponse => ("http", "/"),
        };
        format!("{}://{}:{}{}?password=***", scheme, self.host, self.port, path)
    }

    fn build_url(&self, scheme: &str, path: &str) -> Result<String> {
        let base = format!("{}://{}:{}{}", scheme, self.host, self.port, path);
        let mut url = reqwest::Url::parse(&base)
            .map_err(|e| BenchError::Config(format!("invalid target URL {}: {}", base, e)))?;
        url.query_pairs_mut().append_pair("password", &self.password);
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_carry_password() {
        let config = BenchmarkConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            password: "balls".to_string(),
            ..Default::default()
        };

        assert_eq!(
            config.streaming_url().unwrap(),
            "ws://127.0.0.1:3000/ws?password=balls"
        );
        assert_eq!(
            config.request_url().unwrap(),
            "http://127.0.0.1:3000/?password=balls"
        );
    }

    #[test]
    fn test_password_is_query_encoded() {
        let config = BenchmarkConfig {
            password: "a b&c".to_string(),
            ..Default::default()
        };

        let url = config.request_url().unwrap();
        assert!(url.ends_with("?password=a+b%26c"));
    }

    #[test]
    fn test_display_target_masks_password() {
        let config = BenchmarkConfig {
            password: "secret".to_string(),
            transport: TransportKind::RequestResponse,
            ..Default::default()
        };

        let shown = config.display_target();
        assert!(!shown.contains("secret"));
        assert_eq!(shown, "http://127.0.0.1:3000/?password=***");
    }

    #[test]
    fn test_validate_rejects_zero_repetitions() {
        let config = BenchmarkConfig {
            granularity: Granularity::PerBatch { repetitions: 0 },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_ws_path() {
        let config = BenchmarkConfig {
            ws_path: "ws".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_default() {
        assert!(BenchmarkConfig::default().validate().is_ok());
    }

    #[test]
    fn test_granularity_display() {
        assert_eq!(Granularity::PerItem.to_string(), "per-item");
        assert_eq!(
            Granularity::PerBatch { repetitions: 100 }.to_string(),
            "per-batch x100"
        );
    }
}

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::bench::config::{
    BenchmarkConfig, FailurePolicy, Granularity, MockServerConfig, TransportKind,
};
use crate::bench::pacer::Pacing;

/// Key-value store latency benchmark
#[derive(Parser, Debug)]
#[command(name = "kv-bench", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the benchmark against an existing store
    Run {
        /// Store host
        #[arg(short = 'H', long, env = "BENCH_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Store port
        #[arg(short, long, env = "BENCH_PORT", default_value = "3000")]
        port: u16,

        /// Store password, sent as the `password` query parameter
        #[arg(short = 'k', long, env = "BENCH_PASSWORD")]
        password: String,

        #[command(flatten)]
        bench: BenchArgs,
    },

    /// Start an in-process mock store, then run the benchmark against it
    Standalone {
        /// Answer every n-th HTTP request with a 500
        #[arg(long)]
        fail_every: Option<usize>,

        /// Random HTTP error rate (0.0 to 1.0)
        #[arg(long, default_value = "0.0")]
        error_rate: f64,

        /// Simulated store latency per HTTP request in milliseconds
        #[arg(long, default_value = "0")]
        store_latency: u64,

        #[command(flatten)]
        bench: BenchArgs,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    /// Persistent WebSocket, fire-and-forget sends
    Streaming,
    /// One awaited HTTP POST per command
    Http,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PacingArg {
    Burst,
    FixedDelay,
    Synchronous,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Skip,
    Abort,
}

/// Options shared by both subcommands
#[derive(Args, Debug, Clone)]
pub struct BenchArgs {
    /// Transport used to deliver commands
    #[arg(short, long, env = "BENCH_TRANSPORT", value_enum, default_value = "streaming")]
    pub transport: TransportArg,

    /// Pacing between sends (defaults to burst for streaming, synchronous for http)
    #[arg(long, env = "BENCH_PACING", value_enum)]
    pub pacing: Option<PacingArg>,

    /// Delay between sends in milliseconds, for fixed-delay pacing
    #[arg(short, long, env = "BENCH_DELAY_MS", default_value = "50")]
    pub delay: u64,

    /// Measure whole dataset passes, repeated this many times, instead of single commands
    #[arg(short, long, env = "BENCH_REPETITIONS")]
    pub repetitions: Option<usize>,

    /// What to do when a request fails
    #[arg(long, env = "BENCH_ON_FAILURE", value_enum, default_value = "skip")]
    pub on_failure: PolicyArg,

    /// Keys file, one key per line
    #[arg(long, env = "BENCH_KEYS_FILE", default_value = "keys.txt")]
    pub keys: String,

    /// Values file, one value per line
    #[arg(long, env = "BENCH_VALUES_FILE", default_value = "values.txt")]
    pub values: String,

    /// WebSocket endpoint path
    #[arg(long, env = "BENCH_WS_PATH", default_value = "/ws")]
    pub ws_path: String,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "BENCH_REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout: u64,

    /// Connection timeout in milliseconds
    #[arg(long, env = "BENCH_CONNECT_TIMEOUT_MS", default_value = "5000")]
    pub connect_timeout: u64,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Suppress per-unit lines
    #[arg(short, long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

/// Where the benchmark sends its traffic
#[derive(Clone, Debug)]
pub enum Target {
    /// A store that is already running
    Remote,
    /// A mock store started by this process
    Mock(MockServerConfig),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bench: BenchmarkConfig,
    pub target: Target,

    // Dataset
    pub keys_file: PathBuf,
    pub values_file: PathBuf,

    // Output
    pub json_output: bool,
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(cli: Cli) -> Result<Self> {
        let (target, host, port, password, args) = match cli.command {
            Commands::Run {
                host,
                port,
                password,
                bench,
            } => (Target::Remote, host, port, password, bench),
            Commands::Standalone {
                fail_every,
                error_rate,
                store_latency,
                bench,
            } => {
                let mock = MockServerConfig {
                    fail_every,
                    error_rate,
                    latency_ms: store_latency,
                    ..Default::default()
                };
                let password = mock.password.clone();
                // Port is filled in once the mock store is bound
                (Target::Mock(mock), "127.0.0.1".to_string(), 0, password, bench)
            }
        };

        let transport = match args.transport {
            TransportArg::Streaming => TransportKind::Streaming,
            TransportArg::Http => TransportKind::RequestResponse,
        };

        let config = Config {
            bench: BenchmarkConfig {
                host,
                port,
                password,
                ws_path: args.ws_path,
                transport,
                pacing: parse_pacing(args.pacing, args.delay, transport),
                granularity: match args.repetitions {
                    Some(repetitions) => Granularity::PerBatch { repetitions },
                    None => Granularity::PerItem,
                },
                failure_policy: match args.on_failure {
                    PolicyArg::Skip => FailurePolicy::Skip,
                    PolicyArg::Abort => FailurePolicy::Abort,
                },
                request_timeout_ms: args.request_timeout,
                connect_timeout_ms: args.connect_timeout,
                // Per-unit lines would corrupt JSON on stdout
                quiet: args.quiet || args.json,
            },
            target,
            keys_file: expand_tilde(&args.keys),
            values_file: expand_tilde(&args.values),
            json_output: args.json,
            log_level: args.log_level,
            log_json: args.log_json,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.bench.validate()?;

        if let Target::Mock(mock) = &self.target {
            if !(0.0..=1.0).contains(&mock.error_rate) {
                anyhow::bail!("error rate must be between 0.0 and 1.0: {}", mock.error_rate);
            }
        }

        for path in [&self.keys_file, &self.values_file] {
            if !path.exists() {
                anyhow::bail!("Dataset file does not exist: {}", path.display());
            }
        }

        Ok(())
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Resolve the pacing strategy, falling back to the transport's natural one
fn parse_pacing(pacing: Option<PacingArg>, delay_ms: u64, transport: TransportKind) -> Pacing {
    match pacing {
        Some(PacingArg::Burst) => Pacing::Burst,
        Some(PacingArg::FixedDelay) => Pacing::fixed_delay(Duration::from_millis(delay_ms)),
        Some(PacingArg::Synchronous) => Pacing::Synchronous,
        None => Pacing::default_for(transport),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let cli = Cli::try_parse_from(args).unwrap();
        Config::from_cli(cli).unwrap()
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/data/keys.txt");
        assert!(path.to_string_lossy().contains("data/keys.txt"));
        assert!(!path.to_string_lossy().starts_with("~"));

        let path = expand_tilde("/absolute/keys.txt");
        assert_eq!(path, PathBuf::from("/absolute/keys.txt"));
    }

    #[test]
    fn test_expand_tilde_just_tilde() {
        assert_eq!(expand_tilde("~"), PathBuf::from("~"));
    }

    #[test]
    fn test_run_defaults() {
        let config = parse(&["kv-bench", "run", "--password", "balls"]);

        assert!(matches!(config.target, Target::Remote));
        assert_eq!(config.bench.host, "127.0.0.1");
        assert_eq!(config.bench.port, 3000);
        assert_eq!(config.bench.password, "balls");
        assert_eq!(config.bench.transport, TransportKind::Streaming);
        assert_eq!(config.bench.pacing, Pacing::Burst);
        assert_eq!(config.bench.granularity, Granularity::PerItem);
        assert_eq!(config.bench.failure_policy, FailurePolicy::Skip);
        assert_eq!(config.keys_file, PathBuf::from("keys.txt"));
        assert!(!config.bench.quiet);
    }

    #[test]
    fn test_http_defaults_to_synchronous() {
        let config = parse(&["kv-bench", "run", "-k", "pw", "--transport", "http"]);
        assert_eq!(config.bench.transport, TransportKind::RequestResponse);
        assert_eq!(config.bench.pacing, Pacing::Synchronous);
    }

    #[test]
    fn test_fixed_delay_and_batches() {
        let config = parse(&[
            "kv-bench",
            "run",
            "-k",
            "pw",
            "--pacing",
            "fixed-delay",
            "--delay",
            "50",
            "--repetitions",
            "100",
            "--on-failure",
            "abort",
        ]);

        assert_eq!(config.bench.pacing, Pacing::FixedDelay { delay_ms: 50 });
        assert_eq!(
            config.bench.granularity,
            Granularity::PerBatch { repetitions: 100 }
        );
        assert_eq!(config.bench.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_json_implies_quiet() {
        let config = parse(&["kv-bench", "run", "-k", "pw", "--json"]);
        assert!(config.json_output);
        assert!(config.bench.quiet);
    }

    #[test]
    fn test_standalone_uses_mock_target() {
        let config = parse(&["kv-bench", "standalone", "--fail-every", "3", "-t", "http"]);

        match &config.target {
            Target::Mock(mock) => {
                assert_eq!(mock.fail_every, Some(3));
                assert_eq!(mock.password, config.bench.password);
            }
            Target::Remote => panic!("expected mock target"),
        }
        assert_eq!(config.bench.port, 0);
    }

    #[test]
    fn test_validate_missing_dataset() {
        let config = parse(&[
            "kv-bench",
            "run",
            "-k",
            "pw",
            "--keys",
            "/definitely/not/here/keys.txt",
        ]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_validate_error_rate() {
        let dir = tempfile::tempdir().unwrap();
        let keys = dir.path().join("keys.txt");
        let values = dir.path().join("values.txt");
        std::fs::write(&keys, "a\n").unwrap();
        std::fs::write(&values, "1\n").unwrap();

        let config = parse(&[
            "kv-bench",
            "standalone",
            "--error-rate",
            "1.5",
            "--keys",
            keys.to_str().unwrap(),
            "--values",
            values.to_str().unwrap(),
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_run_requires_password() {
        std::env::remove_var("BENCH_PASSWORD");
        assert!(Cli::try_parse_from(["kv-bench", "run"]).is_err());
    }
}

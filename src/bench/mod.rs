//! Benchmark driver for key-value store latency.
//!
//! This module provides:
//! - Pacing strategies between sends
//! - Per-item and per-batch measurement with a monotonic clock
//! - Running aggregation with HdrHistogram percentiles
//! - The sequential benchmark runner and its report
//! - A mock store for standalone runs and tests

pub mod aggregator;
pub mod clock;
pub mod config;
pub mod mock_server;
pub mod pacer;
pub mod report;
pub mod runner;

pub use aggregator::Aggregator;
pub use config::{BenchmarkConfig, FailurePolicy, Granularity, MockServerConfig, TransportKind};
pub use mock_server::MockStoreServer;
pub use pacer::Pacing;
pub use report::{Measurement, RunReport};
pub use runner::BenchmarkRunner;

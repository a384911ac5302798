//! Report generation for benchmark results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::{Granularity, TransportKind};
use super::pacer::Pacing;

/// Timing of one successful unit of work
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub index: usize,
    pub duration_ms: f64,
}

/// A unit of work that failed and was skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub index: usize,
    pub error: String,
}

/// Complete benchmark report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub transport: TransportKind,
    pub pacing: Pacing,
    pub granularity: Granularity,
    /// Successful units in the order they were measured
    pub per_unit: Vec<Measurement>,
    pub failures: Vec<Failure>,
    /// Commands that left the driver without error
    pub commands_sent: u64,
    pub total_ms: f64,
    pub average_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    /// Wall clock from first send to finalize, pacing included
    pub wall_clock_ms: f64,
    /// Interrupted before all units were issued
    pub cancelled: bool,
    /// Error that stopped the run early, if any
    pub aborted: Option<String>,
}

impl RunReport {
    pub fn count(&self) -> usize {
        self.per_unit.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Whether every planned unit was issued
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.aborted.is_none()
    }

    /// Print the closing summary
    pub fn print_summary(&self) {
        println!();
        println!("=== Benchmark Summary ===");
        println!(
            "Transport: {}, Pacing: {}, Granularity: {}",
            self.transport, self.pacing, self.granularity
        );
        if self.transport == TransportKind::Streaming {
            println!("Note: streaming timings measure local send overhead, not store latency");
        }

        println!(
            "Took {:.3}s to ADD {} values",
            self.total_ms / 1000.0,
            self.commands_sent
        );
        println!("Took on average: {:.3}ms", self.average_ms);
        println!(
            "Min: {:.3}ms, Max: {:.3}ms, p50: {:.3}ms, p95: {:.3}ms, p99: {:.3}ms",
            self.min_ms, self.max_ms, self.p50_ms, self.p95_ms, self.p99_ms
        );
        println!(
            "Measured units: {}, Failures: {}, Wall clock: {:.3}s",
            self.count(),
            self.failure_count(),
            self.wall_clock_ms / 1000.0
        );

        if self.cancelled {
            println!("Run was cancelled; results are partial");
        }
        if let Some(reason) = &self.aborted {
            println!("Run aborted: {}", reason);
        }
    }

    /// Export the report as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

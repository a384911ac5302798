//! Running aggregation of measured units, with HdrHistogram percentiles.

use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use std::time::Duration;
use uuid::Uuid;

use super::clock::{duration_ms, Stopwatch};
use super::config::{Granularity, TransportKind};
use super::pacer::Pacing;
use super::report::{Failure, Measurement, RunReport};
use crate::error::{BenchError, Result};

/// Run-level facts the aggregator cannot observe itself
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub transport: TransportKind,
    pub pacing: Pacing,
    pub granularity: Granularity,
    pub commands_sent: u64,
    pub cancelled: bool,
    pub aborted: Option<String>,
}

/// Accumulates durations for one run.
///
/// Each `record` prints its `Run i took Xms` line immediately.
pub struct Aggregator {
    /// Unit durations in microseconds
    histogram: Histogram<u64>,
    measurements: Vec<Measurement>,
    failures: Vec<Failure>,
    total_ms: f64,
    started_at: DateTime<Utc>,
    wall_clock: Stopwatch,
    echo: bool,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            // Up to one hour per unit with 3 significant figures
            histogram: Histogram::new_with_bounds(1, 3_600_000_000, 3)
                .expect("histogram bounds are valid"),
            measurements: Vec::new(),
            failures: Vec::new(),
            total_ms: 0.0,
            started_at: Utc::now(),
            wall_clock: Stopwatch::start(),
            echo: true,
        }
    }

    /// Stop printing per-unit lines (JSON output, tests)
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Record one successful unit
    pub fn record(&mut self, index: usize, duration: Duration) -> Measurement {
        let duration_ms = duration_ms(duration);
        let measurement = Measurement { index, duration_ms };

        self.histogram
            .saturating_record((duration.as_micros() as u64).max(1));
        self.total_ms += duration_ms;
        self.measurements.push(measurement);

        if self.echo {
            println!("Run {} took {}ms", index, duration_ms);
        }
        tracing::debug!(index, duration_ms, "Unit measured");

        measurement
    }

    /// Record a unit that failed and was skipped
    pub fn record_failure(&mut self, index: usize, error: &BenchError) {
        tracing::warn!(index, error = %error, "Unit failed, skipping");
        self.failures.push(Failure {
            index,
            error: error.to_string(),
        });
    }

    pub fn count(&self) -> usize {
        self.measurements.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn total_ms(&self) -> f64 {
        self.total_ms
    }

    /// Mean unit duration, `None` until something was recorded
    pub fn average_ms(&self) -> Option<f64> {
        match self.count() {
            0 => None,
            count => Some(self.total_ms / count as f64),
        }
    }

    /// Close the run and build its report
    pub fn finalize(self, summary: RunSummary) -> Result<RunReport> {
        let average_ms = self.average_ms().ok_or(BenchError::EmptyRun)?;

        let min_ms = self
            .measurements
            .iter()
            .map(|m| m.duration_ms)
            .fold(f64::INFINITY, f64::min);
        let max_ms = self
            .measurements
            .iter()
            .map(|m| m.duration_ms)
            .fold(f64::NEG_INFINITY, f64::max);

        let report = RunReport {
            run_id: Uuid::new_v4(),
            started_at: self.started_at,
            transport: summary.transport,
            pacing: summary.pacing,
            granularity: summary.granularity,
            commands_sent: summary.commands_sent,
            total_ms: self.total_ms,
            average_ms,
            min_ms,
            max_ms,
            p50_ms: self.percentile_ms(50.0),
            p95_ms: self.percentile_ms(95.0),
            p99_ms: self.percentile_ms(99.0),
            wall_clock_ms: self.wall_clock.elapsed_ms(),
            cancelled: summary.cancelled,
            aborted: summary.aborted,
            per_unit: self.measurements,
            failures: self.failures,
        };

        tracing::info!(
            units = report.count(),
            failures = report.failure_count(),
            average_ms = report.average_ms,
            "Run finalized"
        );

        Ok(report)
    }

    fn percentile_ms(&self, percentile: f64) -> f64 {
        self.histogram.value_at_percentile(percentile) as f64 / 1000.0
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn summary() -> RunSummary {
        RunSummary {
            transport: TransportKind::Streaming,
            pacing: Pacing::Burst,
            granularity: Granularity::PerItem,
            commands_sent: 0,
            cancelled: false,
            aborted: None,
        }
    }

    #[test]
    fn test_aggregator() {
        let mut aggregator = Aggregator::new().quiet();

        aggregator.record(0, Duration::from_millis(100));
        aggregator.record(1, Duration::from_millis(150));
        aggregator.record(2, Duration::from_millis(200));
        aggregator.record_failure(
            3,
            &BenchError::Request {
                index: 3,
                kind: crate::error::RequestFailure::Timeout,
            },
        );

        assert_eq!(aggregator.count(), 3);
        assert_eq!(aggregator.failure_count(), 1);
        assert!((aggregator.total_ms() - 450.0).abs() < 1e-9);
        assert!((aggregator.average_ms().unwrap() - 150.0).abs() < 1e-9);

        let report = aggregator.finalize(summary()).unwrap();
        assert_eq!(report.count(), 3);
        assert_eq!(report.failures[0].index, 3);
        assert!((report.min_ms - 100.0).abs() < 1e-9);
        assert!((report.max_ms - 200.0).abs() < 1e-9);
        // 3 significant figures
        assert!((report.p50_ms - 150.0).abs() < 1.0);
        assert!((report.p99_ms - 200.0).abs() < 1.0);
    }

    #[test]
    fn test_finalize_empty_run() {
        let aggregator = Aggregator::new().quiet();
        assert_eq!(aggregator.average_ms(), None);
        assert!(matches!(
            aggregator.finalize(summary()),
            Err(BenchError::EmptyRun)
        ));
    }

    #[test]
    fn test_finalize_only_failures_is_empty() {
        let mut aggregator = Aggregator::new().quiet();
        aggregator.record_failure(0, &BenchError::Connection("closed".to_string()));
        assert!(matches!(
            aggregator.finalize(summary()),
            Err(BenchError::EmptyRun)
        ));
    }

    #[test]
    fn test_sub_microsecond_units_are_recorded() {
        let mut aggregator = Aggregator::new().quiet();
        aggregator.record(0, Duration::from_nanos(10));

        let report = aggregator.finalize(summary()).unwrap();
        assert!(report.average_ms > 0.0);
        assert!(report.p50_ms > 0.0);
    }

    #[test]
    fn test_summary_flags_carried() {
        let mut aggregator = Aggregator::new().quiet();
        aggregator.record(0, Duration::from_millis(1));

        let report = aggregator
            .finalize(RunSummary {
                commands_sent: 42,
                cancelled: true,
                ..summary()
            })
            .unwrap();
        assert_eq!(report.commands_sent, 42);
        assert!(report.cancelled);
        assert!(!report.is_complete());
    }

    proptest! {
        #[test]
        fn prop_average_is_sum_over_count(micros in prop::collection::vec(1u64..10_000_000, 1..200)) {
            let mut aggregator = Aggregator::new().quiet();
            for (index, us) in micros.iter().enumerate() {
                aggregator.record(index, Duration::from_micros(*us));
            }

            let sum_ms: f64 = micros.iter().map(|us| *us as f64 / 1000.0).sum();
            let expected = sum_ms / micros.len() as f64;

            let report = aggregator.finalize(summary()).unwrap();
            prop_assert_eq!(report.count(), micros.len());
            prop_assert!((report.average_ms - expected).abs() <= expected * 1e-9 + 1e-9);
            prop_assert!(report.min_ms <= report.average_ms + 1e-9);
            prop_assert!(report.average_ms <= report.max_ms + 1e-9);
        }
    }
}

//! Benchmark runner: replays the dataset through a transport, one unit at a time.

use tokio::sync::watch;

use super::aggregator::{Aggregator, RunSummary};
use super::clock::Stopwatch;
use super::config::{BenchmarkConfig, FailurePolicy, Granularity};
use super::report::RunReport;
use crate::dataset::Dataset;
use crate::error::{BenchError, Result};
use crate::transport::Transport;

/// How a run loop ended
enum Stop {
    Completed,
    Cancelled,
    Aborted(BenchError),
}

/// Result of one unit of work
enum Unit {
    Done,
    Cancelled,
    Failed(BenchError),
}

/// Drives a run over a single transport.
///
/// Sends are strictly sequential. The transport is closed exactly once when
/// the run ends, whether it completed, was cancelled or aborted.
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
    transport: Box<dyn Transport>,
    cancel: Option<watch::Receiver<bool>>,
    commands_sent: u64,
}

impl BenchmarkRunner {
    /// Create a new benchmark runner
    pub fn new(config: BenchmarkConfig, transport: Box<dyn Transport>) -> Self {
        if !config.pacing.is_meaningful_for(transport.kind()) {
            tracing::warn!(
                pacing = %config.pacing,
                transport = %transport.kind(),
                "Pacing strategy is unusual for this transport; timings may be misleading"
            );
        }

        Self {
            config,
            transport,
            cancel: None,
            commands_sent: 0,
        }
    }

    /// Stop between units once `cancel` turns `true`
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run the benchmark and finalize its report.
    ///
    /// A run stopped by a fatal error still yields its partial report when
    /// at least one unit was measured; `RunReport::aborted` carries the cause.
    pub async fn run(mut self, dataset: &Dataset) -> Result<RunReport> {
        let mut aggregator = Aggregator::new();
        if self.config.quiet {
            aggregator = aggregator.quiet();
        }

        tracing::info!(
            pairs = dataset.len(),
            granularity = %self.config.granularity,
            pacing = %self.config.pacing,
            "Starting run"
        );

        let stop = match self.config.granularity {
            Granularity::PerItem => self.run_per_item(dataset, &mut aggregator).await,
            Granularity::PerBatch { repetitions } => {
                self.run_per_batch(dataset, repetitions, &mut aggregator)
                    .await
            }
        };

        let close_error = match self.transport.close().await {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to close transport");
                Some(err)
            }
        };

        let (cancelled, mut aborted) = match stop {
            Stop::Completed => (false, None),
            Stop::Cancelled => {
                tracing::warn!("Run cancelled, finalizing partial results");
                (true, None)
            }
            Stop::Aborted(err) => {
                tracing::error!(error = %err, "Run aborted");
                if aggregator.count() == 0 {
                    return Err(err);
                }
                (false, Some(err.to_string()))
            }
        };

        // Measurements already taken outlive a failed close
        if let Some(err) = close_error {
            if aggregator.count() == 0 {
                return Err(err);
            }
            aborted = Some(match aborted {
                Some(reason) => format!("{}; {}", reason, err),
                None => err.to_string(),
            });
        }

        aggregator.finalize(RunSummary {
            transport: self.transport.kind(),
            pacing: self.config.pacing,
            granularity: self.config.granularity,
            commands_sent: self.commands_sent,
            cancelled,
            aborted,
        })
    }

    async fn run_per_item(&mut self, dataset: &Dataset, aggregator: &mut Aggregator) -> Stop {
        for (index, command) in dataset.commands().enumerate() {
            if self.is_cancelled() {
                return Stop::Cancelled;
            }

            let watch = Stopwatch::start();
            let result = self.transport.send(&command).await;
            let elapsed = watch.elapsed();

            match result {
                Ok(_) => {
                    self.commands_sent += 1;
                    aggregator.record(index, elapsed);
                }
                Err(err) => {
                    let err = err.into_bench_error(index);
                    if let Some(stop) = self.handle_failure(err, index, aggregator) {
                        return stop;
                    }
                }
            }

            // Pacing sits outside the measured interval
            if !self.config.pacing.pause(&mut self.cancel).await {
                return Stop::Cancelled;
            }
        }

        Stop::Completed
    }

    async fn run_per_batch(
        &mut self,
        dataset: &Dataset,
        repetitions: usize,
        aggregator: &mut Aggregator,
    ) -> Stop {
        for run in 0..repetitions {
            if self.is_cancelled() {
                return Stop::Cancelled;
            }

            let watch = Stopwatch::start();
            match self.send_batch(dataset).await {
                Unit::Done => {
                    aggregator.record(run, watch.elapsed());
                }
                Unit::Cancelled => return Stop::Cancelled,
                Unit::Failed(err) => {
                    if let Some(stop) = self.handle_failure(err, run, aggregator) {
                        return stop;
                    }
                }
            }

            // The gap between passes is paced but not measured
            if run + 1 < repetitions && !self.config.pacing.pause(&mut self.cancel).await {
                return Stop::Cancelled;
            }
        }

        Stop::Completed
    }

    /// Push the whole dataset once, in order
    async fn send_batch(&mut self, dataset: &Dataset) -> Unit {
        let last = dataset.len().saturating_sub(1);
        for (index, command) in dataset.commands().enumerate() {
            if let Err(err) = self.transport.send(&command).await {
                return Unit::Failed(err.into_bench_error(index));
            }
            self.commands_sent += 1;

            // No trailing pause: the pass ends with its last send
            if index < last && !self.config.pacing.pause(&mut self.cancel).await {
                return Unit::Cancelled;
            }
        }

        Unit::Done
    }

    /// Apply the failure policy. `Some` ends the run.
    fn handle_failure(
        &self,
        err: BenchError,
        unit: usize,
        aggregator: &mut Aggregator,
    ) -> Option<Stop> {
        if err.is_fatal() || self.config.failure_policy == FailurePolicy::Abort {
            return Some(Stop::Aborted(err));
        }

        aggregator.record_failure(unit, &err);
        None
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

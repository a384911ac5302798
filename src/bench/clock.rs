//! Monotonic timing around a unit of work.

use std::time::{Duration, Instant};

/// Captures a start timestamp and reads elapsed time against it
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn elapsed_ms(&self) -> f64 {
        duration_ms(self.elapsed())
    }
}

/// Fractional milliseconds
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_ms() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500.0);
        assert!((duration_ms(Duration::from_micros(250)) - 0.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stopwatch_is_monotonic() {
        let watch = Stopwatch::start();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let first = watch.elapsed();
        let second = watch.elapsed();
        assert!(first >= Duration::from_millis(5));
        assert!(second >= first);
    }
}

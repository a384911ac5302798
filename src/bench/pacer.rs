//! Pacing between successive sends.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;

use super::config::TransportKind;

/// Timing relationship between one send and the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Pacing {
    /// Next send immediately
    #[default]
    Burst,
    /// Sleep a fixed wall-clock interval after every send
    FixedDelay { delay_ms: u64 },
    /// Next send once the previous response arrived; no added delay
    Synchronous,
}

impl Pacing {
    pub fn fixed_delay(delay: Duration) -> Self {
        Pacing::FixedDelay {
            delay_ms: delay.as_millis() as u64,
        }
    }

    /// Natural pacing for a transport when none is configured
    pub fn default_for(transport: TransportKind) -> Self {
        match transport {
            TransportKind::Streaming => Pacing::Burst,
            TransportKind::RequestResponse => Pacing::Synchronous,
        }
    }

    pub fn delay(&self) -> Option<Duration> {
        match self {
            Pacing::FixedDelay { delay_ms } if *delay_ms > 0 => {
                Some(Duration::from_millis(*delay_ms))
            }
            _ => None,
        }
    }

    /// Whether this strategy measures something sensible on `transport`.
    ///
    /// Burst and fixed delay only make sense on a fire-and-forget stream;
    /// synchronous pacing only exists when each send is awaited.
    pub fn is_meaningful_for(&self, transport: TransportKind) -> bool {
        matches!(
            (self, transport),
            (Pacing::Burst, TransportKind::Streaming)
                | (Pacing::FixedDelay { .. }, TransportKind::Streaming)
                | (Pacing::Synchronous, TransportKind::RequestResponse)
        )
    }

    /// Wait out the gap after a send.
    ///
    /// Returns `false` if `cancel` fired while waiting.
    pub async fn pause(&self, cancel: &mut Option<watch::Receiver<bool>>) -> bool {
        let Some(delay) = self.delay() else {
            return true;
        };

        let Some(rx) = cancel else {
            tokio::time::sleep(delay).await;
            return true;
        };

        if *rx.borrow() {
            return false;
        }

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            let changed = tokio::select! {
                _ = &mut sleep => return true,
                changed = rx.changed() => changed,
            };

            if changed.is_err() {
                // Sender gone, nobody can cancel any more
                sleep.await;
                return true;
            }

            if *rx.borrow() {
                return false;
            }
        }
    }
}

impl std::fmt::Display for Pacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pacing::Burst => write!(f, "burst"),
            Pacing::FixedDelay { delay_ms } => write!(f, "fixed-delay {}ms", delay_ms),
            Pacing::Synchronous => write!(f, "synchronous"),
        }
    }
}

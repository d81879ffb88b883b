use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Fixed-interval gate shared by every worker of a scan, so the request
/// rate seen by the venue is bounded in aggregate.
#[derive(Debug)]
pub struct RateGate {
    spacing: Duration,
    /// Earliest time the next request may start.
    next_slot: Mutex<Instant>,
}

impl RateGate {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Reserve the next slot and sleep until it opens.
    pub async fn wait(&self) {
        if self.spacing.is_zero() {
            return;
        }
        let slot = {
            let mut guard = self.next_slot.lock().await;
            let when = (*guard).max(Instant::now());
            *guard = when + self.spacing;
            when
        };
        tokio::time::sleep_until(slot).await;
    }
}

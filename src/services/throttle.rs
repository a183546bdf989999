//! Request throttle shared by every worker.
//!
//! Hands out request start slots spaced `interval` apart, so the total
//! request rate against the catalog is capped no matter how many workers run.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::models::CatalogConfig;

/// Fixed-interval throttle.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Throttle using `request_delay_ms` as the slot spacing.
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(Duration::from_millis(config.request_delay_ms))
    }

    /// A throttle that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Wait for the next free request slot.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }

        let slot = {
            let mut next = self
                .next_slot
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let now = Instant::now();
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + self.interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}

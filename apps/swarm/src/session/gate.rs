//! Single-shot interval gates.

use std::time::{Duration, Instant};

/// Fires on its first poll and again whenever the interval has elapsed
/// since the previous firing; each firing stamps the gate, so it cannot
/// fire twice within one interval.
#[derive(Debug)]
pub struct IntervalGate {
    interval: Duration,
    last: Option<Instant>,
}

impl IntervalGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn fire(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

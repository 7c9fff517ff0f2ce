//! Analysis cadence: limits how often frames reach the pitch detector.

use std::time::Duration;

/// Lets a frame through only when at least `interval` of stream time has
/// passed since the last one that was let through.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Duration>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn ready(&mut self, now: Duration) -> bool {
        match self.last {
            Some(last) if now < last + self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

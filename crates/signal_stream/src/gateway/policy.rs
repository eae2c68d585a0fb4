use std::time::Duration;

/// Bounded, fixed-interval reconnect schedule.
///
/// Every close asks for the next attempt; a successful open resets the count.
/// Once `max_attempts` closes have been answered without an open in between,
/// no further attempt is granted.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    interval: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            attempts: 0,
        }
    }

    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    /// Returns the attempt number and the delay to wait before it, or `None` when exhausted.
    pub fn next_attempt(&mut self) -> Option<(u32, Duration)> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some((self.attempts, self.interval))
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

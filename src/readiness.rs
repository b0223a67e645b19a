//! Bounded polling used after UI interactions in place of fixed sleeps.
//!
//! Callers check their DOM condition, and when it does not hold yet call
//! [`Backoff::wait`]. The interval doubles up to a cap; once the deadline has
//! passed `wait` returns false and the caller proceeds with whatever state
//! the page is in.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::SettleConfig;

#[derive(Debug)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    deadline: Instant,
    attempts: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(settle: &SettleConfig) -> Self {
        Self {
            next: settle.poll_interval,
            max: settle.max_interval.max(settle.poll_interval),
            deadline: Instant::now() + settle.timeout,
            attempts: 0,
        }
    }

    /// Sleep until the next check. Returns false, without sleeping, once the
    /// deadline has passed.
    pub async fn wait(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        let delay = self.next.min(self.deadline - now);
        tokio::time::sleep(delay).await;
        self.next = (self.next * 2).min(self.max);
        self.attempts += 1;
        true
    }

    /// Number of sleeps performed so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

//! Token bucket arithmetic.
//!
//! Every operation takes `now` explicitly, so the bucket knows nothing about
//! how callers wait. Tests drive it with hand-made instants.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Number of acquisition timestamps kept for introspection.
const HISTORY_LEN: usize = 100;

/// Absorbs float drift from the refill arithmetic.
const EPSILON: f64 = 1e-9;

/// A capped, continuously refilled token count for one source.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_minute: f64,
    tokens: f64,
    last_refill: Instant,
    history: VecDeque<Instant>,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(config: RateLimitConfig, now: Instant) -> Self {
        let capacity = f64::from(config.capacity());
        Self {
            capacity,
            refill_per_minute: f64::from(config.requests_per_minute),
            tokens: capacity,
            last_refill: now,
            history: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    /// Credit tokens for the time elapsed since the last refill.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_minute / 60.0).min(self.capacity);
        self.last_refill = now;
    }

    /// Refill, then take one token if available.
    ///
    /// Returns `Err(wait)` with the time to sleep before trying again when
    /// the bucket is empty. Nothing is debited on failure, so a caller that
    /// gives up never skews the accounting.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);

        if self.tokens + EPSILON < 1.0 {
            return Err(self.wait_interval());
        }

        self.tokens = (self.tokens - 1.0).max(0.0);
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(now);
        Ok(())
    }

    /// Time for one token to refill at the current rate.
    pub fn wait_interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.refill_per_minute)
    }

    /// Apply a new rate and capacity.
    ///
    /// Tokens accrued so far are credited at the old rate first, then
    /// clamped to the new capacity.
    pub fn reconfigure(&mut self, config: RateLimitConfig, now: Instant) {
        self.refill(now);
        self.capacity = f64::from(config.capacity());
        self.refill_per_minute = f64::from(config.requests_per_minute);
        self.tokens = self.tokens.min(self.capacity);
    }

    /// Tokens currently available (as of the last refill).
    pub fn available(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_per_minute(&self) -> f64 {
        self.refill_per_minute
    }

    /// Number of recorded acquisitions at or after `since`.
    pub fn acquisitions_since(&self, since: Instant) -> usize {
        self.history.iter().filter(|at| **at >= since).count()
    }
}

//! Per-source outbound rate limiting.
//!
//! One [`TokenBucket`] per source name, each behind its own mutex. Callers
//! for different sources never contend; callers for the same source are
//! serialized only for the instant it takes to refill and debit. Waiting
//! happens outside the lock with `tokio::time::sleep`.

mod bucket;

pub use bucket::TokenBucket;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{IngestConfig, RateLimitConfig};
use crate::error::{IngestError, Result};

/// Point-in-time view of one source's limiter.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterStats {
    pub available_tokens: f64,
    pub requests_last_minute: usize,
    pub requests_per_minute: f64,
    pub capacity: f64,
}

/// Rate limiters for every configured source.
pub struct SourceRateLimiter {
    buckets: RwLock<HashMap<String, Arc<Mutex<TokenBucket>>>>,
}

impl SourceRateLimiter {
    /// Create limiters for the given sources.
    pub fn new<I, S>(limits: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, RateLimitConfig)>,
        S: Into<String>,
    {
        let now = Instant::now();
        let mut buckets = HashMap::new();
        for (source, config) in limits {
            let source = source.into();
            validate(&source, &config)?;
            buckets.insert(source, Arc::new(Mutex::new(TokenBucket::new(config, now))));
        }

        Ok(Self {
            buckets: RwLock::new(buckets),
        })
    }

    /// Create limiters for every source in an [`IngestConfig`].
    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        Self::new(config.rate_limits.iter().map(|(s, c)| (s.clone(), *c)))
    }

    /// Wait until a token is available for `source`, then take it.
    ///
    /// Dropping the returned future while it waits is safe: no token is
    /// debited until one is actually granted.
    pub async fn acquire(&self, source: &str) -> Result<()> {
        let bucket = self.bucket(source)?;

        loop {
            let attempt = lock(&bucket).try_acquire(Instant::now());
            let wait = match attempt {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };

            debug!(source, wait_secs = wait.as_secs_f64(), "Rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Add a source, or change the rate of an existing one.
    ///
    /// Waiters re-read the rate on every retry, so changing it while they
    /// sleep is safe.
    pub fn configure(&self, source: impl Into<String>, config: RateLimitConfig) -> Result<()> {
        let source = source.into();
        validate(&source, &config)?;

        let now = Instant::now();
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        match buckets.get(&source) {
            Some(bucket) => lock(bucket).reconfigure(config, now),
            None => {
                buckets.insert(source, Arc::new(Mutex::new(TokenBucket::new(config, now))));
            }
        }
        Ok(())
    }

    /// Whether a limiter exists for `source`.
    pub fn contains(&self, source: &str) -> bool {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(source)
    }

    /// Stats for every source.
    pub fn stats(&self) -> HashMap<String, RateLimiterStats> {
        let now = Instant::now();
        let minute_ago = now.checked_sub(Duration::from_secs(60)).unwrap_or(now);

        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(source, bucket)| {
                let mut bucket = lock(bucket);
                bucket.refill(now);
                let stats = RateLimiterStats {
                    available_tokens: bucket.available(),
                    requests_last_minute: bucket.acquisitions_since(minute_ago),
                    requests_per_minute: bucket.refill_per_minute(),
                    capacity: bucket.capacity(),
                };
                (source.clone(), stats)
            })
            .collect()
    }

    fn bucket(&self, source: &str) -> Result<Arc<Mutex<TokenBucket>>> {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .cloned()
            .ok_or_else(|| IngestError::UnknownSource(source.to_string()))
    }
}

fn validate(source: &str, config: &RateLimitConfig) -> Result<()> {
    if config.requests_per_minute == 0 || config.capacity() == 0 {
        return Err(IngestError::Config(format!(
            "rate limit for {} must allow at least one request",
            source
        )));
    }
    Ok(())
}

fn lock(bucket: &Mutex<TokenBucket>) -> MutexGuard<'_, TokenBucket> {
    bucket.lock().unwrap_or_else(PoisonError::into_inner)
}

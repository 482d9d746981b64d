//! Pipeline configuration.
//!
//! Components take these values explicitly in their constructors. The only
//! place that reads the process environment is [`Settings::from_env`], used
//! by the binary.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{IngestError, Result};

/// Sources configured out of the box, with their requests-per-minute.
pub const DEFAULT_SOURCE_LIMITS: &[(&str, u32)] = &[
    ("indeed", 6),
    ("linkedin", 10),
    ("glassdoor", 10),
    ("jsearch", 10),
];

/// Rate limit for one source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Steady-state refill rate
    pub requests_per_minute: u32,

    /// Bucket capacity; defaults to `requests_per_minute`
    pub burst: Option<u32>,
}

impl RateLimitConfig {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            burst: None,
        }
    }

    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = Some(burst);
        self
    }

    /// Effective bucket capacity.
    pub fn capacity(&self) -> u32 {
        self.burst.unwrap_or(self.requests_per_minute)
    }
}

/// Fuzzy-match policy for the deduplicator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupConfig {
    /// Minimum title similarity ratio (inclusive) to call two postings the same
    pub similarity_threshold: f64,

    /// How far back to look for fuzzy candidates
    pub lookback: chrono::Duration,

    /// Maximum candidates compared per posting
    pub candidate_limit: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.90,
            lookback: chrono::Duration::days(7),
            candidate_limit: 50,
        }
    }
}

/// Explicit configuration for the ingestion core.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    pub rate_limits: HashMap<String, RateLimitConfig>,
    pub dedup: DedupConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let rate_limits = DEFAULT_SOURCE_LIMITS
            .iter()
            .map(|(source, rpm)| (source.to_string(), RateLimitConfig::per_minute(*rpm)))
            .collect();

        Self {
            rate_limits,
            dedup: DedupConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Add or replace the limit for a source.
    pub fn with_rate_limit(mut self, source: impl Into<String>, limit: RateLimitConfig) -> Self {
        self.rate_limits.insert(source.into(), limit);
        self
    }

    pub fn with_dedup(mut self, dedup: DedupConfig) -> Self {
        self.dedup = dedup;
        self
    }
}

/// Process-level settings for the binary, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub database_max_connections: u32,
    pub rapidapi_key: Option<String>,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub ingest: IngestConfig,
}

impl Settings {
    /// Load settings from environment variables (and `.env` if present).
    ///
    /// Each known source's limit can be overridden with `<SOURCE>_RATE_LIMIT`
    /// and `<SOURCE>_BURST`.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| IngestError::Config("DATABASE_URL must be set".into()))?;

        let mut ingest = IngestConfig::default();
        for (source, limit) in ingest.rate_limits.iter_mut() {
            let prefix = source.to_uppercase();
            if let Some(rpm) = parse_var(&format!("{}_RATE_LIMIT", prefix))? {
                limit.requests_per_minute = rpm;
            }
            if let Some(burst) = parse_var(&format!("{}_BURST", prefix))? {
                limit.burst = Some(burst);
            }
        }

        let dedup = &mut ingest.dedup;
        if let Some(threshold) = parse_var("FUZZY_THRESHOLD")? {
            dedup.similarity_threshold = threshold;
        }
        if let Some(days) = parse_var::<i64>("FUZZY_LOOKBACK_DAYS")? {
            dedup.lookback = chrono::Duration::days(days);
        }
        if let Some(limit) = parse_var("FUZZY_CANDIDATE_LIMIT")? {
            dedup.candidate_limit = limit;
        }

        Ok(Self {
            database_url,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS")?.unwrap_or(10),
            rapidapi_key: env::var("RAPIDAPI_KEY").ok().filter(|k| !k.is_empty()),
            request_timeout: Duration::from_secs(parse_var("REQUEST_TIMEOUT")?.unwrap_or(30)),
            max_retries: parse_var("MAX_RETRIES")?.unwrap_or(3),
            retry_delay: Duration::from_secs(parse_var("RETRY_DELAY")?.unwrap_or(5)),
            ingest,
        })
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| IngestError::Config(format!("{} must be a valid number", name))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let config = IngestConfig::default();
        assert_eq!(config.rate_limits["indeed"].requests_per_minute, 6);
        assert_eq!(config.rate_limits["jsearch"].capacity(), 10);
        assert_eq!(config.dedup.candidate_limit, 50);
        assert_eq!(config.dedup.lookback, chrono::Duration::days(7));
    }

    #[test]
    fn test_burst_overrides_capacity() {
        let limit = RateLimitConfig::per_minute(6).with_burst(20);
        assert_eq!(limit.capacity(), 20);
    }

    #[test]
    fn test_with_rate_limit_adds_source() {
        let config = IngestConfig::default().with_rate_limit("s1", RateLimitConfig::per_minute(60));
        assert_eq!(config.rate_limits["s1"].requests_per_minute, 60);
    }
}

//! Job Posting Ingestion Pipeline
//!
//! Pulls postings from external job sources, drops the ones already known,
//! and stores the rest as raw postings plus normalized jobs. Every search
//! run leaves an auditable [`SearchRecord`] behind.
//!
//! # Usage
//!
//! ```rust,ignore
//! use job_ingest::{IngestConfig, IngestionOrchestrator, MemoryStore, SearchParams};
//! use job_ingest::testing::{posting, MockAgent};
//!
//! let config = IngestConfig::default();
//! let orchestrator = IngestionOrchestrator::new(Arc::new(MemoryStore::new()), config.dedup);
//!
//! let agent = MockAgent::new("s1")
//!     .with_posting(posting("s1", "https://example.com/1", "Rust Engineer", "Acme"));
//! let params = SearchParams::builder().query("rust").source("s1").build();
//!
//! let summary = orchestrator.run(&params, &agent).await?;
//! assert_eq!(summary.record.new_count, 1);
//! ```
//!
//! # Modules
//!
//! - [`rate_limit`] - Per-source token buckets for outbound calls
//! - [`dedup`] - URL, content-hash and fuzzy-title duplicate detection
//! - [`agents`] - The `SourceAgent` trait (and the JSearch agent)
//! - [`pipeline`] - The ingestion orchestrator
//! - [`store`] - Storage traits, `MemoryStore` and `PostgresStore`
//! - [`testing`] - Mock agent and failure-injecting store for tests

pub mod agents;
pub mod config;
pub mod dedup;
pub mod error;
pub mod ids;
pub mod pipeline;
pub mod rate_limit;
pub mod retry;
pub mod store;
pub mod testing;
pub mod types;

pub use agents::SourceAgent;
pub use config::{DedupConfig, IngestConfig, RateLimitConfig, Settings};
pub use dedup::{Deduplicator, DuplicateCheck, MatchKind};
pub use error::{IngestError, Result};
pub use ids::{Id, JobId, RawPostingId, SearchId};
pub use pipeline::{IngestionOrchestrator, ItemOutcome, ItemResult, RunSummary};
pub use rate_limit::{RateLimiterStats, SourceRateLimiter, TokenBucket};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use store::{IngestStore, JobStore, MemoryStore, RawPostingStore, SearchRecordStore};
pub use types::{
    EmploymentType, LocationType, NormalizedJob, RawPosting, SearchParams, SearchRecord,
    SearchStatus,
};

#[cfg(feature = "postgres")]
pub use store::PostgresStore;

#[cfg(feature = "jsearch")]
pub use agents::JSearchAgent;

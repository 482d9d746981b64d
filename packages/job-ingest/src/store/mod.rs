//! Storage traits for raw postings, normalized jobs and search records.
//!
//! The storage layer is split into focused traits:
//! - `RawPostingStore`: as-fetched postings and the dedup lookups
//! - `JobStore`: normalized jobs
//! - `SearchRecordStore`: per-run audit records
//! - `IngestStore`: composite trait combining all three
//!
//! Writes are idempotent upserts so re-running a search is safe.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::ids::{JobId, RawPostingId, SearchId};
use crate::types::{NormalizedJob, RawPosting, SearchRecord};

/// A raw posting as persisted, with its row id and stored hash.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRawPosting {
    pub id: RawPostingId,
    pub posting: RawPosting,
    pub content_hash: String,
}

/// Scope of a fuzzy-match candidate lookup.
#[derive(Debug, Clone, Copy)]
pub struct CandidateQuery<'a> {
    /// Only postings from this source
    pub source: &'a str,

    /// Case-insensitive substring the stored company must contain
    pub company: &'a str,

    /// Only postings fetched after this instant
    pub since: DateTime<Utc>,

    /// Maximum number of candidates
    pub limit: usize,
}

/// Raw posting persistence and dedup lookups.
#[async_trait]
pub trait RawPostingStore: Send + Sync {
    /// Insert a posting, or update `payload`/`fetched_at` of the row with the
    /// same `(source, url)`. Returns the row id either way.
    async fn upsert_raw_posting(&self, posting: &RawPosting) -> Result<RawPostingId>;

    /// Find a posting by `(source, url)`.
    async fn find_raw_by_url(&self, source: &str, url: &str) -> Result<Option<RawPostingId>>;

    /// Find any posting, from any source, with this content hash.
    async fn find_raw_by_content_hash(&self, content_hash: &str) -> Result<Option<RawPostingId>>;

    /// Recent postings from the same source and company, for fuzzy matching,
    /// most recently fetched first.
    async fn find_fuzzy_candidates(
        &self,
        query: &CandidateQuery<'_>,
    ) -> Result<Vec<StoredRawPosting>>;

    /// Get a posting by id.
    async fn get_raw_posting(&self, id: RawPostingId) -> Result<Option<StoredRawPosting>>;
}

/// Normalized job persistence.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a job, or update the display fields of the job with the same
    /// `(source, apply_url)`, keeping its id. Returns the job id.
    async fn upsert_job(&self, job: &NormalizedJob) -> Result<JobId>;

    /// Get a job by id.
    async fn get_job(&self, id: JobId) -> Result<Option<NormalizedJob>>;

    /// Most recently posted jobs, optionally for one source.
    async fn recent_jobs(&self, source: Option<&str>, limit: usize) -> Result<Vec<NormalizedJob>>;
}

/// Search record persistence (insert, then update by id).
#[async_trait]
pub trait SearchRecordStore: Send + Sync {
    async fn insert_search_record(&self, record: &SearchRecord) -> Result<()>;

    async fn update_search_record(&self, record: &SearchRecord) -> Result<()>;

    async fn get_search_record(&self, id: SearchId) -> Result<Option<SearchRecord>>;
}

/// Composite storage trait used by the orchestrator.
pub trait IngestStore: RawPostingStore + JobStore + SearchRecordStore {}

// Blanket implementation: anything implementing all three traits is an IngestStore
impl<T: RawPostingStore + JobStore + SearchRecordStore> IngestStore for T {}

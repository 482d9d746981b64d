//! Testing utilities including a mock source agent and a store with
//! injectable failures.
//!
//! Useful for exercising the pipeline without network calls.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::agents::{required_field, required_url, SourceAgent};
use crate::error::{IngestError, Result};
use crate::ids::{JobId, RawPostingId, SearchId};
use crate::rate_limit::SourceRateLimiter;
use crate::store::{
    CandidateQuery, JobStore, MemoryStore, RawPostingStore, SearchRecordStore, StoredRawPosting,
};
use crate::types::{LocationType, NormalizedJob, RawPosting, SearchParams, SearchRecord};

/// A configurable mock agent.
///
/// Returns canned postings from `fetch` and normalizes them from their
/// `title`, `company`, `location`, `description` and `apply_url` payload
/// fields. Failures can be injected per call or per posting URL.
///
/// # Example
///
/// ```rust
/// use job_ingest::testing::{posting, MockAgent};
///
/// let agent = MockAgent::new("s1")
///     .with_posting(posting("s1", "https://x/1", "Rust Engineer", "Acme"))
///     .failing_normalize("https://x/1");
/// ```
pub struct MockAgent {
    source: String,

    /// Postings returned by fetch, in order
    postings: Arc<RwLock<Vec<RawPosting>>>,

    /// When set, fetch fails with this reason
    fetch_error: Arc<RwLock<Option<String>>>,

    /// URLs whose normalization fails
    normalize_failures: Arc<RwLock<HashSet<String>>>,

    /// Acquired before every fetch, when set
    limiter: Option<Arc<SourceRateLimiter>>,

    /// Call tracking for assertions
    fetch_calls: Arc<RwLock<Vec<SearchParams>>>,
    normalize_calls: Arc<RwLock<Vec<String>>>,
}

impl MockAgent {
    /// Create a mock agent for a source with no postings.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            postings: Arc::default(),
            fetch_error: Arc::default(),
            normalize_failures: Arc::default(),
            limiter: None,
            fetch_calls: Arc::default(),
            normalize_calls: Arc::default(),
        }
    }

    /// Add a posting that fetch will return.
    pub fn add_posting(&self, posting: RawPosting) {
        write(&self.postings).push(posting);
    }

    /// Add a posting (builder pattern).
    pub fn with_posting(self, posting: RawPosting) -> Self {
        self.add_posting(posting);
        self
    }

    /// Add several postings (builder pattern).
    pub fn with_postings(self, postings: impl IntoIterator<Item = RawPosting>) -> Self {
        write(&self.postings).extend(postings);
        self
    }

    /// Make every fetch fail with `SourceUnavailable`.
    pub fn failing_fetch(self, reason: impl Into<String>) -> Self {
        *write(&self.fetch_error) = Some(reason.into());
        self
    }

    /// Make normalization of the posting at `url` fail.
    pub fn failing_normalize(self, url: impl Into<String>) -> Self {
        write(&self.normalize_failures).insert(url.into());
        self
    }

    /// Acquire a token from `limiter` before every fetch.
    pub fn with_rate_limiter(mut self, limiter: Arc<SourceRateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Number of times fetch was called.
    pub fn fetch_call_count(&self) -> usize {
        read(&self.fetch_calls).len()
    }

    /// Search params of every fetch call.
    pub fn fetch_calls(&self) -> Vec<SearchParams> {
        read(&self.fetch_calls).clone()
    }

    /// URLs passed to normalize, in call order.
    pub fn normalize_calls(&self) -> Vec<String> {
        read(&self.normalize_calls).clone()
    }
}

#[async_trait]
impl SourceAgent for MockAgent {
    fn source(&self) -> &str {
        &self.source
    }

    async fn fetch(&self, params: &SearchParams) -> Result<Vec<RawPosting>> {
        write(&self.fetch_calls).push(params.clone());

        if let Some(limiter) = &self.limiter {
            limiter.acquire(&self.source).await?;
        }

        if let Some(reason) = read(&self.fetch_error).clone() {
            return Err(IngestError::source_unavailable(&self.source, reason));
        }

        Ok(read(&self.postings).clone())
    }

    async fn normalize(&self, raw: &RawPosting) -> Result<NormalizedJob> {
        write(&self.normalize_calls).push(raw.url.clone());

        if read(&self.normalize_failures).contains(&raw.url) {
            return Err(IngestError::Normalization {
                url: raw.url.clone(),
                field: "title",
            });
        }

        let url = required_url(raw)?;
        let title = required_field(raw, "title")?;
        let company = required_field(raw, "company")?;

        let mut job = NormalizedJob::new(&raw.source, title, company, url)
            .with_description(raw.field("description").unwrap_or_default());

        if let Some(location) = raw.field("location") {
            job = job
                .with_location(location)
                .with_location_type(LocationType::infer(location));
        }
        if let Some(apply_url) = raw.field("apply_url") {
            job = job.with_apply_url(apply_url);
        }

        Ok(job)
    }
}

/// A `MemoryStore` whose writes and lookups can be made to fail per URL.
///
/// ```rust
/// use job_ingest::testing::FailingStore;
///
/// let store = FailingStore::new().failing_raw_upsert("https://x/2");
/// ```
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,

    /// Posting URLs whose dedup lookup fails
    lookup_failures: RwLock<HashSet<String>>,

    /// Posting URLs whose raw upsert fails
    raw_failures: RwLock<HashSet<String>>,

    /// Apply URLs whose job upsert fails
    job_failures: RwLock<HashSet<String>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the URL lookup for the posting at `url` fail.
    pub fn failing_lookup(self, url: impl Into<String>) -> Self {
        write(&self.lookup_failures).insert(url.into());
        self
    }

    /// Make storing the raw posting at `url` fail.
    pub fn failing_raw_upsert(self, url: impl Into<String>) -> Self {
        write(&self.raw_failures).insert(url.into());
        self
    }

    /// Make storing the job with `apply_url` fail.
    pub fn failing_job_upsert(self, apply_url: impl Into<String>) -> Self {
        write(&self.job_failures).insert(apply_url.into());
        self
    }

    /// The wrapped store, for inspecting what was written.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(failures: &RwLock<HashSet<String>>, key: &str, op: &str) -> Result<()> {
        if read(failures).contains(key) {
            return Err(IngestError::Storage(format!("{} failed for {}", op, key).into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RawPostingStore for FailingStore {
    async fn upsert_raw_posting(&self, posting: &RawPosting) -> Result<RawPostingId> {
        Self::check(&self.raw_failures, &posting.url, "raw upsert")?;
        self.inner.upsert_raw_posting(posting).await
    }

    async fn find_raw_by_url(&self, source: &str, url: &str) -> Result<Option<RawPostingId>> {
        Self::check(&self.lookup_failures, url, "lookup")?;
        self.inner.find_raw_by_url(source, url).await
    }

    async fn find_raw_by_content_hash(&self, content_hash: &str) -> Result<Option<RawPostingId>> {
        self.inner.find_raw_by_content_hash(content_hash).await
    }

    async fn find_fuzzy_candidates(
        &self,
        query: &CandidateQuery<'_>,
    ) -> Result<Vec<StoredRawPosting>> {
        self.inner.find_fuzzy_candidates(query).await
    }

    async fn get_raw_posting(&self, id: RawPostingId) -> Result<Option<StoredRawPosting>> {
        self.inner.get_raw_posting(id).await
    }
}

#[async_trait]
impl JobStore for FailingStore {
    async fn upsert_job(&self, job: &NormalizedJob) -> Result<JobId> {
        Self::check(&self.job_failures, &job.apply_url, "job upsert")?;
        self.inner.upsert_job(job).await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<NormalizedJob>> {
        self.inner.get_job(id).await
    }

    async fn recent_jobs(&self, source: Option<&str>, limit: usize) -> Result<Vec<NormalizedJob>> {
        self.inner.recent_jobs(source, limit).await
    }
}

#[async_trait]
impl SearchRecordStore for FailingStore {
    async fn insert_search_record(&self, record: &SearchRecord) -> Result<()> {
        self.inner.insert_search_record(record).await
    }

    async fn update_search_record(&self, record: &SearchRecord) -> Result<()> {
        self.inner.update_search_record(record).await
    }

    async fn get_search_record(&self, id: SearchId) -> Result<Option<SearchRecord>> {
        self.inner.get_search_record(id).await
    }
}

/// A raw posting with title, company, location and a description derived
/// from the URL, so distinct URLs hash differently.
pub fn posting(source: &str, url: &str, title: &str, company: &str) -> RawPosting {
    RawPosting::new(source, url)
        .with_field("title", title)
        .with_field("company", company)
        .with_field("location", "Remote")
        .with_field("description", format!("Posting at {}", url))
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use crate::ids::{JobId, RawPostingId, SearchId};
use crate::store::{
    CandidateQuery, JobStore, RawPostingStore, SearchRecordStore, StoredRawPosting,
};
use crate::types::{NormalizedJob, RawPosting, SearchRecord};

/// In-memory storage for postings, jobs and search records.
///
/// Mirrors the upsert semantics of the Postgres store. Rows are kept in
/// insertion order. Not suitable for production as data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    raw: RwLock<Vec<StoredRawPosting>>,
    jobs: RwLock<Vec<NormalizedJob>>,
    searches: RwLock<HashMap<SearchId, SearchRecord>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored raw postings.
    pub fn raw_count(&self) -> usize {
        read(&self.raw).len()
    }

    /// Number of stored jobs.
    pub fn job_count(&self) -> usize {
        read(&self.jobs).len()
    }

    /// Number of stored search records.
    pub fn search_count(&self) -> usize {
        read(&self.searches).len()
    }

    /// All stored raw postings, in insertion order.
    pub fn raw_postings(&self) -> Vec<StoredRawPosting> {
        read(&self.raw).clone()
    }

    /// All stored jobs, in insertion order.
    pub fn jobs(&self) -> Vec<NormalizedJob> {
        read(&self.jobs).clone()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        write(&self.raw).clear();
        write(&self.jobs).clear();
        write(&self.searches).clear();
    }
}

#[async_trait]
impl RawPostingStore for MemoryStore {
    async fn upsert_raw_posting(&self, posting: &RawPosting) -> Result<RawPostingId> {
        let mut raw = write(&self.raw);

        if let Some(existing) = raw
            .iter_mut()
            .find(|r| r.posting.source == posting.source && r.posting.url == posting.url)
        {
            existing.posting.payload = posting.payload.clone();
            existing.posting.fetched_at = posting.fetched_at;
            return Ok(existing.id);
        }

        let id = RawPostingId::new();
        raw.push(StoredRawPosting {
            id,
            posting: posting.clone(),
            content_hash: posting.content_hash(),
        });
        Ok(id)
    }

    async fn find_raw_by_url(&self, source: &str, url: &str) -> Result<Option<RawPostingId>> {
        Ok(read(&self.raw)
            .iter()
            .find(|r| r.posting.source == source && r.posting.url == url)
            .map(|r| r.id))
    }

    async fn find_raw_by_content_hash(&self, content_hash: &str) -> Result<Option<RawPostingId>> {
        Ok(read(&self.raw)
            .iter()
            .find(|r| r.content_hash == content_hash)
            .map(|r| r.id))
    }

    async fn find_fuzzy_candidates(
        &self,
        query: &CandidateQuery<'_>,
    ) -> Result<Vec<StoredRawPosting>> {
        let needle = query.company.to_lowercase();

        let mut candidates: Vec<_> = read(&self.raw)
            .iter()
            .filter(|r| r.posting.source == query.source)
            .filter(|r| r.posting.fetched_at > query.since)
            .filter(|r| {
                r.posting
                    .company()
                    .is_some_and(|c| c.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();

        // Most recently fetched first
        candidates.sort_by(|a, b| b.posting.fetched_at.cmp(&a.posting.fetched_at));
        candidates.truncate(query.limit);
        Ok(candidates)
    }

    async fn get_raw_posting(&self, id: RawPostingId) -> Result<Option<StoredRawPosting>> {
        Ok(read(&self.raw).iter().find(|r| r.id == id).cloned())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn upsert_job(&self, job: &NormalizedJob) -> Result<JobId> {
        let mut jobs = write(&self.jobs);

        if let Some(existing) = jobs
            .iter_mut()
            .find(|j| j.source == job.source && j.apply_url == job.apply_url)
        {
            let id = existing.id;
            let raw_posting_id = existing.raw_posting_id.or(job.raw_posting_id);
            let status = existing.status.clone();
            let processed_at = existing.processed_at;

            *existing = NormalizedJob {
                id,
                raw_posting_id,
                status,
                processed_at,
                last_updated: Some(Utc::now()),
                ..job.clone()
            };
            return Ok(id);
        }

        jobs.push(job.clone());
        Ok(job.id)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<NormalizedJob>> {
        Ok(read(&self.jobs).iter().find(|j| j.id == id).cloned())
    }

    async fn recent_jobs(&self, source: Option<&str>, limit: usize) -> Result<Vec<NormalizedJob>> {
        let mut jobs: Vec<_> = read(&self.jobs)
            .iter()
            .filter(|j| source.map_or(true, |s| j.source == s))
            .cloned()
            .collect();

        // Newest first, undated jobs last
        jobs.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
        jobs.truncate(limit);
        Ok(jobs)
    }
}

#[async_trait]
impl SearchRecordStore for MemoryStore {
    async fn insert_search_record(&self, record: &SearchRecord) -> Result<()> {
        write(&self.searches).insert(record.id, record.clone());
        Ok(())
    }

    async fn update_search_record(&self, record: &SearchRecord) -> Result<()> {
        write(&self.searches).insert(record.id, record.clone());
        Ok(())
    }

    async fn get_search_record(&self, id: SearchId) -> Result<Option<SearchRecord>> {
        Ok(read(&self.searches).get(&id).cloned())
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchParams;
    use chrono::Duration;

    fn posting(url: &str, company: &str) -> RawPosting {
        RawPosting::new("s1", url)
            .with_field("title", "Rust Engineer")
            .with_field("company", company)
    }

    #[tokio::test]
    async fn test_raw_upsert_keeps_one_row_with_latest_payload() {
        let store = MemoryStore::new();
        let first = posting("https://x/1", "Acme").with_field("description", "old");
        let second = posting("https://x/1", "Acme").with_field("description", "new");

        let id1 = store.upsert_raw_posting(&first).await.unwrap();
        let id2 = store.upsert_raw_posting(&second).await.unwrap();

        assert_eq!(id1, id2);
        assert_eq!(store.raw_count(), 1);
        let stored = store.get_raw_posting(id1).await.unwrap().unwrap();
        assert_eq!(stored.posting.field("description"), Some("new"));
    }

    #[tokio::test]
    async fn test_same_url_different_source_is_distinct() {
        let store = MemoryStore::new();
        let mut other = posting("https://x/1", "Acme");
        other.source = "s2".into();

        store.upsert_raw_posting(&posting("https://x/1", "Acme")).await.unwrap();
        store.upsert_raw_posting(&other).await.unwrap();

        assert_eq!(store.raw_count(), 2);
        assert!(store.find_raw_by_url("s2", "https://x/1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fuzzy_candidates_are_scoped() {
        let store = MemoryStore::new();
        let old = posting("https://x/old", "Acme").with_fetched_at(Utc::now() - Duration::days(30));
        let mut other_source = posting("https://x/other", "Acme");
        other_source.source = "s2".into();

        store.upsert_raw_posting(&posting("https://x/1", "ACME Corp")).await.unwrap();
        store.upsert_raw_posting(&posting("https://x/2", "Globex")).await.unwrap();
        store.upsert_raw_posting(&old).await.unwrap();
        store.upsert_raw_posting(&other_source).await.unwrap();

        let query = CandidateQuery {
            source: "s1",
            company: "acme",
            since: Utc::now() - Duration::days(7),
            limit: 50,
        };
        let candidates = store.find_fuzzy_candidates(&query).await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].posting.url, "https://x/1");
    }

    #[tokio::test]
    async fn test_fuzzy_candidates_respect_limit() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .upsert_raw_posting(&posting(&format!("https://x/{}", i), "Acme"))
                .await
                .unwrap();
        }

        let query = CandidateQuery {
            source: "s1",
            company: "acme",
            since: Utc::now() - Duration::days(7),
            limit: 3,
        };
        assert_eq!(store.find_fuzzy_candidates(&query).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_fuzzy_candidates_follow_refetch_time() {
        let store = MemoryStore::new();
        let two_days_ago = Utc::now() - Duration::days(2);
        let first = posting("https://x/1", "Acme").with_fetched_at(two_days_ago);
        let second =
            posting("https://x/2", "Acme").with_fetched_at(two_days_ago + Duration::days(1));
        store.upsert_raw_posting(&first).await.unwrap();
        store.upsert_raw_posting(&second).await.unwrap();

        // Refetching keeps the row in place but moves its fetch time forward
        let refetched = posting("https://x/1", "Acme").with_fetched_at(Utc::now());
        store.upsert_raw_posting(&refetched).await.unwrap();

        let query = CandidateQuery {
            source: "s1",
            company: "acme",
            since: Utc::now() - Duration::days(7),
            limit: 1,
        };
        let candidates = store.find_fuzzy_candidates(&query).await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].posting.url, "https://x/1");
    }

    #[tokio::test]
    async fn test_job_upsert_preserves_identity() {
        let store = MemoryStore::new();
        let first = NormalizedJob::new("s1", "Rust Engineer", "Acme", "https://x/1");
        let second = NormalizedJob::new("s1", "Senior Rust Engineer", "Acme", "https://x/1");

        let id1 = store.upsert_job(&first).await.unwrap();
        let id2 = store.upsert_job(&second).await.unwrap();

        assert_eq!(id1, id2);
        assert_eq!(store.job_count(), 1);
        let job = store.get_job(id1).await.unwrap().unwrap();
        assert_eq!(job.title, "Senior Rust Engineer");
        assert!(job.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_recent_jobs_orders_by_posted_date() {
        let store = MemoryStore::new();
        let mut older = NormalizedJob::new("s1", "Older", "Acme", "https://x/1");
        older.posted_at = Some(Utc::now() - Duration::days(3));
        let mut newer = NormalizedJob::new("s1", "Newer", "Acme", "https://x/2");
        newer.posted_at = Some(Utc::now());
        let undated = NormalizedJob::new("s1", "Undated", "Acme", "https://x/3");
        let elsewhere = NormalizedJob::new("s2", "Elsewhere", "Acme", "https://x/4");

        for job in [&older, &undated, &newer, &elsewhere] {
            store.upsert_job(job).await.unwrap();
        }

        let titles: Vec<_> = store
            .recent_jobs(Some("s1"), 10)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.title)
            .collect();
        assert_eq!(titles, vec!["Newer", "Older", "Undated"]);
    }

    #[tokio::test]
    async fn test_search_record_insert_then_update() {
        let store = MemoryStore::new();
        let params = SearchParams::builder().query("rust").source("s1").build();
        let mut record = SearchRecord::new(&params);

        store.insert_search_record(&record).await.unwrap();
        record.start();
        store.update_search_record(&record).await.unwrap();

        let stored = store.get_search_record(record.id).await.unwrap().unwrap();
        assert_eq!(stored, record);
        assert_eq!(store.search_count(), 1);
    }
}

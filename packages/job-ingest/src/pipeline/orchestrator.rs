//! Search run orchestration: fetch → dedup → store → normalize.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::agents::SourceAgent;
use crate::config::DedupConfig;
use crate::dedup::{Deduplicator, DuplicateCheck, MatchKind};
use crate::error::{IngestError, Result};
use crate::ids::{JobId, RawPostingId};
use crate::store::IngestStore;
use crate::types::{RawPosting, SearchParams, SearchRecord, SearchStatus};

/// What happened to one fetched posting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemOutcome {
    /// Already known; nothing written
    Duplicate {
        existing_id: RawPostingId,
        matched_by: MatchKind,
    },

    /// Stored as a raw posting and a normalized job
    Stored {
        raw_posting_id: RawPostingId,
        job_id: JobId,
    },
}

/// Per-item result of a run.
#[derive(Debug)]
pub struct ItemResult {
    pub url: String,
    pub result: std::result::Result<ItemOutcome, IngestError>,
}

impl ItemResult {
    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }
}

/// Final record of a run plus the outcome of every fetched posting.
#[derive(Debug)]
pub struct RunSummary {
    pub record: SearchRecord,
    pub items: Vec<ItemResult>,
}

impl RunSummary {
    /// Items that failed, in fetch order.
    pub fn failures(&self) -> impl Iterator<Item = &ItemResult> {
        self.items.iter().filter(|item| item.is_failure())
    }

    /// Whether the run completed with no failed items.
    pub fn is_success(&self) -> bool {
        self.record.status == SearchStatus::Completed && self.record.failed_count == 0
    }
}

/// Drives search runs against a store.
///
/// Items within a run are processed sequentially in fetch order. Several
/// runs may share one orchestrator concurrently.
pub struct IngestionOrchestrator<S> {
    store: Arc<S>,
    dedup: Deduplicator<S>,
}

impl<S: IngestStore> IngestionOrchestrator<S> {
    pub fn new(store: Arc<S>, dedup: DedupConfig) -> Self {
        Self {
            dedup: Deduplicator::new(Arc::clone(&store), dedup),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one search end to end.
    ///
    /// A failed fetch fails the run; a failed item is counted and skipped.
    /// Only errors persisting the search record are returned as `Err`.
    /// The record is attributed to `agent.source()`.
    #[instrument(
        skip(self, params, agent),
        fields(source = %agent.source(), query = %params.query)
    )]
    pub async fn run<A>(&self, params: &SearchParams, agent: &A) -> Result<RunSummary>
    where
        A: SourceAgent + ?Sized,
    {
        let mut record = SearchRecord::new(params);
        if record.source != agent.source() {
            warn!(
                requested = %record.source,
                agent = %agent.source(),
                "Search source differs from agent source"
            );
            record.source = agent.source().to_string();
        }
        self.store.insert_search_record(&record).await?;

        record.start();
        self.store.update_search_record(&record).await?;
        info!(search_id = %record.id, "Starting search");

        let postings = match agent.fetch(params).await {
            Ok(postings) => postings,
            Err(e) => {
                error!(search_id = %record.id, error = %e, "Fetch failed");
                record.fail(e.to_string());
                self.store.update_search_record(&record).await?;
                return Ok(RunSummary {
                    record,
                    items: Vec::new(),
                });
            }
        };

        record.results_count = postings.len();
        info!(search_id = %record.id, results = postings.len(), "Fetched postings");

        let mut items = Vec::with_capacity(postings.len());
        for posting in &postings {
            let result = self.ingest_posting(posting, agent).await;

            match &result {
                Ok(ItemOutcome::Duplicate { .. }) => record.duplicate_count += 1,
                Ok(ItemOutcome::Stored { .. }) => record.new_count += 1,
                Err(e) => {
                    warn!(url = %posting.url, error = %e, "Failed to ingest posting");
                    record.failed_count += 1;
                }
            }

            items.push(ItemResult {
                url: posting.url.clone(),
                result,
            });
        }

        record.complete();
        self.store.update_search_record(&record).await?;

        info!(
            search_id = %record.id,
            results = record.results_count,
            new = record.new_count,
            duplicates = record.duplicate_count,
            failed = record.failed_count,
            "Search complete"
        );

        Ok(RunSummary { record, items })
    }

    async fn ingest_posting<A>(&self, posting: &RawPosting, agent: &A) -> Result<ItemOutcome>
    where
        A: SourceAgent + ?Sized,
    {
        if let DuplicateCheck::Duplicate {
            existing_id,
            matched_by,
        } = self.dedup.is_duplicate(posting).await?
        {
            return Ok(ItemOutcome::Duplicate {
                existing_id,
                matched_by,
            });
        }

        let raw_posting_id = self.store.upsert_raw_posting(posting).await?;

        let mut job = agent.normalize(posting).await?;
        job.raw_posting_id = Some(raw_posting_id);
        let job_id = self.store.upsert_job(&job).await?;

        info!(url = %posting.url, job_id = %job_id, "Stored new posting");
        Ok(ItemOutcome::Stored {
            raw_posting_id,
            job_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JobStore, MemoryStore, RawPostingStore, SearchRecordStore};
    use crate::testing::{posting, FailingStore, MockAgent};

    fn params() -> SearchParams {
        SearchParams::builder().query("engineer").source("s1").build()
    }

    fn orchestrator() -> IngestionOrchestrator<MemoryStore> {
        IngestionOrchestrator::new(Arc::new(MemoryStore::new()), DedupConfig::default())
    }

    #[tokio::test]
    async fn test_new_and_duplicate_postings() {
        let orchestrator = orchestrator();
        let store = orchestrator.store();
        let a = posting("s1", "https://x/a", "Rust Engineer", "Acme");
        let a_id = store.upsert_raw_posting(&a).await.unwrap();
        let a_before = store.get_raw_posting(a_id).await.unwrap().unwrap();

        let agent = MockAgent::new("s1").with_postings([
            a.clone().with_field("description", "changed upstream"),
            posting("s1", "https://x/b", "Data Scientist", "Globex"),
            posting("s1", "https://x/c", "Chef", "Bistro"),
        ]);

        let summary = orchestrator.run(&params(), &agent).await.unwrap();
        let record = &summary.record;

        assert_eq!(record.status, SearchStatus::Completed);
        assert_eq!(record.results_count, 3);
        assert_eq!(record.new_count, 2);
        assert_eq!(record.duplicate_count, 1);
        assert_eq!(record.failed_count, 0);
        assert!(record.completed_at.is_some());
        assert!(summary.is_success());

        assert_eq!(store.job_count(), 2);
        assert_eq!(
            store.get_raw_posting(a_id).await.unwrap().unwrap(),
            a_before
        );
        assert!(matches!(
            summary.items[0].result,
            Ok(ItemOutcome::Duplicate { existing_id, matched_by: MatchKind::Url }) if existing_id == a_id
        ));
    }

    #[tokio::test]
    async fn test_fetch_failure_fails_run() {
        let orchestrator = orchestrator();
        let agent = MockAgent::new("s1").failing_fetch("connection refused");

        let summary = orchestrator.run(&params(), &agent).await.unwrap();
        let record = &summary.record;

        assert_eq!(record.status, SearchStatus::Failed);
        assert!(record.error_message.as_deref().unwrap().contains("connection refused"));
        assert!(record.completed_at.is_some());
        assert_eq!(record.results_count, 0);
        assert!(summary.items.is_empty());

        let stored = orchestrator
            .store()
            .get_search_record(record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&stored, record);
    }

    #[tokio::test]
    async fn test_normalization_failure_is_isolated() {
        let orchestrator = orchestrator();
        let agent = MockAgent::new("s1")
            .with_postings([
                posting("s1", "https://x/1", "Rust Engineer", "Acme"),
                posting("s1", "https://x/2", "Go Engineer", "Initech"),
                posting("s1", "https://x/3", "Chef", "Bistro"),
            ])
            .failing_normalize("https://x/2");

        let summary = orchestrator.run(&params(), &agent).await.unwrap();
        let record = &summary.record;

        assert_eq!(record.status, SearchStatus::Completed);
        assert_eq!(record.new_count, 2);
        assert_eq!(record.duplicate_count, 0);
        assert_eq!(record.failed_count, 1);
        assert_eq!(
            record.new_count + record.duplicate_count + record.failed_count,
            record.results_count
        );
        assert!(!summary.is_success());

        let failures: Vec<_> = summary.failures().map(|item| item.url.as_str()).collect();
        assert_eq!(failures, vec!["https://x/2"]);
        assert_eq!(
            agent.normalize_calls(),
            vec!["https://x/1", "https://x/2", "https://x/3"]
        );
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let orchestrator = orchestrator();
        let agent = MockAgent::new("s1").with_postings([
            posting("s1", "https://x/1", "Rust Engineer", "Acme"),
            posting("s1", "https://x/2", "Chef", "Bistro"),
        ]);

        let first = orchestrator.run(&params(), &agent).await.unwrap();
        let second = orchestrator.run(&params(), &agent).await.unwrap();

        assert_eq!(first.record.new_count, 2);
        assert_eq!(second.record.new_count, 0);
        assert_eq!(second.record.duplicate_count, 2);
        assert_eq!(orchestrator.store().raw_count(), 2);
        assert_eq!(orchestrator.store().job_count(), 2);
        assert_eq!(orchestrator.store().search_count(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_within_one_batch() {
        let orchestrator = orchestrator();
        let agent = MockAgent::new("s1").with_postings([
            posting("s1", "https://x/1", "Senior Rust Engineer", "Acme"),
            posting("s1", "https://x/1?ref=feed", "Senior Rust Engineer!", "Acme"),
        ]);

        let summary = orchestrator.run(&params(), &agent).await.unwrap();

        assert_eq!(summary.record.new_count, 1);
        assert_eq!(summary.record.duplicate_count, 1);
        assert!(matches!(
            summary.items[1].result,
            Ok(ItemOutcome::Duplicate { matched_by: MatchKind::Fuzzy { .. }, .. })
        ));
    }

    #[tokio::test]
    async fn test_stored_job_links_raw_posting() {
        let orchestrator = orchestrator();
        let raw = posting("s1", "https://x/1", "Rust Engineer", "Acme");
        let agent = MockAgent::new("s1").with_posting(raw);

        let summary = orchestrator.run(&params(), &agent).await.unwrap();

        let Ok(ItemOutcome::Stored { raw_posting_id, job_id }) = summary.items[0].result else {
            panic!("expected stored posting");
        };
        let job = orchestrator.store().get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.raw_posting_id, Some(raw_posting_id));
    }

    #[tokio::test]
    async fn test_empty_fetch_completes() {
        let orchestrator = orchestrator();
        let summary = orchestrator
            .run(&params(), &MockAgent::new("s1"))
            .await
            .unwrap();

        assert_eq!(summary.record.status, SearchStatus::Completed);
        assert_eq!(summary.record.results_count, 0);
    }

    fn batch() -> MockAgent {
        MockAgent::new("s1").with_postings([
            posting("s1", "https://x/1", "Rust Engineer", "Acme"),
            posting("s1", "https://x/2", "Go Engineer", "Initech"),
            posting("s1", "https://x/3", "Chef", "Bistro"),
        ])
    }

    async fn run_against(store: FailingStore) -> (RunSummary, Arc<FailingStore>) {
        let store = Arc::new(store);
        let orchestrator = IngestionOrchestrator::new(Arc::clone(&store), DedupConfig::default());
        let summary = orchestrator.run(&params(), &batch()).await.unwrap();
        (summary, store)
    }

    fn assert_one_failure(summary: &RunSummary) {
        let record = &summary.record;
        assert_eq!(record.status, SearchStatus::Completed);
        assert_eq!(record.results_count, 3);
        assert_eq!(record.new_count, 2);
        assert_eq!(record.failed_count, 1);
        assert_eq!(
            record.new_count + record.duplicate_count + record.failed_count,
            record.results_count
        );

        let failures: Vec<_> = summary.failures().map(|item| item.url.as_str()).collect();
        assert_eq!(failures, vec!["https://x/2"]);
        assert!(matches!(summary.items[1].result, Err(IngestError::Storage(_))));
    }

    #[tokio::test]
    async fn test_raw_upsert_failure_is_isolated() {
        let store = FailingStore::new().failing_raw_upsert("https://x/2");
        let (summary, store) = run_against(store).await;

        assert_one_failure(&summary);
        assert_eq!(store.inner().raw_count(), 2);
        assert_eq!(store.inner().job_count(), 2);
        assert!(matches!(summary.items[2].result, Ok(ItemOutcome::Stored { .. })));
    }

    #[tokio::test]
    async fn test_job_upsert_failure_is_isolated() {
        let store = FailingStore::new().failing_job_upsert("https://x/2");
        let (summary, store) = run_against(store).await;

        assert_one_failure(&summary);
        // The raw posting was written before the job failed
        assert_eq!(store.inner().raw_count(), 3);
        assert_eq!(store.inner().job_count(), 2);
    }

    #[tokio::test]
    async fn test_dedup_lookup_failure_is_isolated() {
        let store = FailingStore::new().failing_lookup("https://x/2");
        let (summary, store) = run_against(store).await;

        assert_one_failure(&summary);
        assert_eq!(store.inner().raw_count(), 2);

        let persisted = store
            .get_search_record(summary.record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted, summary.record);
    }

    #[tokio::test]
    async fn test_record_is_attributed_to_agent_source() {
        let orchestrator = orchestrator();
        let jsearch = SearchParams::builder().query("engineer").source("jsearch").build();
        let raw = posting("s1", "https://x/1", "Rust Engineer", "Acme");
        let agent = MockAgent::new("s1").with_posting(raw);

        let summary = orchestrator.run(&jsearch, &agent).await.unwrap();

        assert_eq!(summary.record.source, "s1");
        let persisted = orchestrator
            .store()
            .get_search_record(summary.record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.source, "s1");
    }
}

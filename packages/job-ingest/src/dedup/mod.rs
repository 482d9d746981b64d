//! Tiered duplicate detection against previously stored postings.
//!
//! Checks run cheapest and most precise first, stopping at the first hit:
//! 1. exact `(source, url)` match
//! 2. content hash match across all sources (re-posts under a new URL)
//! 3. fuzzy title match among recent postings from the same source and
//!    company, bounded by [`DedupConfig`]

mod similarity;

pub use similarity::similarity_ratio;

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::DedupConfig;
use crate::error::Result;
use crate::ids::RawPostingId;
use crate::store::{CandidateQuery, RawPostingStore};
use crate::types::RawPosting;

/// Which tier identified a duplicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    Url,
    ContentHash,
    Fuzzy { similarity: f64 },
}

/// Outcome of a duplicate check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DuplicateCheck {
    Unique,
    Duplicate {
        existing_id: RawPostingId,
        matched_by: MatchKind,
    },
}

impl DuplicateCheck {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DuplicateCheck::Duplicate { .. })
    }

    pub fn existing_id(&self) -> Option<RawPostingId> {
        match self {
            DuplicateCheck::Duplicate { existing_id, .. } => Some(*existing_id),
            DuplicateCheck::Unique => None,
        }
    }
}

/// Read-only duplicate detector.
pub struct Deduplicator<S> {
    store: Arc<S>,
    config: DedupConfig,
}

impl<S: RawPostingStore> Deduplicator<S> {
    pub fn new(store: Arc<S>, config: DedupConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Check a posting against stored postings.
    pub async fn is_duplicate(&self, posting: &RawPosting) -> Result<DuplicateCheck> {
        if let Some(existing_id) = self
            .store
            .find_raw_by_url(&posting.source, &posting.url)
            .await?
        {
            info!(url = %posting.url, "Duplicate found by URL");
            return Ok(DuplicateCheck::Duplicate {
                existing_id,
                matched_by: MatchKind::Url,
            });
        }

        if let Some(existing_id) = self
            .store
            .find_raw_by_content_hash(&posting.content_hash())
            .await?
        {
            info!(url = %posting.url, "Duplicate found by content hash");
            return Ok(DuplicateCheck::Duplicate {
                existing_id,
                matched_by: MatchKind::ContentHash,
            });
        }

        if let Some((existing_id, similarity)) = self.find_fuzzy_match(posting).await? {
            info!(url = %posting.url, similarity, "Duplicate found by fuzzy match");
            return Ok(DuplicateCheck::Duplicate {
                existing_id,
                matched_by: MatchKind::Fuzzy { similarity },
            });
        }

        Ok(DuplicateCheck::Unique)
    }

    /// Compare titles against recent postings from the same source and company.
    async fn find_fuzzy_match(&self, posting: &RawPosting) -> Result<Option<(RawPostingId, f64)>> {
        let title = posting.title().unwrap_or_default().to_lowercase();
        let company = posting.company().unwrap_or_default().to_lowercase();

        if title.is_empty() || company.is_empty() {
            return Ok(None);
        }

        let query = CandidateQuery {
            source: &posting.source,
            company: &company,
            since: Utc::now() - self.config.lookback,
            limit: self.config.candidate_limit,
        };
        let candidates = self.store.find_fuzzy_candidates(&query).await?;

        for candidate in candidates {
            let existing_title = candidate.posting.title().unwrap_or_default().to_lowercase();
            let similarity = similarity_ratio(&title, &existing_title);

            if similarity >= self.config.similarity_threshold {
                debug!(
                    similarity,
                    title = %title,
                    existing_title = %existing_title,
                    "Fuzzy match"
                );
                return Ok(Some((candidate.id, similarity)));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn posting(url: &str, title: &str, company: &str, description: &str) -> RawPosting {
        RawPosting::new("s1", url)
            .with_field("title", title)
            .with_field("company", company)
            .with_field("location", "Berlin")
            .with_field("description", description)
    }

    async fn dedup_with(existing: &[RawPosting]) -> Deduplicator<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for p in existing {
            store.upsert_raw_posting(p).await.unwrap();
        }
        Deduplicator::new(store, DedupConfig::default())
    }

    #[tokio::test]
    async fn test_unique_posting() {
        let dedup = dedup_with(&[posting("https://x/1", "Rust Engineer", "Acme", "a")]).await;
        let check = dedup
            .is_duplicate(&posting("https://x/2", "Chef", "Bistro", "b"))
            .await
            .unwrap();

        assert_eq!(check, DuplicateCheck::Unique);
        assert!(check.existing_id().is_none());
    }

    #[tokio::test]
    async fn test_url_match_wins_first() {
        let existing = posting("https://x/1", "Rust Engineer", "Acme", "a");
        let dedup = dedup_with(&[existing.clone()]).await;

        let check = dedup
            .is_duplicate(&posting("https://x/1", "Totally Different", "Other", "z"))
            .await
            .unwrap();

        assert!(matches!(
            check,
            DuplicateCheck::Duplicate { matched_by: MatchKind::Url, .. }
        ));
    }

    #[tokio::test]
    async fn test_content_hash_matches_across_sources() {
        let dedup = dedup_with(&[posting("https://x/1", "Rust Engineer", "Acme", "same")]).await;
        let mut repost = posting("https://y/9?utm=feed", "RUST ENGINEER ", "acme", "same");
        repost.source = "s2".into();

        let check = dedup.is_duplicate(&repost).await.unwrap();

        assert!(matches!(
            check,
            DuplicateCheck::Duplicate { matched_by: MatchKind::ContentHash, .. }
        ));
    }

    #[tokio::test]
    async fn test_fuzzy_threshold_is_inclusive() {
        let dedup = dedup_with(&[posting("https://x/1", "abcdefghij", "Acme", "one")]).await;

        let check = dedup
            .is_duplicate(&posting("https://x/2", "ABCDEFGHIX", "Acme", "two"))
            .await
            .unwrap();

        match check {
            DuplicateCheck::Duplicate { matched_by: MatchKind::Fuzzy { similarity }, .. } => {
                assert_eq!(similarity, 0.90)
            }
            other => panic!("expected fuzzy duplicate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fuzzy_below_threshold_is_unique() {
        let shared = "c".repeat(89);
        let dedup = dedup_with(&[posting(
            "https://x/1",
            &format!("{}{}", shared, "a".repeat(11)),
            "Acme",
            "one",
        )])
        .await;

        let check = dedup
            .is_duplicate(&posting(
                "https://x/2",
                &format!("{}{}", shared, "b".repeat(11)),
                "Acme",
                "two",
            ))
            .await
            .unwrap();

        assert_eq!(check, DuplicateCheck::Unique);
    }

    #[tokio::test]
    async fn test_fuzzy_requires_same_company() {
        let dedup = dedup_with(&[posting("https://x/1", "Rust Engineer", "Acme", "one")]).await;

        let check = dedup
            .is_duplicate(&posting("https://x/2", "Rust Engineer", "Globex", "two"))
            .await
            .unwrap();

        assert_eq!(check, DuplicateCheck::Unique);
    }

    #[tokio::test]
    async fn test_fuzzy_company_is_substring_match() {
        let dedup =
            dedup_with(&[posting("https://x/1", "Rust Engineer", "Acme Corporation", "one")]).await;

        let check = dedup
            .is_duplicate(&posting("https://x/2", "Rust Engineer", "ACME", "two"))
            .await
            .unwrap();

        assert!(check.is_duplicate());
    }

    #[tokio::test]
    async fn test_fuzzy_skipped_without_title_or_company() {
        let dedup = dedup_with(&[posting("https://x/1", "Rust Engineer", "Acme", "one")]).await;
        let untitled = RawPosting::new("s1", "https://x/2")
            .with_field("company", "Acme")
            .with_field("description", "two");

        assert_eq!(dedup.is_duplicate(&untitled).await.unwrap(), DuplicateCheck::Unique);
    }

    #[tokio::test]
    async fn test_fuzzy_ignores_postings_outside_window() {
        let old = posting("https://x/1", "Rust Engineer", "Acme", "one")
            .with_fetched_at(Utc::now() - chrono::Duration::days(8));
        let dedup = dedup_with(&[old]).await;

        let check = dedup
            .is_duplicate(&posting("https://x/2", "Rust Engineer", "Acme", "two"))
            .await
            .unwrap();

        assert_eq!(check, DuplicateCheck::Unique);
    }
}

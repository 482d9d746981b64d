//! Ingestion pipeline.
//!
//! [`IngestionOrchestrator::run`] turns one search into an auditable
//! [`SearchRecord`](crate::types::SearchRecord): fetch through a
//! [`SourceAgent`](crate::agents::SourceAgent), skip known postings, store the
//! rest raw and normalized, and count what happened to each.

mod orchestrator;

pub use orchestrator::{IngestionOrchestrator, ItemOutcome, ItemResult, RunSummary};

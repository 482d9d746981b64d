//! Search parameters and the auditable record of one ingestion run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use typed_builder::TypedBuilder;

use crate::ids::SearchId;

/// Parameters for one search against one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct SearchParams {
    pub query: String,

    #[builder(default, setter(strip_option))]
    pub location: Option<String>,

    /// Source the search runs against
    pub source: String,

    // Filters
    #[builder(default = false)]
    pub remote_only: bool,
    #[builder(default, setter(strip_option))]
    pub employment_type: Option<String>,
    #[builder(default, setter(strip_option))]
    pub experience_level: Option<String>,
    #[builder(default = 7)]
    pub posted_within_days: u32,

    #[builder(default = 50)]
    pub max_results: usize,
}

impl SearchParams {
    /// Filter portion of the parameters, as recorded on the search record.
    pub fn filters(&self) -> Value {
        json!({
            "remote_only": self.remote_only,
            "employment_type": self.employment_type,
            "experience_level": self.experience_level,
            "posted_within_days": self.posted_within_days,
            "max_results": self.max_results,
        })
    }
}

/// Lifecycle of a search record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl SearchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStatus::Pending => "pending",
            SearchStatus::InProgress => "in_progress",
            SearchStatus::Completed => "completed",
            SearchStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SearchStatus::Completed | SearchStatus::Failed)
    }
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SearchStatus::Pending),
            "in_progress" => Ok(SearchStatus::InProgress),
            "completed" => Ok(SearchStatus::Completed),
            "failed" => Ok(SearchStatus::Failed),
            other => Err(format!("unknown search status: {}", other)),
        }
    }
}

/// Audit record for one ingestion run.
///
/// Only the orchestrator mutates a record, and only until `completed_at`
/// is set. For a completed run every fetched item lands in exactly one of
/// `new_count`, `duplicate_count` or `failed_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: SearchId,
    pub query: String,
    pub location: Option<String>,
    pub source: String,
    pub filters: Value,
    pub status: SearchStatus,
    pub results_count: usize,
    pub new_count: usize,
    pub duplicate_count: usize,
    pub failed_count: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl SearchRecord {
    /// Create a pending record for a search.
    pub fn new(params: &SearchParams) -> Self {
        Self {
            id: SearchId::new(),
            query: params.query.clone(),
            location: params.location.clone(),
            source: params.source.clone(),
            filters: params.filters(),
            status: SearchStatus::Pending,
            results_count: 0,
            new_count: 0,
            duplicate_count: 0,
            failed_count: 0,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }

    /// Whether the record has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Wall-clock duration of the run, once finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|done| done - self.started_at)
    }

    pub(crate) fn start(&mut self) {
        if self.status == SearchStatus::Pending {
            self.status = SearchStatus::InProgress;
        }
    }

    pub(crate) fn complete(&mut self) {
        self.finish(SearchStatus::Completed, None);
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.finish(SearchStatus::Failed, Some(message.into()));
    }

    fn finish(&mut self, status: SearchStatus, error_message: Option<String>) {
        if self.is_finished() {
            return;
        }
        self.status = status;
        self.error_message = error_message;
        self.completed_at = Some(Utc::now());
    }
}

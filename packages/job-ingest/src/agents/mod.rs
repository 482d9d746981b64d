//! Source agents: fetch raw postings from one provider and normalize them.
//!
//! Agents are supplied by the caller and driven by the
//! [`IngestionOrchestrator`](crate::pipeline::IngestionOrchestrator).
//! Any outbound request must be preceded by
//! [`SourceRateLimiter::acquire`](crate::rate_limit::SourceRateLimiter::acquire)
//! for the agent's source.

#[cfg(feature = "jsearch")]
pub mod jsearch;

#[cfg(feature = "jsearch")]
pub use jsearch::JSearchAgent;

use async_trait::async_trait;

use crate::error::{IngestError, Result};
use crate::types::{NormalizedJob, RawPosting, SearchParams};

/// A job source.
///
/// # Example
///
/// ```rust,ignore
/// use job_ingest::agents::SourceAgent;
///
/// struct Board { limiter: Arc<SourceRateLimiter>, client: reqwest::Client }
///
/// #[async_trait]
/// impl SourceAgent for Board {
///     fn source(&self) -> &str { "board" }
///
///     async fn fetch(&self, params: &SearchParams) -> Result<Vec<RawPosting>> {
///         self.limiter.acquire("board").await?;
///         // ... call the provider
///     }
///
///     async fn normalize(&self, raw: &RawPosting) -> Result<NormalizedJob> {
///         let title = required_field(raw, "title")?;
///         // ...
///     }
/// }
/// ```
#[async_trait]
pub trait SourceAgent: Send + Sync {
    /// Source name, used as the rate-limit key and stored on every posting.
    fn source(&self) -> &str;

    /// Fetch postings matching the search.
    ///
    /// Returns an empty vec when the provider has no results. Transport and
    /// authentication failures are [`IngestError::SourceUnavailable`].
    async fn fetch(&self, params: &SearchParams) -> Result<Vec<RawPosting>>;

    /// Convert a raw posting into the canonical job shape.
    ///
    /// Fails with [`IngestError::Normalization`] when title, company or the
    /// canonical URL is missing.
    async fn normalize(&self, raw: &RawPosting) -> Result<NormalizedJob>;
}

/// A non-blank string payload field, or a normalization error naming it.
pub fn required_field<'a>(raw: &'a RawPosting, field: &'static str) -> Result<&'a str> {
    raw.field(field)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| IngestError::Normalization {
            url: raw.url.clone(),
            field,
        })
}

/// The posting URL, or a normalization error when it is blank.
pub fn required_url(raw: &RawPosting) -> Result<&str> {
    let url = raw.url.trim();
    if url.is_empty() {
        return Err(IngestError::Normalization {
            url: String::new(),
            field: "url",
        });
    }
    Ok(url)
}

//! JSearch (RapidAPI) job aggregator agent.
//!
//! JSearch aggregates Indeed, LinkedIn, Glassdoor and others behind one
//! search endpoint. One call returns a single page of results.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::agents::{required_field, required_url, SourceAgent};
use crate::error::{IngestError, Result};
use crate::rate_limit::SourceRateLimiter;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::types::job::collapse_whitespace;
use crate::types::posting::HASHED_DESCRIPTION_CHARS;
use crate::types::{EmploymentType, LocationType, NormalizedJob, RawPosting, SearchParams};

/// Source name and rate-limit key.
pub const JSEARCH_SOURCE: &str = "jsearch";

const API_URL: &str = "https://jsearch.p.rapidapi.com/search";
const API_HOST: &str = "jsearch.p.rapidapi.com";

const MAX_SKILLS: usize = 20;

pub struct JSearchAgent {
    client: reqwest::Client,
    limiter: Arc<SourceRateLimiter>,
    retry: RetryPolicy,
    api_url: String,
}

impl JSearchAgent {
    /// Create an agent authenticating with a RapidAPI key.
    ///
    /// The limiter must have a `jsearch` source configured.
    pub fn new(api_key: &str, limiter: Arc<SourceRateLimiter>, timeout: Duration) -> Result<Self> {
        if !limiter.contains(JSEARCH_SOURCE) {
            return Err(IngestError::Config(format!(
                "no rate limit configured for {}",
                JSEARCH_SOURCE
            )));
        }

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| IngestError::Config("RAPIDAPI_KEY is not a valid header value".into()))?;
        headers.insert("X-RapidAPI-Key", key);
        headers.insert("X-RapidAPI-Host", HeaderValue::from_static(API_HOST));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| IngestError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            limiter,
            retry: RetryPolicy::default(),
            api_url: API_URL.to_string(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Point the agent at a different endpoint (e.g. a local stub).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// One rate-limited request.
    async fn search(&self, query: &[(&'static str, String)]) -> Result<SearchResponse> {
        self.limiter.acquire(JSEARCH_SOURCE).await?;

        let resp = self
            .client
            .get(&self.api_url)
            .query(query)
            .send()
            .await
            .map_err(|e| IngestError::source_unavailable(JSEARCH_SOURCE, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IngestError::source_unavailable(
                JSEARCH_SOURCE,
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }

        resp.json()
            .await
            .map_err(|e| IngestError::source_unavailable(JSEARCH_SOURCE, e))
    }
}

#[async_trait]
impl SourceAgent for JSearchAgent {
    fn source(&self) -> &str {
        JSEARCH_SOURCE
    }

    async fn fetch(&self, params: &SearchParams) -> Result<Vec<RawPosting>> {
        let query = query_params(params);
        info!(query = %query[0].1, "Searching JSearch");

        let response = retry_with_backoff(self.retry, || self.search(&query)).await?;

        if response.status.as_deref() != Some("OK") {
            warn!(status = ?response.status, "JSearch returned non-OK status");
            return Ok(Vec::new());
        }

        let total = response.data.len();
        let postings: Vec<RawPosting> = response
            .data
            .into_iter()
            .enumerate()
            .filter_map(|(idx, entry)| match serde_json::from_value::<JobResult>(entry) {
                Ok(job) => Some(job.into_raw_posting()),
                Err(e) => {
                    warn!(index = idx, error = %e, "Skipping unparsable JSearch result");
                    None
                }
            })
            .take(params.max_results)
            .collect();

        debug!(returned = total, kept = postings.len(), "Parsed JSearch results");
        Ok(postings)
    }

    async fn normalize(&self, raw: &RawPosting) -> Result<NormalizedJob> {
        let title = required_field(raw, "title")?;
        let company = required_field(raw, "company")?;
        let url = raw
            .field("url")
            .filter(|u| !u.trim().is_empty())
            .map_or_else(|| required_url(raw), Ok)?;

        let is_remote = raw.payload.get("is_remote").and_then(Value::as_bool) == Some(true);
        let location = raw.field("location");
        let location_type = if is_remote
            || location.is_some_and(|l| l.trim().eq_ignore_ascii_case("remote"))
        {
            LocationType::Remote
        } else {
            LocationType::Onsite
        };

        let mut job = NormalizedJob::new(JSEARCH_SOURCE, title, company, url)
            .with_location_type(location_type)
            .with_description(raw.field("description").unwrap_or_default())
            .with_salary(salary(raw, "salary_min"), salary(raw, "salary_max"))
            .with_skills(skills(raw.payload.get("required_skills")));

        if let Some(location) = location {
            job = job.with_location(location);
        }
        if let Some(apply_url) = raw.field("apply_url").filter(|u| !u.trim().is_empty()) {
            job = job.with_apply_url(apply_url);
        }
        if let Some(employment_type) = raw.field("employment_type").and_then(employment_type) {
            job = job.with_employment_type(employment_type);
        }
        if let Some(currency) = raw.field("salary_currency").filter(|c| !c.is_empty()) {
            job.currency = currency.to_string();
        }
        job.salary_period = raw.field("salary_period").map(str::to_string);
        job.posted_at = raw.field("posted_date").and_then(parse_posted_at);

        Ok(job)
    }
}

// ============================================================================
// Request building
// ============================================================================

fn query_params(params: &SearchParams) -> Vec<(&'static str, String)> {
    let query = match &params.location {
        Some(location) => format!("{} in {}", params.query, location),
        None => params.query.clone(),
    };

    let mut query_params = vec![
        ("query", query),
        ("page", "1".to_string()),
        ("num_pages", "1".to_string()),
        ("date_posted", date_posted(params.posted_within_days).to_string()),
    ];

    if params.remote_only {
        query_params.push(("remote_jobs_only", "true".to_string()));
    }
    if let Some(employment_type) = &params.employment_type {
        query_params.push(("employment_types", employment_type.to_uppercase()));
    }

    query_params
}

fn date_posted(days: u32) -> &'static str {
    match days {
        1 => "today",
        3 => "3days",
        30 => "month",
        // No two-week bucket; 7, 14 and anything else use a week
        _ => "week",
    }
}

// ============================================================================
// Response parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: Option<String>,
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct JobResult {
    job_id: Option<String>,
    job_title: Option<String>,
    employer_name: Option<String>,
    employer_company_type: Option<String>,
    job_city: Option<String>,
    job_state: Option<String>,
    job_country: Option<String>,
    job_description: Option<String>,
    job_posted_at_datetime_utc: Option<String>,
    job_apply_link: Option<String>,
    job_google_link: Option<String>,
    job_employment_type: Option<String>,
    job_is_remote: Option<bool>,
    job_min_salary: Option<f64>,
    job_max_salary: Option<f64>,
    job_salary_currency: Option<String>,
    job_salary_period: Option<String>,
    job_required_experience: Option<Value>,
    job_required_skills: Option<Value>,
    job_benefits: Option<Value>,
    job_publisher: Option<String>,
}

impl JobResult {
    /// Apply link, else Google link, else a search for the job id.
    fn posting_url(&self) -> String {
        non_empty(&self.job_apply_link)
            .or_else(|| non_empty(&self.job_google_link))
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!(
                    "https://www.google.com/search?q={}",
                    self.job_id.as_deref().unwrap_or_default()
                )
            })
    }

    fn location(&self) -> String {
        let parts: Vec<&str> = [&self.job_city, &self.job_state, &self.job_country]
            .into_iter()
            .filter_map(non_empty)
            .collect();

        if parts.is_empty() {
            "Remote".to_string()
        } else {
            parts.join(", ")
        }
    }

    fn into_raw_posting(self) -> RawPosting {
        let url = self.posting_url();
        let location = self.location();
        let snippet: Option<String> = self
            .job_description
            .as_ref()
            .map(|d| d.chars().take(HASHED_DESCRIPTION_CHARS).collect());

        let mut posting = RawPosting::new(JSEARCH_SOURCE, url.clone())
            .with_field("job_key", self.job_id.clone())
            .with_field("title", self.job_title)
            .with_field("company", self.employer_name)
            .with_field("company_type", self.employer_company_type)
            .with_field("location", location)
            .with_field("description", self.job_description)
            .with_field("snippet", snippet)
            .with_field("posted_date", self.job_posted_at_datetime_utc)
            .with_field("url", url)
            .with_field("apply_url", self.job_apply_link)
            .with_field("employment_type", self.job_employment_type)
            .with_field("is_remote", self.job_is_remote)
            .with_field("salary_min", self.job_min_salary)
            .with_field("salary_max", self.job_max_salary)
            .with_field("salary_currency", self.job_salary_currency)
            .with_field("salary_period", self.job_salary_period)
            .with_field("required_experience", self.job_required_experience)
            .with_field("required_skills", self.job_required_skills)
            .with_field("benefits", self.job_benefits)
            .with_field("job_publisher", self.job_publisher);

        if let Some(job_id) = self.job_id {
            posting = posting.with_external_id(job_id);
        }
        posting
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// Normalization helpers
// ============================================================================

fn employment_type(raw: &str) -> Option<EmploymentType> {
    match raw.trim().to_uppercase().as_str() {
        "FULLTIME" => Some(EmploymentType::FullTime),
        "PARTTIME" => Some(EmploymentType::PartTime),
        "CONTRACTOR" => Some(EmploymentType::Contract),
        "INTERN" => Some(EmploymentType::Internship),
        _ => None,
    }
}

fn salary(raw: &RawPosting, key: &str) -> Option<i64> {
    raw.payload
        .get(key)
        .and_then(Value::as_f64)
        .map(|amount| amount.round() as i64)
}

/// Skills from a list or a comma-separated string, capped.
fn skills(value: Option<&Value>) -> Vec<String> {
    let skills: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .collect(),
        Some(Value::String(list)) => list.split(',').map(|s| s.trim().to_string()).collect(),
        _ => Vec::new(),
    };

    skills
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(|s| collapse_whitespace(&s))
        .take(MAX_SKILLS)
        .collect()
}

/// ISO-8601 timestamp; values without an offset are taken as UTC.
fn parse_posted_at(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    match NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            debug!(value, error = %e, "Failed to parse posted date");
            None
        }
    }
}

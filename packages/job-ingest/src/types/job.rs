//! Canonical job representation used by downstream consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ids::{JobId, RawPostingId};

/// Where the work happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Remote,
    Hybrid,
    Onsite,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Remote => "remote",
            LocationType::Hybrid => "hybrid",
            LocationType::Onsite => "onsite",
        }
    }

    /// Infer a location type from free text ("Remote - US", "Hybrid", ...).
    pub fn infer(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("remote") {
            LocationType::Remote
        } else if lower.contains("hybrid") {
            LocationType::Hybrid
        } else {
            LocationType::Onsite
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(LocationType::Remote),
            "hybrid" => Ok(LocationType::Hybrid),
            "onsite" => Ok(LocationType::Onsite),
            other => Err(format!("unknown location type: {}", other)),
        }
    }
}

/// Contract shape of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Temporary,
    Internship,
}

impl EmploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentType::FullTime => "full-time",
            EmploymentType::PartTime => "part-time",
            EmploymentType::Contract => "contract",
            EmploymentType::Temporary => "temporary",
            EmploymentType::Internship => "internship",
        }
    }
}

impl fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmploymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full-time" => Ok(EmploymentType::FullTime),
            "part-time" => Ok(EmploymentType::PartTime),
            "contract" => Ok(EmploymentType::Contract),
            "temporary" => Ok(EmploymentType::Temporary),
            "internship" => Ok(EmploymentType::Internship),
            other => Err(format!("unknown employment type: {}", other)),
        }
    }
}

/// Default status for freshly ingested jobs.
pub const ACTIVE_STATUS: &str = "active";

/// Default salary currency.
pub const DEFAULT_CURRENCY: &str = "USD";

/// A normalized job, unique per `(source, apply_url)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedJob {
    pub id: JobId,

    /// Raw posting this job was normalized from (set by the orchestrator)
    pub raw_posting_id: Option<RawPostingId>,

    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub location_type: Option<LocationType>,
    pub description: String,

    // Compensation
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub currency: String,
    pub salary_period: Option<String>,

    pub employment_type: Option<EmploymentType>,
    pub posted_at: Option<DateTime<Utc>>,
    pub skills: Vec<String>,

    // Provenance
    pub source: String,
    pub source_url: String,
    pub apply_url: String,

    pub status: String,
    pub processed_at: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl NormalizedJob {
    /// Create a job with the required fields; everything else defaults.
    ///
    /// Whitespace runs in title and company are collapsed. `apply_url`
    /// starts out equal to `source_url`.
    pub fn new(
        source: impl Into<String>,
        title: &str,
        company: &str,
        source_url: impl Into<String>,
    ) -> Self {
        let source_url = source_url.into();
        Self {
            id: JobId::new(),
            raw_posting_id: None,
            title: collapse_whitespace(title),
            company: collapse_whitespace(company),
            location: None,
            location_type: None,
            description: String::new(),
            salary_min: None,
            salary_max: None,
            currency: DEFAULT_CURRENCY.to_string(),
            salary_period: None,
            employment_type: None,
            posted_at: None,
            skills: Vec::new(),
            source: source.into(),
            apply_url: source_url.clone(),
            source_url,
            status: ACTIVE_STATUS.to_string(),
            processed_at: Utc::now(),
            last_updated: None,
        }
    }

    pub fn with_apply_url(mut self, apply_url: impl Into<String>) -> Self {
        self.apply_url = apply_url.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_location_type(mut self, location_type: LocationType) -> Self {
        self.location_type = Some(location_type);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = collapse_whitespace(description);
        self
    }

    pub fn with_salary(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.salary_min = min;
        self.salary_max = max;
        self
    }

    pub fn with_employment_type(mut self, employment_type: EmploymentType) -> Self {
        self.employment_type = Some(employment_type);
        self
    }

    pub fn with_skills(mut self, skills: Vec<String>) -> Self {
        self.skills = skills;
        self
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_defaults() {
        let job =
            NormalizedJob::new("s1", "  Senior   Rust\nEngineer ", "Acme  Corp", "https://x/1");

        assert_eq!(job.title, "Senior Rust Engineer");
        assert_eq!(job.company, "Acme Corp");
        assert_eq!(job.apply_url, "https://x/1");
        assert_eq!(job.currency, "USD");
        assert_eq!(job.status, "active");
        assert!(job.raw_posting_id.is_none());
    }

    #[test]
    fn test_location_type_inference() {
        assert_eq!(LocationType::infer("Remote - EU"), LocationType::Remote);
        assert_eq!(LocationType::infer("Hybrid (Berlin)"), LocationType::Hybrid);
        assert_eq!(LocationType::infer("Berlin, DE"), LocationType::Onsite);
    }

    #[test]
    fn test_enum_strings_match_serde() {
        let json = serde_json::to_string(&EmploymentType::FullTime).unwrap();
        assert_eq!(json, "\"full-time\"");
        assert_eq!("part-time".parse::<EmploymentType>().unwrap(), EmploymentType::PartTime);
        assert_eq!(LocationType::Onsite.to_string(), "onsite");
    }
}

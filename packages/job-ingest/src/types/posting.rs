//! Raw postings as fetched from a source, and their content hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Number of description characters that take part in the content hash.
pub const HASHED_DESCRIPTION_CHARS: usize = 500;

/// A job listing as returned by a source, prior to normalization.
///
/// `payload` holds the provider fields under well-known keys (`title`,
/// `company`, `location`, `description`, ...). The content hash is derived
/// from the payload on demand and is never accepted as input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPosting {
    /// Source name (e.g. "jsearch")
    pub source: String,

    /// Provider-side identifier, if the provider exposes one
    pub external_id: Option<String>,

    /// Canonical posting URL, unique per source
    pub url: String,

    /// Provider fields
    pub payload: Map<String, Value>,

    /// When the posting was fetched
    pub fetched_at: DateTime<Utc>,
}

impl RawPosting {
    /// Create a new raw posting with an empty payload.
    pub fn new(source: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            external_id: None,
            url: url.into(),
            payload: Map::new(),
            fetched_at: Utc::now(),
        }
    }

    /// Set the provider-side identifier.
    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    /// Set a payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Replace the whole payload.
    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Set the fetched timestamp.
    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    /// String value of a payload field, if present and a string.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Payload title, if present.
    pub fn title(&self) -> Option<&str> {
        self.field("title")
    }

    /// Payload company, if present.
    pub fn company(&self) -> Option<&str> {
        self.field("company")
    }

    /// Content hash of the normalized title/company/location/description
    /// projection. See [`content_hash`].
    pub fn content_hash(&self) -> String {
        content_hash(&self.payload)
    }
}

/// Hash the normalized projection of a posting payload.
///
/// Title, company and location are lowercased and trimmed; the description
/// contributes its first 500 characters unchanged. Missing or non-string
/// fields count as empty. The projection is serialized as JSON with sorted
/// keys and hashed with SHA-256 (lowercase hex).
pub fn content_hash(payload: &Map<String, Value>) -> String {
    let text = |key: &str| payload.get(key).and_then(Value::as_str).unwrap_or("");
    let normalize = |key: &str| text(key).to_lowercase().trim().to_string();

    let description: String = text("description")
        .chars()
        .take(HASHED_DESCRIPTION_CHARS)
        .collect();

    let mut projection = BTreeMap::new();
    projection.insert("company", normalize("company"));
    projection.insert("description", description);
    projection.insert("location", normalize("location"));
    projection.insert("title", normalize("title"));

    // A map of strings always serializes
    let canonical = serde_json::to_string(&projection).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

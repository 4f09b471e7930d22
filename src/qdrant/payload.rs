//! Helpers for constructing point payloads and identifiers.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Searchable fields stored with every indexed point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFields {
    /// Index-safe document key stored as the payload `id`.
    pub key: String,
    /// Unsanitized identity of the section within its blob; the point id derives from it.
    pub identity: String,
    /// Text content, or the image name for images.
    pub content: String,
    /// Content category (`pdf`, `image`, `json`).
    pub category: String,
    /// Citation target for the content.
    pub source_page: String,
    /// Originating blob.
    pub source_file: String,
}

/// Build the payload object stored alongside each point.
pub(crate) fn build_payload(fields: &DocumentFields, timestamp_rfc3339: &str) -> Value {
    let mut payload = Map::new();
    payload.insert("id".into(), Value::String(fields.key.clone()));
    payload.insert("content".into(), Value::String(fields.content.clone()));
    payload.insert("category".into(), Value::String(fields.category.clone()));
    payload.insert(
        "sourcepage".into(),
        Value::String(fields.source_page.clone()),
    );
    payload.insert(
        "sourcefile".into(),
        Value::String(fields.source_file.clone()),
    );
    payload.insert(
        "content_hash".into(),
        Value::String(compute_content_hash(&fields.content)),
    );
    payload.insert(
        "timestamp".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Compute a deterministic SHA-256 hash for a piece of content.
pub fn compute_content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derive the point id for a section identity; equal identities map to the same point.
pub fn point_id_for(identity: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, identity.as_bytes()).to_string()
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

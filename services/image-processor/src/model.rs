use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A label returned by the detection service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// Label name as reported by the service
    pub name: String,
    /// Confidence as a percentage (0 - 100)
    pub confidence: f32,
}

impl Label {
    pub fn new(name: impl Into<String>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// Metadata record produced for one source image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedImage {
    /// Unique record ID, assigned once per invocation
    pub id: String,
    /// Locator of the source object
    pub source_url: String,
    /// Bucket the source object lives in
    pub source_bucket: String,
    /// Key of the source object
    pub source_key: String,
    /// Locator of the generated thumbnail; empty until uploaded
    pub thumbnail_url: String,
    /// When processing began (RFC 3339, UTC)
    pub upload_timestamp: String,
    /// Labels at or above the confidence threshold, in detector order
    pub labels: Vec<Label>,
}

impl ProcessedImage {
    /// Start a record for the given source object
    pub fn new(bucket: &str, key: &str, scheme: &str) -> Self {
        Self::with_identity(bucket, key, scheme, Uuid::new_v4(), Utc::now())
    }

    fn with_identity(
        bucket: &str,
        key: &str,
        scheme: &str,
        id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.to_string(),
            source_url: object_locator(scheme, bucket, key),
            source_bucket: bucket.to_string(),
            source_key: key.to_string(),
            thumbnail_url: String::new(),
            upload_timestamp: started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            labels: Vec::new(),
        }
    }
}

/// Canonical `scheme://bucket/key` locator for an object
pub fn object_locator(scheme: &str, bucket: &str, key: &str) -> String {
    format!("{scheme}://{bucket}/{key}")
}

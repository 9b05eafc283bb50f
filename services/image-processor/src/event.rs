use aws_lambda_events::s3::S3Event;
use tracing::warn;

use crate::error::PipelineError;

/// The object named by a storage trigger event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceObject {
    pub bucket: String,
    pub key: String,
}

impl SourceObject {
    /// Extract the bucket and decoded key of the first record.
    ///
    /// Only one image is processed per invocation; further records are
    /// ignored with a warning.
    pub fn from_event(event: &S3Event) -> Result<Self, PipelineError> {
        let record = event
            .records
            .first()
            .ok_or_else(|| PipelineError::InvalidEvent("event contains no records".to_string()))?;

        if event.records.len() > 1 {
            warn!(
                ignored_records = event.records.len() - 1,
                "Event carries multiple records, processing only the first"
            );
        }

        let bucket = record
            .s3
            .bucket
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| PipelineError::InvalidEvent("record has no bucket name".to_string()))?;

        let raw_key = record
            .s3
            .object
            .key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| PipelineError::InvalidEvent("record has no object key".to_string()))?;

        Ok(Self {
            bucket: bucket.to_string(),
            key: decode_object_key(raw_key)?,
        })
    }
}

/// Decode a notification key: `+` is a space, `%XX` are escapes
pub fn decode_object_key(raw: &str) -> Result<String, PipelineError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|key| key.into_owned())
        .map_err(|e| PipelineError::InvalidEvent(format!("object key {raw:?} is not UTF-8: {e}")))
}

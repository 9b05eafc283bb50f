use thiserror::Error;

/// Errors that abort a single pipeline invocation
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid trigger event: {0}")]
    InvalidEvent(String),

    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Storage request failed for {bucket}/{key}: {message}")]
    TransientIo {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Label detection unavailable: {0}")]
    DetectionUnavailable(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to encode thumbnail: {0}")]
    EncodeError(String),

    #[error("Failed to persist metadata for image {id}: {message}")]
    PersistenceError { id: String, message: String },
}

impl PipelineError {
    /// Short, stable name of the error kind for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidEvent(_) => "invalid_event",
            PipelineError::NotFound { .. } => "not_found",
            PipelineError::TransientIo { .. } => "transient_io",
            PipelineError::DetectionUnavailable(_) => "detection_unavailable",
            PipelineError::UnsupportedFormat(_) => "unsupported_format",
            PipelineError::EncodeError(_) => "encode_error",
            PipelineError::PersistenceError { .. } => "persistence_error",
        }
    }
}

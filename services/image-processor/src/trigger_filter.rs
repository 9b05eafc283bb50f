use tracing::trace;

/// Decision on whether to process an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Run the full pipeline
    Process,
    /// Skip the object with given reason
    Skip { reason: String },
}

/// Decides which trigger events the pipeline acts on.
///
/// Thumbnails are written back into the watched bucket, so every upload the
/// pipeline makes raises a fresh event. Keys under the thumbnail namespace are
/// never processed.
#[derive(Debug, Clone)]
pub struct TriggerFilter {
    thumbnail_namespace: String,
}

impl TriggerFilter {
    pub fn new(thumbnail_namespace: impl Into<String>) -> Self {
        Self {
            thumbnail_namespace: thumbnail_namespace.into(),
        }
    }

    /// Determine if the object at `key` should be processed
    pub fn evaluate(&self, key: &str) -> TriggerDecision {
        if key.starts_with(&self.thumbnail_namespace) {
            return TriggerDecision::Skip {
                reason: format!(
                    "Key is under thumbnail namespace {}",
                    self.thumbnail_namespace
                ),
            };
        }

        if key.ends_with('/') {
            return TriggerDecision::Skip {
                reason: "Key is a folder placeholder".to_string(),
            };
        }

        trace!(key = %key, "Key accepted for processing");
        TriggerDecision::Process
    }
}

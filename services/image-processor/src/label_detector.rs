use crate::error::PipelineError;
use crate::model::Label;
use async_trait::async_trait;
use aws_sdk_rekognition::error::DisplayErrorContext;
use aws_sdk_rekognition::primitives::Blob;
use aws_sdk_rekognition::types::Image;
use aws_sdk_rekognition::Client as RekognitionClient;
use aws_types::SdkConfig;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, instrument};

/// External service that scores labels for an image
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LabelService: Send + Sync {
    /// Return labels in the service's order. `min_confidence` is a hint; the
    /// service may return lower-scored labels.
    async fn detect_labels(
        &self,
        image: Bytes,
        min_confidence: f32,
    ) -> Result<Vec<Label>, PipelineError>;
}

/// Rekognition `DetectLabels` client
pub struct RekognitionLabelService {
    client: RekognitionClient,
}

impl RekognitionLabelService {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self::from_client(RekognitionClient::new(sdk_config))
    }

    pub fn from_client(client: RekognitionClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LabelService for RekognitionLabelService {
    #[instrument(skip(self, image), fields(size_bytes = image.len()))]
    async fn detect_labels(
        &self,
        image: Bytes,
        min_confidence: f32,
    ) -> Result<Vec<Label>, PipelineError> {
        let response = self
            .client
            .detect_labels()
            .image(Image::builder().bytes(Blob::new(image.to_vec())).build())
            .min_confidence(min_confidence)
            .send()
            .await
            .map_err(|e| PipelineError::DetectionUnavailable(DisplayErrorContext(&e).to_string()))?;

        let labels = response
            .labels()
            .iter()
            .filter_map(|label| Some(Label::new(label.name()?, label.confidence()?)))
            .collect();

        Ok(labels)
    }
}

/// Label detection with a guaranteed confidence floor
#[derive(Clone)]
pub struct LabelDetector {
    service: Arc<dyn LabelService>,
}

impl LabelDetector {
    pub fn new(service: Arc<dyn LabelService>) -> Self {
        Self { service }
    }

    /// Detect labels scoring at least `min_confidence`, in service order
    #[instrument(skip(self, image), fields(size_bytes = image.len()))]
    pub async fn detect(
        &self,
        image: Bytes,
        min_confidence: f32,
    ) -> Result<Vec<Label>, PipelineError> {
        let detected = self.service.detect_labels(image, min_confidence).await?;
        let detected_count = detected.len();

        let retained = retain_confident(detected, min_confidence);

        debug!(
            detected = detected_count,
            retained = retained.len(),
            min_confidence = min_confidence,
            "Labels filtered by confidence"
        );

        Ok(retained)
    }
}

/// Keep labels with `confidence >= min_confidence`, preserving order
pub fn retain_confident(labels: Vec<Label>, min_confidence: f32) -> Vec<Label> {
    labels
        .into_iter()
        .filter(|label| label.confidence >= min_confidence)
        .collect()
}

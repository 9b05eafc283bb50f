use crate::error::PipelineError;
use crate::event::SourceObject;
use crate::label_detector::LabelDetector;
use crate::metadata_writer::MetadataWriter;
use crate::model::{object_locator, ProcessedImage};
use crate::object_store::{thumbnail_key, ObjectStore};
use crate::thumbnail::{Thumbnail, ThumbnailGenerator, THUMBNAIL_CONTENT_TYPE};
use crate::trigger_filter::{TriggerDecision, TriggerFilter};
use aws_lambda_events::s3::S3Event;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Runtime settings validated from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Minimum label confidence (0-100)
    pub confidence_threshold: f32,
    /// Prefix prepended to thumbnail file names
    pub thumbnail_prefix: String,
    /// Key namespace thumbnails are written under
    pub thumbnail_namespace: String,
    /// Scheme used for object locators
    pub locator_scheme: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 90.0,
            thumbnail_prefix: "thumb-".to_string(),
            thumbnail_namespace: "thumbnails/".to_string(),
            locator_scheme: "s3".to_string(),
        }
    }
}

/// Result of a successful invocation
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// The image was processed and its record persisted
    Processed(ProcessedImage),
    /// The event was ignored
    Skipped { key: String, reason: String },
}

/// Event handler sequencing download, detection, thumbnailing and persistence.
///
/// Holds no per-invocation state; concurrent calls to [`ImagePipeline::handle`]
/// each build their own record.
pub struct ImagePipeline {
    store: Arc<dyn ObjectStore>,
    detector: LabelDetector,
    thumbnails: ThumbnailGenerator,
    metadata: Arc<dyn MetadataWriter>,
    trigger_filter: TriggerFilter,
    settings: PipelineSettings,
}

impl ImagePipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        detector: LabelDetector,
        thumbnails: ThumbnailGenerator,
        metadata: Arc<dyn MetadataWriter>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            detector,
            thumbnails,
            metadata,
            trigger_filter: TriggerFilter::new(settings.thumbnail_namespace.clone()),
            settings,
        }
    }

    /// Handle one storage trigger event.
    ///
    /// Failures are logged here, once, and returned unchanged.
    pub async fn handle(&self, event: &S3Event) -> Result<PipelineOutcome, PipelineError> {
        let source = SourceObject::from_event(event).map_err(|e| {
            error!(error = %e, kind = e.kind(), "Rejected trigger event");
            e
        })?;

        info!(bucket = %source.bucket, key = %source.key, "Received object created event");

        if let TriggerDecision::Skip { reason } = self.trigger_filter.evaluate(&source.key) {
            info!(key = %source.key, reason = %reason, "Skipping object");
            return Ok(PipelineOutcome::Skipped {
                key: source.key,
                reason,
            });
        }

        let mut image = ProcessedImage::new(
            &source.bucket,
            &source.key,
            &self.settings.locator_scheme,
        );

        match self.process(&mut image).await {
            Ok(()) => Ok(PipelineOutcome::Processed(image)),
            Err(e) => {
                error!(
                    id = %image.id,
                    bucket = %image.source_bucket,
                    key = %image.source_key,
                    upload_timestamp = %image.upload_timestamp,
                    kind = e.kind(),
                    error = %e,
                    detail = ?e,
                    "Image processing failed"
                );
                Err(e)
            }
        }
    }

    #[instrument(skip(self, image), fields(id = %image.id, key = %image.source_key))]
    async fn process(&self, image: &mut ProcessedImage) -> Result<(), PipelineError> {
        let source = self
            .store
            .download(&image.source_bucket, &image.source_key)
            .await?;

        info!(size_bytes = source.len(), "Downloaded source image");

        image.labels = self
            .detector
            .detect(source.clone(), self.settings.confidence_threshold)
            .await?;

        info!(label_count = image.labels.len(), "Detected labels");

        let thumbnail = self.render_thumbnail(source).await?;

        let thumb_key = thumbnail_key(
            &self.settings.thumbnail_namespace,
            &self.settings.thumbnail_prefix,
            &image.source_key,
        );
        self.store
            .upload(
                &image.source_bucket,
                &thumb_key,
                Bytes::from(thumbnail.data),
                THUMBNAIL_CONTENT_TYPE,
            )
            .await?;

        image.thumbnail_url =
            object_locator(&self.settings.locator_scheme, &image.source_bucket, &thumb_key);

        info!(
            thumbnail_url = %image.thumbnail_url,
            width = thumbnail.width,
            height = thumbnail.height,
            "Thumbnail saved"
        );

        self.metadata.upsert(image).await?;

        info!("Metadata record persisted");

        Ok(())
    }

    /// Encode the thumbnail on the blocking pool
    async fn render_thumbnail(&self, source: Bytes) -> Result<Thumbnail, PipelineError> {
        let generator = self.thumbnails.clone();

        tokio::task::spawn_blocking(move || generator.generate(&source))
            .await
            .map_err(|e| PipelineError::EncodeError(format!("thumbnail worker failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::tests::s3_event;
    use crate::label_detector::MockLabelService;
    use crate::metadata_writer::MockMetadataWriter;
    use crate::model::Label;
    use crate::object_store::MockObjectStore;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    fn png_bytes(width: u32, height: u32) -> Bytes {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        Bytes::from(buf)
    }

    fn build_pipeline(
        store: MockObjectStore,
        labels: MockLabelService,
        metadata: MockMetadataWriter,
    ) -> ImagePipeline {
        ImagePipeline::new(
            Arc::new(store),
            LabelDetector::new(Arc::new(labels)),
            ThumbnailGenerator::new(150, 75),
            Arc::new(metadata),
            PipelineSettings::default(),
        )
    }

    fn recording_writer(records: Arc<Mutex<Vec<ProcessedImage>>>) -> MockMetadataWriter {
        let mut metadata = MockMetadataWriter::new();
        metadata.expect_upsert().returning(move |record| {
            records.lock().unwrap().push(record.clone());
            Ok(())
        });
        metadata
    }

    #[tokio::test]
    async fn test_processes_image_end_to_end() {
        let mut store = MockObjectStore::new();
        store
            .expect_download()
            .times(1)
            .returning(|bucket, key| {
                assert_eq!((bucket, key), ("photos", "cat.jpg"));
                Ok(png_bytes(300, 200))
            });
        store
            .expect_upload()
            .times(1)
            .returning(|bucket, key, body, content_type| {
                assert_eq!((bucket, key), ("photos", "thumbnails/thumb-cat.jpg"));
                assert_eq!(content_type, "image/jpeg");
                let thumb = image::load_from_memory(&body).unwrap();
                assert_eq!((thumb.width(), thumb.height()), (150, 100));
                Ok(())
            });

        let mut labels = MockLabelService::new();
        labels
            .expect_detect_labels()
            .times(1)
            .returning(|_, _| Ok(vec![Label::new("Cat", 97.5), Label::new("Animal", 60.0)]));

        let records = Arc::new(Mutex::new(Vec::new()));
        let pipeline = build_pipeline(store, labels, recording_writer(records.clone()));

        let outcome = pipeline
            .handle(&s3_event(&[("photos", "cat.jpg")]))
            .await
            .unwrap();

        let processed = match outcome {
            PipelineOutcome::Processed(image) => image,
            other => panic!("expected processed outcome, got {other:?}"),
        };

        let persisted = records.lock().unwrap().clone();
        assert_eq!(persisted, vec![processed.clone()]);

        let record = &persisted[0];
        assert_eq!(record.source_url, "s3://photos/cat.jpg");
        assert_eq!(record.thumbnail_url, "s3://photos/thumbnails/thumb-cat.jpg");
        assert_eq!(record.labels, vec![Label::new("Cat", 97.5)]);
        assert!(!record.id.is_empty());
    }

    #[tokio::test]
    async fn test_thumbnail_event_has_no_side_effects() {
        let mut store = MockObjectStore::new();
        store.expect_download().never();
        store.expect_upload().never();
        let mut labels = MockLabelService::new();
        labels.expect_detect_labels().never();
        let mut metadata = MockMetadataWriter::new();
        metadata.expect_upsert().never();

        let pipeline = build_pipeline(store, labels, metadata);
        let outcome = pipeline
            .handle(&s3_event(&[("photos", "thumbnails/thumb-cat.jpg")]))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            PipelineOutcome::Skipped { ref key, .. } if key == "thumbnails/thumb-cat.jpg"
        ));
    }

    #[tokio::test]
    async fn test_missing_object_aborts_before_detection() {
        let mut store = MockObjectStore::new();
        store.expect_download().times(1).returning(|bucket, key| {
            Err(PipelineError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        });
        store.expect_upload().never();
        let mut labels = MockLabelService::new();
        labels.expect_detect_labels().never();
        let mut metadata = MockMetadataWriter::new();
        metadata.expect_upsert().never();

        let pipeline = build_pipeline(store, labels, metadata);
        let result = pipeline.handle(&s3_event(&[("photos", "cat.jpg")])).await;

        assert!(matches!(result, Err(PipelineError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_detection_failure_propagates() {
        let mut store = MockObjectStore::new();
        store
            .expect_download()
            .returning(|_, _| Ok(png_bytes(64, 64)));
        store.expect_upload().never();
        let mut labels = MockLabelService::new();
        labels
            .expect_detect_labels()
            .returning(|_, _| Err(PipelineError::DetectionUnavailable("throttled".to_string())));
        let mut metadata = MockMetadataWriter::new();
        metadata.expect_upsert().never();

        let pipeline = build_pipeline(store, labels, metadata);
        let result = pipeline.handle(&s3_event(&[("photos", "cat.jpg")])).await;

        assert!(matches!(result, Err(PipelineError::DetectionUnavailable(_))));
    }

    #[tokio::test]
    async fn test_undecodable_image_is_not_persisted() {
        let mut store = MockObjectStore::new();
        store
            .expect_download()
            .returning(|_, _| Ok(Bytes::from_static(b"plain text, not pixels")));
        store.expect_upload().never();
        let mut labels = MockLabelService::new();
        labels.expect_detect_labels().returning(|_, _| Ok(vec![]));
        let mut metadata = MockMetadataWriter::new();
        metadata.expect_upsert().never();

        let pipeline = build_pipeline(store, labels, metadata);
        let result = pipeline.handle(&s3_event(&[("photos", "notes.txt")])).await;

        assert!(matches!(result, Err(PipelineError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn test_persistence_failure_after_thumbnail_upload() {
        let mut store = MockObjectStore::new();
        store
            .expect_download()
            .returning(|_, _| Ok(png_bytes(64, 64)));
        // the thumbnail is left behind when the metadata write fails
        store.expect_upload().times(1).returning(|_, _, _, _| Ok(()));
        let mut labels = MockLabelService::new();
        labels.expect_detect_labels().returning(|_, _| Ok(vec![]));
        let mut metadata = MockMetadataWriter::new();
        metadata.expect_upsert().times(1).returning(|record| {
            Err(PipelineError::PersistenceError {
                id: record.id.clone(),
                message: "table missing".to_string(),
            })
        });

        let pipeline = build_pipeline(store, labels, metadata);
        let result = pipeline.handle(&s3_event(&[("photos", "cat.jpg")])).await;

        assert!(matches!(result, Err(PipelineError::PersistenceError { .. })));
    }

    #[tokio::test]
    async fn test_invalid_event_rejected() {
        let mut store = MockObjectStore::new();
        store.expect_download().never();
        let pipeline = build_pipeline(store, MockLabelService::new(), MockMetadataWriter::new());

        let result = pipeline.handle(&s3_event(&[])).await;
        assert!(matches!(result, Err(PipelineError::InvalidEvent(_))));
    }

    #[tokio::test]
    async fn test_concurrent_invocations_are_isolated() {
        let mut store = MockObjectStore::new();
        store.expect_download().times(2).returning(|_, key| {
            // differently sized sources per key
            if key == "cat.jpg" {
                Ok(png_bytes(300, 200))
            } else {
                Ok(png_bytes(200, 300))
            }
        });
        store.expect_upload().times(2).returning(|_, _, _, _| Ok(()));

        let mut labels = MockLabelService::new();
        labels.expect_detect_labels().times(2).returning(|image, _| {
            let source = image::load_from_memory(&image).unwrap();
            if source.width() > source.height() {
                Ok(vec![Label::new("Cat", 99.0)])
            } else {
                Ok(vec![Label::new("Dog", 98.0)])
            }
        });

        let records = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Arc::new(build_pipeline(
            store,
            labels,
            recording_writer(records.clone()),
        ));

        let cat_event = s3_event(&[("photos", "cat.jpg")]);
        let dog_event = s3_event(&[("photos", "dog.jpg")]);
        let (cat, dog) = tokio::join!(pipeline.handle(&cat_event), pipeline.handle(&dog_event));
        assert!(cat.is_ok());
        assert!(dog.is_ok());

        let persisted = records.lock().unwrap().clone();
        assert_eq!(persisted.len(), 2);
        assert_ne!(persisted[0].id, persisted[1].id);

        for record in &persisted {
            match record.source_key.as_str() {
                "cat.jpg" => {
                    assert_eq!(record.labels, vec![Label::new("Cat", 99.0)]);
                    assert_eq!(record.thumbnail_url, "s3://photos/thumbnails/thumb-cat.jpg");
                }
                "dog.jpg" => {
                    assert_eq!(record.labels, vec![Label::new("Dog", 98.0)]);
                    assert_eq!(record.thumbnail_url, "s3://photos/thumbnails/thumb-dog.jpg");
                }
                other => panic!("unexpected record for {other}"),
            }
        }
    }
}

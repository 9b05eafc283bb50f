//! Image Processor
//!
//! Event-triggered ingestion for the photo catalog. Every object created in the
//! watched bucket is downloaded, labelled by the detection service, shrunk to a
//! thumbnail that is written back to the bucket, and recorded in the metadata
//! table.
//!
//! ## Features
//!
//! - **Label Detection**: Rekognition labels filtered to a confidence floor
//! - **Thumbnails**: JPEG thumbnails bounded to a 150x150 box, never upscaled
//! - **Metadata Records**: one DynamoDB item per processed image
//! - **Loop Protection**: events for generated thumbnails are ignored
//!
//! ## Architecture
//!
//! ```text
//! S3 Event            S3 Bucket                 Rekognition
//! ┌──────────────┐    ┌──────────────┐          ┌──────────────┐
//! │ ObjectCreated│    │ {key}        │─────────▶│ DetectLabels │
//! └──────────────┘    │ thumbnails/  │          └──────────────┘
//!        │            └──────────────┘                 │
//!        ▼                 ▲     │                     │
//! ┌──────────────┐         │     ▼                     ▼
//! │ Trigger      │    ┌──────────────┐          ┌──────────────┐
//! │ Filter       │───▶│ Image        │─────────▶│ Thumbnail    │
//! └──────────────┘    │ Pipeline     │          │ Generator    │
//!                     └──────────────┘          └──────────────┘
//!                            │
//!                            ▼
//!                     ┌──────────────┐
//!                     │ DynamoDB     │
//!                     │ Metadata     │
//!                     └──────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod label_detector;
pub mod metadata_writer;
pub mod model;
pub mod object_store;
pub mod pipeline;
pub mod thumbnail;
pub mod trigger_filter;

pub use config::{Config, ConfigError};
pub use error::PipelineError;
pub use event::SourceObject;
pub use label_detector::{LabelDetector, LabelService, RekognitionLabelService};
pub use metadata_writer::{DynamoMetadataWriter, MetadataWriter};
pub use model::{Label, ProcessedImage};
pub use object_store::{ObjectStore, S3ObjectStore};
pub use pipeline::{ImagePipeline, PipelineOutcome, PipelineSettings};
pub use thumbnail::{Thumbnail, ThumbnailGenerator};
pub use trigger_filter::{TriggerDecision, TriggerFilter};

use anyhow::Context;
use aws_config::BehaviorVersion;
use aws_lambda_events::s3::S3Event;
use image_processor::config::AwsConfig;
use image_processor::{
    Config, DynamoMetadataWriter, ImagePipeline, LabelDetector, RekognitionLabelService,
    S3ObjectStore, ThumbnailGenerator,
};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        table = %config.pipeline.table_name,
        "Starting image processor"
    );

    let settings = config
        .pipeline_settings()
        .context("Invalid pipeline configuration")?;

    // Initialize components
    let sdk_config = load_sdk_config(&config.aws).await;

    let store = Arc::new(S3ObjectStore::new(&sdk_config, &config.aws));
    let detector = LabelDetector::new(Arc::new(RekognitionLabelService::new(&sdk_config)));
    let thumbnails =
        ThumbnailGenerator::new(config.thumbnail.max_dimension, config.thumbnail.jpeg_quality);
    let metadata = Arc::new(DynamoMetadataWriter::new(
        &sdk_config,
        config.pipeline.table_name.clone(),
    ));

    let pipeline = Arc::new(ImagePipeline::new(
        store, detector, thumbnails, metadata, settings,
    ));

    run(service_fn(move |event: LambdaEvent<S3Event>| {
        let pipeline = pipeline.clone();
        async move { function_handler(&pipeline, event).await }
    }))
    .await
}

/// Handle one Lambda invocation
async fn function_handler(
    pipeline: &ImagePipeline,
    event: LambdaEvent<S3Event>,
) -> Result<(), Error> {
    let span = info_span!("invocation", request_id = %event.context.request_id);

    pipeline.handle(&event.payload).instrument(span).await?;

    Ok(())
}

/// Load shared AWS configuration, honouring an explicit region
async fn load_sdk_config(config: &AwsConfig) -> aws_types::SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(ref region) = config.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }

    loader.load().await
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

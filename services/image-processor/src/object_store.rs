use crate::config::AwsConfig;
use crate::error::PipelineError;
use async_trait::async_trait;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use aws_types::SdkConfig;
use bytes::Bytes;
use tracing::{debug, info, instrument};

/// Object storage used by the pipeline
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full object body
    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes, PipelineError>;

    /// Store `body` at `key`, replacing any existing object. The caller
    /// derives the object's locator with [`crate::model::object_locator`].
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), PipelineError>;
}

/// S3-backed object store
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    /// Create a new S3 object store
    pub fn new(sdk_config: &SdkConfig, config: &AwsConfig) -> Self {
        let mut s3_config_builder = S3ConfigBuilder::from(sdk_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.s3_endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            endpoint = config.s3_endpoint_url.as_deref().unwrap_or("default"),
            "S3 object store initialized"
        );

        Self::from_client(client)
    }

    /// Wrap an already configured client
    pub fn from_client(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self))]
    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes, PipelineError> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                {
                    PipelineError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    transient(bucket, key, DisplayErrorContext(&e))
                }
            })?;

        // Drain the stream fully before handing the bytes on
        let body = response
            .body
            .collect()
            .await
            .map_err(|e| transient(bucket, key, DisplayErrorContext(&e)))?
            .into_bytes();

        debug!(size_bytes = body.len(), "Object downloaded");

        Ok(body)
    }

    #[instrument(skip(self, body), fields(size_bytes = body.len()))]
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), PipelineError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| transient(bucket, key, DisplayErrorContext(&e)))?;

        debug!("Object uploaded");

        Ok(())
    }
}

fn transient(bucket: &str, key: &str, error: impl std::fmt::Display) -> PipelineError {
    PipelineError::TransientIo {
        bucket: bucket.to_string(),
        key: key.to_string(),
        message: error.to_string(),
    }
}

/// Key of the thumbnail derived from `source_key`.
///
/// Format: {namespace}{prefix}{file name}; directory components of the source
/// key are dropped.
pub fn thumbnail_key(namespace: &str, prefix: &str, source_key: &str) -> String {
    let file_name = source_key.rsplit('/').next().unwrap_or(source_key);
    format!("{namespace}{prefix}{file_name}")
}

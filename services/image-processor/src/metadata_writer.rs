use crate::error::PipelineError;
use crate::model::{Label, ProcessedImage};
use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_types::SdkConfig;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Persists processed image records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataWriter: Send + Sync {
    /// Insert or replace the record keyed by its `id`
    async fn upsert(&self, record: &ProcessedImage) -> Result<(), PipelineError>;
}

/// DynamoDB-backed metadata writer
pub struct DynamoMetadataWriter {
    client: DynamoClient,
    table: String,
}

impl DynamoMetadataWriter {
    pub fn new(sdk_config: &SdkConfig, table: impl Into<String>) -> Self {
        Self::from_client(DynamoClient::new(sdk_config), table)
    }

    /// Wrap an already configured client
    pub fn from_client(client: DynamoClient, table: impl Into<String>) -> Self {
        let table = table.into();
        info!(table = %table, "DynamoDB metadata writer initialized");

        Self { client, table }
    }
}

#[async_trait]
impl MetadataWriter for DynamoMetadataWriter {
    #[instrument(skip(self, record), fields(id = %record.id, table = %self.table))]
    async fn upsert(&self, record: &ProcessedImage) -> Result<(), PipelineError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(record_to_item(record)))
            .send()
            .await
            .map_err(|e| PipelineError::PersistenceError {
                id: record.id.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        debug!(label_count = record.labels.len(), "Metadata record written");

        Ok(())
    }
}

/// Map a record onto DynamoDB attributes
pub fn record_to_item(record: &ProcessedImage) -> HashMap<String, AttributeValue> {
    HashMap::from([
        ("id".to_string(), AttributeValue::S(record.id.clone())),
        ("sourceUrl".to_string(), AttributeValue::S(record.source_url.clone())),
        (
            "sourceBucket".to_string(),
            AttributeValue::S(record.source_bucket.clone()),
        ),
        ("sourceKey".to_string(), AttributeValue::S(record.source_key.clone())),
        (
            "thumbnailUrl".to_string(),
            AttributeValue::S(record.thumbnail_url.clone()),
        ),
        (
            "uploadTimestamp".to_string(),
            AttributeValue::S(record.upload_timestamp.clone()),
        ),
        (
            "labels".to_string(),
            AttributeValue::L(record.labels.iter().map(label_to_attribute).collect()),
        ),
    ])
}

fn label_to_attribute(label: &Label) -> AttributeValue {
    AttributeValue::M(HashMap::from([
        ("name".to_string(), AttributeValue::S(label.name.clone())),
        (
            "confidence".to_string(),
            AttributeValue::N(label.confidence.to_string()),
        ),
    ]))
}

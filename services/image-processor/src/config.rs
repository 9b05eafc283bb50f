use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::pipeline::PipelineSettings;

/// Errors raised while validating configuration values
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),
}

/// Main configuration for the image processor
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// AWS client configuration
    #[serde(default)]
    pub aws: AwsConfig,
    /// Pipeline behaviour
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Thumbnail codec settings
    #[serde(default)]
    pub thumbnail: ThumbnailConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// AWS client configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AwsConfig {
    /// AWS region; the SDK provider chain is used when unset
    pub region: Option<String>,
    /// Custom S3 endpoint URL (for MinIO, LocalStack, etc.)
    pub s3_endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Metadata table name
    #[serde(default = "default_table_name")]
    pub table_name: String,
    /// Minimum label confidence (0-100), string encoded
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: String,
    /// Prefix prepended to the thumbnail file name
    #[serde(default = "default_thumbnail_prefix")]
    pub thumbnail_prefix: String,
    /// Key namespace thumbnails are written under
    #[serde(default = "default_thumbnail_namespace")]
    pub thumbnail_namespace: String,
    /// Scheme used when building object locators
    #[serde(default = "default_locator_scheme")]
    pub locator_scheme: String,
}

/// Thumbnail codec configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailConfig {
    /// Bounding box side in pixels
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    /// JPEG quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

// Default value functions
fn default_service_name() -> String {
    "image-processor".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_table_name() -> String {
    "ImageMetadataTable".to_string()
}

fn default_confidence_threshold() -> String {
    "90".to_string()
}

fn default_thumbnail_prefix() -> String {
    "thumb-".to_string()
}

fn default_thumbnail_namespace() -> String {
    "thumbnails/".to_string()
}

fn default_locator_scheme() -> String {
    "s3".to_string()
}

fn default_max_dimension() -> u32 {
    150
}

fn default_jpeg_quality() -> u8 {
    75
}

impl Config {
    /// Load configuration from defaults, config files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(std::env::vars().collect())
    }

    /// Load configuration using `vars` in place of the process environment
    pub fn load_from(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let flat = |name: &str| vars.get(name).cloned();

        let config = config::Config::builder()
            // Add config file if present
            .add_source(config::File::with_name("config/image-processor").required(false))
            .add_source(config::File::with_name("/etc/image-processor/config").required(false))
            // Override with environment variables
            // IMAGE_PROCESSOR__PIPELINE__TABLE_NAME -> pipeline.table_name
            // Values stay strings; typed fields are converted on deserialize
            .add_source(
                config::Environment::with_prefix("IMAGE_PROCESSOR")
                    .separator("__")
                    .source(Some(vars.clone())),
            )
            // Flat variables set on the function by the deployment template
            .set_override_option("pipeline.table_name", flat("IMAGE_TABLE"))?
            .set_override_option("pipeline.confidence_threshold", flat("CONF_THRESHOLD"))?
            .set_override_option("pipeline.thumbnail_prefix", flat("THUMB_PREFIX"))?
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Validate the pipeline section and convert it into runtime settings
    pub fn pipeline_settings(&self) -> Result<PipelineSettings, ConfigError> {
        let confidence_threshold = parse_threshold(&self.pipeline.confidence_threshold)?;

        let namespace = &self.pipeline.thumbnail_namespace;
        if namespace.is_empty() || !namespace.ends_with('/') {
            return Err(invalid(
                "pipeline.thumbnail_namespace",
                format!("must be a non-empty prefix ending in '/', got {namespace:?}"),
            ));
        }

        if self.pipeline.locator_scheme.is_empty() {
            return Err(invalid("pipeline.locator_scheme", "must not be empty"));
        }

        if self.thumbnail.max_dimension == 0 {
            return Err(invalid("thumbnail.max_dimension", "must be greater than 0"));
        }

        if !(1..=100).contains(&self.thumbnail.jpeg_quality) {
            return Err(invalid(
                "thumbnail.jpeg_quality",
                format!("must be within 1..=100, got {}", self.thumbnail.jpeg_quality),
            ));
        }

        Ok(PipelineSettings {
            confidence_threshold,
            thumbnail_prefix: self.pipeline.thumbnail_prefix.clone(),
            thumbnail_namespace: namespace.clone(),
            locator_scheme: self.pipeline.locator_scheme.clone(),
        })
    }
}

fn parse_threshold(raw: &str) -> Result<f32, ConfigError> {
    let value: f32 = raw.trim().parse().map_err(|e| {
        invalid(
            "pipeline.confidence_threshold",
            format!("{raw:?} is not a number: {e}"),
        )
    })?;

    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(invalid(
            "pipeline.confidence_threshold",
            format!("must be within 0..=100, got {value}"),
        ));
    }

    Ok(value)
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            confidence_threshold: default_confidence_threshold(),
            thumbnail_prefix: default_thumbnail_prefix(),
            thumbnail_namespace: default_thumbnail_namespace(),
            locator_scheme: default_locator_scheme(),
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

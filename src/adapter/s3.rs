//! S3-compatible store builders
//!
//! Maps the `s3`, `b2` and `minio` configuration variants onto
//! object_store's AmazonS3Builder. Backblaze B2 and Minio both speak the
//! S3 API; they differ from plain S3 only in how the endpoint is derived.

use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;
use std::sync::Arc;

use crate::config::{B2Config, MinioConfig, S3Config};
use crate::errors::{Result, StorageError};

const DEFAULT_REGION: &str = "us-east-1";

pub(crate) fn build_s3(config: &S3Config, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_access_key_id(&config.access_key_id)
        .with_secret_access_key(&config.secret_access_key)
        .with_region(config.region.as_deref().unwrap_or(DEFAULT_REGION));

    if let Some(endpoint) = &config.endpoint {
        builder = builder.with_endpoint(endpoint);
    }

    let store = builder
        .build()
        .map_err(|e| StorageError::InvalidConfig(e.to_string()))?;
    Ok(Arc::new(store))
}

pub(crate) fn build_b2(config: &B2Config, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
    let store = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_access_key_id(&config.application_key_id)
        .with_secret_access_key(&config.application_key)
        .with_endpoint(&config.endpoint)
        // B2's S3 gateway resolves the region from the endpoint host
        .with_region("auto")
        .build()
        .map_err(|e| StorageError::InvalidConfig(e.to_string()))?;
    Ok(Arc::new(store))
}

pub(crate) fn build_minio(config: &MinioConfig, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
    let scheme = if config.use_ssl { "https" } else { "http" };
    let store = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_access_key_id(&config.access_key_id)
        .with_secret_access_key(&config.secret_access_key)
        .with_region(config.region.as_deref().unwrap_or(DEFAULT_REGION))
        .with_endpoint(format!("{scheme}://{}", config.endpoint))
        .with_allow_http(!config.use_ssl)
        .build()
        .map_err(|e| StorageError::InvalidConfig(e.to_string()))?;
    Ok(Arc::new(store))
}

//! Google Cloud Storage store builder
//!
//! Uses object_store::gcp::GoogleCloudStorageBuilder. When no service
//! account key file is configured, authentication falls back to the
//! Application Default Credentials chain (workload identity, the
//! GOOGLE_APPLICATION_CREDENTIALS environment variable, GCE metadata).

use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::ObjectStore;
use std::sync::Arc;

use crate::config::GcsConfig;
use crate::errors::{Result, StorageError};

pub(crate) fn build_gcs(config: &GcsConfig, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
    let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(bucket);

    if let Some(key_file) = &config.key_file {
        builder = builder.with_service_account_path(key_file);
    }

    let store = builder
        .build()
        .map_err(|e| StorageError::InvalidConfig(e.to_string()))?;
    Ok(Arc::new(store))
}

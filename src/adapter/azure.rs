//! Azure Blob Storage store builder
//!
//! Uses object_store::azure::MicrosoftAzureBuilder. When no account key is
//! configured, the builder's default Azure credential chain applies
//! (managed identity, environment variables, workload identity).

use object_store::azure::MicrosoftAzureBuilder;
use object_store::ObjectStore;
use std::sync::Arc;

use crate::config::AzureConfig;
use crate::errors::{Result, StorageError};

pub(crate) fn build_azure(config: &AzureConfig, container: &str) -> Result<Arc<dyn ObjectStore>> {
    let mut builder = MicrosoftAzureBuilder::new()
        .with_account(&config.account_name)
        .with_container_name(container);

    if let Some(key) = &config.account_key {
        builder = builder.with_access_key(key);
    }

    let store = builder
        .build()
        .map_err(|e| StorageError::InvalidConfig(e.to_string()))?;
    Ok(Arc::new(store))
}

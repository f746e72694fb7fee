//! Cloud storage adapter
//!
//! One adapter covers every vendor-backed configuration variant (s3, gcs,
//! azure, b2, minio) by delegating all object I/O to an
//! `Arc<dyn ObjectStore>` built by the per-vendor modules. It is a thin
//! call-through: the contract's error shape and idempotence policy are
//! applied here, the protocol work happens inside object_store.
//!
//! Bucket lifecycle is the one place the call-through is lossy:
//! object_store binds a store handle to a single pre-provisioned
//! container and exposes no create/delete-container API. `create_bucket`
//! therefore verifies reachability, `delete_bucket` clears contents and
//! retains the container, and `list_buckets` reports the configured one.

use async_trait::async_trait;
use futures::stream::StreamExt;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::adapter::{
    azure, gcs, s3, ByteStream, FileEntry, FileSource, RangeOptions, StorageAdapter, StoreOptions,
};
use crate::config::StorageConfig;
use crate::errors::{Result, StorageError};

/// Vendor-backed storage adapter over object_store
pub struct CloudAdapter {
    config: StorageConfig,
    store: Option<Arc<dyn ObjectStore>>,
    selected_bucket: Option<String>,
    initialized: bool,
    config_error: Option<StorageError>,
}

impl CloudAdapter {
    /// Create a new cloud adapter from a resolved configuration
    pub fn new(config: StorageConfig) -> Self {
        let config_error = config.validate().err();
        let selected_bucket = config.bucket_name().map(str::to_string);
        Self {
            config,
            store: None,
            selected_bucket,
            initialized: false,
            config_error,
        }
    }

    fn guard(&self) -> Result<()> {
        match &self.config_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Build a native store handle bound to `bucket`
    fn build_store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        match &self.config {
            StorageConfig::S3(c) => s3::build_s3(c, bucket),
            StorageConfig::B2(c) => s3::build_b2(c, bucket),
            StorageConfig::Minio(c) => s3::build_minio(c, bucket),
            StorageConfig::Gcs(c) => gcs::build_gcs(c, bucket),
            StorageConfig::Azure(c) => azure::build_azure(c, bucket),
            StorageConfig::Local(_) => Err(StorageError::InvalidConfig(
                "local configuration cannot back a cloud adapter".to_string(),
            )),
        }
    }

    /// Store handle for an explicitly named bucket; reuses the selected
    /// handle when the names match
    fn store_for(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        if self.selected_bucket.as_deref() == Some(bucket) {
            if let Some(store) = &self.store {
                return Ok(Arc::clone(store));
            }
        }
        self.build_store(bucket)
    }

    fn selected_store(&self) -> Result<Arc<dyn ObjectStore>> {
        match &self.store {
            Some(store) => Ok(Arc::clone(store)),
            None => Err(StorageError::NotFound("no bucket is selected".to_string())),
        }
    }

    fn object_path(name: &str) -> Result<ObjectPath> {
        ObjectPath::parse(name).map_err(|_| StorageError::PathEscape(name.to_string()))
    }

    async fn probe(&self, bucket: &str) -> Result<()> {
        let store = self.store_for(bucket)?;
        let mut listing = store.list(None);
        match listing.next().await {
            None | Some(Ok(_)) => Ok(()),
            Some(Err(e)) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StorageAdapter for CloudAdapter {
    fn adapter_type(&self) -> &'static str {
        self.config.type_tag()
    }

    fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn selected_bucket(&self) -> Option<&str> {
        self.selected_bucket.as_deref()
    }

    async fn init(&mut self) -> Result<bool> {
        self.guard()?;
        if let Some(bucket) = self.selected_bucket.clone() {
            self.store = Some(self.build_store(&bucket)?);
        }
        self.initialized = true;
        debug!(backend = self.adapter_type(), "cloud adapter initialized");
        Ok(true)
    }

    async fn create_bucket(&mut self, name: Option<&str>) -> Result<bool> {
        self.guard()?;
        if let Some(name) = name {
            self.select_bucket(Some(name)).await?;
        }
        let bucket = self
            .selected_bucket
            .clone()
            .ok_or_else(|| StorageError::NotFound("no bucket is selected".to_string()))?;
        // Containers are pre-provisioned on the vendor side; verify the
        // configured one is reachable and report success.
        self.probe(&bucket).await?;
        Ok(true)
    }

    async fn clear_bucket(&mut self, name: Option<&str>) -> Result<bool> {
        self.guard()?;
        let bucket = match name {
            Some(n) => n.to_string(),
            None => self
                .selected_bucket
                .clone()
                .ok_or_else(|| StorageError::NotFound("no bucket is selected".to_string()))?,
        };
        let store = self.store_for(&bucket)?;
        let mut listing = store.list(None);
        while let Some(meta) = listing.next().await {
            let meta = meta?;
            match store.delete(&meta.location).await {
                Ok(()) => {}
                Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    async fn delete_bucket(&mut self, name: Option<&str>) -> Result<bool> {
        // The container itself is retained; only its contents go.
        self.clear_bucket(name).await
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        self.guard()?;
        Ok(self.selected_bucket.iter().cloned().collect())
    }

    async fn select_bucket(&mut self, name: Option<&str>) -> Result<bool> {
        self.guard()?;
        match name {
            Some(name) => {
                // The native handle binds one container; rebuild it
                self.store = Some(self.build_store(name)?);
                self.selected_bucket = Some(name.to_string());
            }
            None => {
                self.store = None;
                self.selected_bucket = None;
            }
        }
        Ok(true)
    }

    async fn store(
        &mut self,
        source: FileSource,
        target: &str,
        options: &StoreOptions,
    ) -> Result<String> {
        self.guard()?;
        let store = self.selected_store()?;
        let path = Self::object_path(target)?;

        debug!(backend = self.adapter_type(), target = %path, source = ?source, "storing object");
        let remove_after = match &source {
            FileSource::Path(p) if options.remove_source => Some(p.clone()),
            _ => None,
        };
        let payload = match source {
            FileSource::Path(p) => bytes::Bytes::from(tokio::fs::read(&p).await?),
            FileSource::Buffer(buffer) => buffer,
            FileSource::Stream(mut stream) => {
                let mut buffer = Vec::new();
                stream.read_to_end(&mut buffer).await?;
                bytes::Bytes::from(buffer)
            }
        };
        store.put(&path, payload.into()).await?;
        if let Some(p) = remove_after {
            match tokio::fs::remove_file(&p).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(path.to_string())
    }

    async fn get_file_as_stream(
        &self,
        bucket: &str,
        file: &str,
        range: &RangeOptions,
    ) -> Result<ByteStream> {
        self.guard()?;
        let store = self.store_for(bucket)?;
        let path = Self::object_path(file)?;

        let bytes = if range.start.is_some() || range.end.is_some() {
            let meta = store.head(&path).await?;
            let len = meta.size;
            let start = range.start.unwrap_or(0) as usize;
            let end = match range.end {
                // Inclusive end offset
                Some(end) => ((end as usize).saturating_add(1)).min(len),
                None => len,
            };
            if start >= end {
                bytes::Bytes::new()
            } else {
                store.get_range(&path, start..end).await?
            }
        } else {
            store.get(&path).await?.bytes().await?
        };
        Ok(Box::new(Cursor::new(bytes)))
    }

    async fn get_file_as_url(&self, bucket: &str, file: &str) -> Result<String> {
        self.guard()?;
        let url = match &self.config {
            StorageConfig::S3(c) => match &c.endpoint {
                Some(endpoint) => format!("{}/{bucket}/{file}", endpoint.trim_end_matches('/')),
                None => format!(
                    "https://{bucket}.s3.{}.amazonaws.com/{file}",
                    c.region.as_deref().unwrap_or("us-east-1")
                ),
            },
            StorageConfig::B2(c) => {
                format!("{}/{bucket}/{file}", c.endpoint.trim_end_matches('/'))
            }
            StorageConfig::Minio(c) => {
                let scheme = if c.use_ssl { "https" } else { "http" };
                format!("{scheme}://{}/{bucket}/{file}", c.endpoint)
            }
            StorageConfig::Gcs(_) => format!("https://storage.googleapis.com/{bucket}/{file}"),
            StorageConfig::Azure(c) => format!(
                "https://{}.blob.core.windows.net/{bucket}/{file}",
                c.account_name
            ),
            StorageConfig::Local(_) => {
                return Err(StorageError::InvalidConfig(
                    "local configuration cannot back a cloud adapter".to_string(),
                ))
            }
        };
        Ok(url)
    }

    async fn remove_file(&mut self, bucket: &str, file: &str) -> Result<bool> {
        self.guard()?;
        let store = self.store_for(bucket)?;
        let path = Self::object_path(file)?;
        match store.delete(&path).await {
            Ok(()) => Ok(true),
            // Removing an absent object is success, not an error
            Err(object_store::Error::NotFound { .. }) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_files(&self, bucket: &str) -> Result<Vec<FileEntry>> {
        self.guard()?;
        let store = self.store_for(bucket)?;
        let mut files = Vec::new();
        let mut listing = store.list(None);
        while let Some(meta) = listing.next().await {
            let meta = meta?;
            files.push((meta.location.to_string(), meta.size as u64));
        }
        Ok(files)
    }

    async fn size_of(&self, bucket: &str, file: &str) -> Result<u64> {
        self.guard()?;
        let store = self.store_for(bucket)?;
        let path = Self::object_path(file)?;
        let meta = store.head(&path).await?;
        Ok(meta.size as u64)
    }

    async fn file_exists(&self, bucket: &str, file: &str) -> Result<bool> {
        self.guard()?;
        let store = self.store_for(bucket)?;
        let path = Self::object_path(file)?;
        match store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.guard()?;
        match self.probe(bucket).await {
            Ok(()) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

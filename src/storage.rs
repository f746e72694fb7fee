//! Storage facade
//!
//! [`Storage`] holds exactly one active adapter, resolved from a
//! [`StorageConfig`] at construction, and forwards every public operation
//! to it. The facade adds no business logic; it exists so call sites stay
//! identical when the backend is swapped.

use bytes::Bytes;
use std::path::Path;
use tracing::info;

use crate::adapter::{
    ByteStream, CloudAdapter, FileEntry, FileSource, LocalAdapter, RangeOptions, StorageAdapter,
    StoreOptions,
};
use crate::config::StorageConfig;
use crate::errors::Result;

/// Static registry: maps a resolved type tag to its adapter constructor
///
/// Dispatch is a compile-time match; the table of registered tags lives in
/// [`crate::config::REGISTERED_TYPES`] and an unknown tag never reaches
/// this point (the resolver fails with `UnsupportedType` first).
fn create_adapter(config: StorageConfig) -> Box<dyn StorageAdapter> {
    match config {
        StorageConfig::Local(c) => Box::new(LocalAdapter::new(c)),
        cloud => Box::new(CloudAdapter::new(cloud)),
    }
}

/// Backend-agnostic storage handle
pub struct Storage {
    adapter: Box<dyn StorageAdapter>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("adapter", &self.adapter.adapter_type())
            .field("bucket", &self.adapter.selected_bucket())
            .finish()
    }
}

impl Storage {
    /// Create a storage handle from a resolved configuration
    ///
    /// Construction validates the configuration; a structural error is
    /// stored on the adapter and replayed by every operation. Call
    /// [`Storage::init`] before the first backend operation.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            adapter: create_adapter(config),
        }
    }

    /// Create a storage handle from a connection string
    pub fn from_url(url: &str) -> Result<Self> {
        Ok(Self::new(StorageConfig::from_url(url)?))
    }

    /// Replace the active adapter with one built from `config`
    ///
    /// This is the sole mutation point for which backend is active. The
    /// replaced adapter is dropped here; operations already dispatched to
    /// it complete against the old instance, so callers needing a clean
    /// cutover must drain in-flight work first.
    pub fn switch_adapter(&mut self, config: StorageConfig) {
        info!(
            from = self.adapter.adapter_type(),
            to = config.type_tag(),
            "switching storage adapter"
        );
        self.adapter = create_adapter(config);
    }

    /// Replace the active adapter with one built from a connection string
    pub fn switch_adapter_url(&mut self, url: &str) -> Result<()> {
        self.switch_adapter(StorageConfig::from_url(url)?);
        Ok(())
    }

    /// The type tag of the active adapter
    pub fn adapter_type(&self) -> &'static str {
        self.adapter.adapter_type()
    }

    /// The configuration of the active adapter
    pub fn config(&self) -> &StorageConfig {
        self.adapter.config()
    }

    /// The currently selected bucket, if any
    pub fn selected_bucket(&self) -> Option<&str> {
        self.adapter.selected_bucket()
    }

    pub async fn init(&mut self) -> Result<bool> {
        self.adapter.init().await
    }

    pub async fn test(&self) -> Result<String> {
        self.adapter.test().await
    }

    pub async fn create_bucket(&mut self, name: Option<&str>) -> Result<bool> {
        self.adapter.create_bucket(name).await
    }

    pub async fn clear_bucket(&mut self, name: Option<&str>) -> Result<bool> {
        self.adapter.clear_bucket(name).await
    }

    pub async fn delete_bucket(&mut self, name: Option<&str>) -> Result<bool> {
        self.adapter.delete_bucket(name).await
    }

    pub async fn list_buckets(&self) -> Result<Vec<String>> {
        self.adapter.list_buckets().await
    }

    pub async fn select_bucket(&mut self, name: Option<&str>) -> Result<bool> {
        self.adapter.select_bucket(name).await
    }

    pub async fn add_file_from_path(
        &mut self,
        path: &Path,
        target: &str,
        options: &StoreOptions,
    ) -> Result<String> {
        self.adapter.add_file_from_path(path, target, options).await
    }

    pub async fn add_file_from_buffer(&mut self, buffer: Bytes, target: &str) -> Result<String> {
        self.adapter.add_file_from_buffer(buffer, target).await
    }

    pub async fn add_file_from_stream(
        &mut self,
        stream: ByteStream,
        target: &str,
    ) -> Result<String> {
        self.adapter.add_file_from_stream(stream, target).await
    }

    pub async fn get_file_as_stream(
        &self,
        bucket: &str,
        file: &str,
        range: &RangeOptions,
    ) -> Result<ByteStream> {
        self.adapter.get_file_as_stream(bucket, file, range).await
    }

    /// Alias for [`Storage::get_file_as_stream`] without a byte range
    pub async fn get_file_as_readable(&self, bucket: &str, file: &str) -> Result<ByteStream> {
        self.adapter
            .get_file_as_stream(bucket, file, &RangeOptions::default())
            .await
    }

    pub async fn get_file_as_url(&self, bucket: &str, file: &str) -> Result<String> {
        self.adapter.get_file_as_url(bucket, file).await
    }

    pub async fn remove_file(&mut self, bucket: &str, file: &str) -> Result<bool> {
        self.adapter.remove_file(bucket, file).await
    }

    pub async fn list_files(&self, bucket: &str) -> Result<Vec<FileEntry>> {
        self.adapter.list_files(bucket).await
    }

    pub async fn size_of(&self, bucket: &str, file: &str) -> Result<u64> {
        self.adapter.size_of(bucket, file).await
    }

    pub async fn file_exists(&self, bucket: &str, file: &str) -> Result<bool> {
        self.adapter.file_exists(bucket, file).await
    }

    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.adapter.bucket_exists(bucket).await
    }

    /// Store from an explicit source; the generic entry point the
    /// `add_file_from_*` methods funnel into
    pub async fn store(
        &mut self,
        source: FileSource,
        target: &str,
        options: &StoreOptions,
    ) -> Result<String> {
        self.adapter.store(source, target, options).await
    }
}

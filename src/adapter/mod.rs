//! Storage adapter abstraction layer
//!
//! Provides a unified interface for interacting with different storage
//! backends (local filesystem, AWS S3, Google Cloud Storage, Azure Blob
//! Storage, Backblaze B2, Minio). All operations flow through the
//! [`StorageAdapter`] trait; cloud backends delegate to the object_store
//! crate while the local backend emulates bucket semantics on a directory
//! tree.
//!
//! Behavior shared by every backend (the connectivity self-test and the
//! three `add_file_from_*` entry points that funnel into `store`) lives in
//! trait default methods rather than a base type.

mod azure;
mod cloud;
mod gcs;
mod local;
mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;

use crate::config::StorageConfig;
use crate::errors::{Result, StorageError};

pub use cloud::CloudAdapter;
pub use local::LocalAdapter;

/// A readable byte stream handed to or returned from an adapter
///
/// Streams returned by `get_file_as_stream` are caller-owned: the adapter
/// does not track or close them, so the caller must consume or drop them
/// on every exit path.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// The source of a `store` operation
pub enum FileSource {
    /// Copy from a file on the local filesystem
    Path(PathBuf),
    /// Write an in-memory buffer
    Buffer(Bytes),
    /// Drain a readable stream
    Stream(ByteStream),
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSource::Path(p) => f.debug_tuple("Path").field(p).finish(),
            FileSource::Buffer(b) => f.debug_tuple("Buffer").field(&b.len()).finish(),
            FileSource::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Options for `store`
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Delete the source after a fully successful copy; only meaningful
    /// for `FileSource::Path`. A failed copy leaves the source intact.
    pub remove_source: bool,
}

/// Optional inclusive byte range for partial reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeOptions {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

/// A listed file: path relative to its bucket root, plus byte size
pub type FileEntry = (String, u64);

/// Uniform capability set implemented by every storage backend
///
/// Mutating operations take `&mut self`: adapter state (selected bucket,
/// bucket-created flag) is owned, single-writer state with no internal
/// lock; callers serialize dependent operations themselves.
///
/// Every method reports failure through [`StorageError`]; none panic.
/// A construction-time configuration error is sticky: each subsequent
/// operation returns that same error without attempting the backend call.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// The registered type tag of this backend
    fn adapter_type(&self) -> &'static str;

    /// The resolved configuration this adapter was constructed from
    fn config(&self) -> &StorageConfig;

    /// Whether `init()` has completed successfully
    fn is_initialized(&self) -> bool;

    /// The currently selected bucket, if any
    fn selected_bucket(&self) -> Option<&str>;

    /// Prepare the adapter for use (create the storage root, open the
    /// native client). Must be called before `test()`.
    async fn init(&mut self) -> Result<bool>;

    /// Create a bucket, switching the working bucket if a name is given.
    /// Idempotent: an already existing bucket is success.
    async fn create_bucket(&mut self, name: Option<&str>) -> Result<bool>;

    /// Remove every file in a bucket without removing the bucket itself.
    /// Succeeds on an already empty bucket.
    async fn clear_bucket(&mut self, name: Option<&str>) -> Result<bool>;

    /// Remove a bucket and all of its contents
    async fn delete_bucket(&mut self, name: Option<&str>) -> Result<bool>;

    /// List bucket names visible to this adapter
    async fn list_buckets(&self) -> Result<Vec<String>>;

    /// Select the working bucket; `None` deselects
    async fn select_bucket(&mut self, name: Option<&str>) -> Result<bool>;

    /// Store a file in the selected bucket under `target` (a relative
    /// path which may contain directory separators). All three
    /// `add_file_from_*` entry points funnel into this primitive.
    /// Returns the stored path.
    async fn store(
        &mut self,
        source: FileSource,
        target: &str,
        options: &StoreOptions,
    ) -> Result<String>;

    /// Open a file as a readable stream, honoring an optional inclusive
    /// byte range. Fails with `NotFound` if the file is absent.
    async fn get_file_as_stream(
        &self,
        bucket: &str,
        file: &str,
        range: &RangeOptions,
    ) -> Result<ByteStream>;

    /// A URL-shaped locator for a stored file
    async fn get_file_as_url(&self, bucket: &str, file: &str) -> Result<String>;

    /// Remove a file. Idempotent: removing an absent file is success.
    async fn remove_file(&mut self, bucket: &str, file: &str) -> Result<bool>;

    /// List every regular file in a bucket as `(relative path, size)`.
    /// Enumeration order is backend-defined; callers must not depend on it.
    async fn list_files(&self, bucket: &str) -> Result<Vec<FileEntry>>;

    /// Byte size of a stored file
    async fn size_of(&self, bucket: &str, file: &str) -> Result<u64>;

    /// Whether a file exists. "Not found" is `Ok(false)`, never an error;
    /// genuine I/O failures propagate.
    async fn file_exists(&self, bucket: &str, file: &str) -> Result<bool>;

    /// Whether a bucket exists, with the same error policy as `file_exists`
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Store a file from a path on the local filesystem
    async fn add_file_from_path(
        &mut self,
        path: &Path,
        target: &str,
        options: &StoreOptions,
    ) -> Result<String> {
        self.store(FileSource::Path(path.to_path_buf()), target, options)
            .await
    }

    /// Store a file from an in-memory buffer
    async fn add_file_from_buffer(&mut self, buffer: Bytes, target: &str) -> Result<String> {
        self.store(FileSource::Buffer(buffer), target, &StoreOptions::default())
            .await
    }

    /// Store a file by draining a readable stream
    async fn add_file_from_stream(&mut self, stream: ByteStream, target: &str) -> Result<String> {
        self.store(FileSource::Stream(stream), target, &StoreOptions::default())
            .await
    }

    /// Connectivity self-test
    ///
    /// Fails with `NotInitialized` before `init()`. Otherwise probes the
    /// backend: `list_files` on the selected bucket when one is selected,
    /// `list_buckets` otherwise. Any probe failure is wrapped as
    /// `ConfigurationSuspect` carrying the original message, so callers
    /// can fail fast on bad credentials before doing real work.
    async fn test(&self) -> Result<String> {
        if !self.is_initialized() {
            return Err(StorageError::NotInitialized);
        }
        let selected = self.selected_bucket().map(str::to_string);
        let probe = match &selected {
            Some(bucket) => self.list_files(bucket).await.map(|_| ()),
            None => self.list_buckets().await.map(|_| ()),
        };
        match probe {
            Ok(()) => Ok(format!("{} adapter is reachable", self.adapter_type())),
            Err(e) => Err(StorageError::ConfigurationSuspect(e.to_string())),
        }
    }
}

//! polystore - uniform storage abstraction over multiple backends
//!
//! One operation set (bucket lifecycle, file add/read/remove, listing,
//! size/exists queries) over physically distinct storage backends: local
//! filesystem, AWS S3, Google Cloud Storage, Azure Blob Storage,
//! Backblaze B2 and Minio. The backend is selected at runtime from a
//! single configuration value, either a structured record or a connection
//! string of the shape `type://[key:secret@]locator[?query]`.
//!
//! Callers write backend-agnostic code against [`Storage`]; the concrete
//! adapter can be swapped with [`Storage::switch_adapter`] without
//! changing call sites. Every operation returns a [`Result`] with a
//! [`StorageError`]; nothing panics across the public boundary.
//!
//! The abstraction unifies the call surface and the error shape only.
//! Each backend keeps its native consistency and durability model.
//!
//! # Example
//!
//! ```no_run
//! use polystore::{Storage, StoreOptions};
//!
//! #[tokio::main]
//! async fn main() -> polystore::Result<()> {
//!     let mut storage = Storage::from_url("local:///tmp/store")?;
//!     storage.init().await?;
//!
//!     storage.create_bucket(Some("My Bucket!")).await?; // directory my-bucket
//!     storage
//!         .add_file_from_path("/tmp/a.txt".as_ref(), "notes/a.txt", &StoreOptions::default())
//!         .await?;
//!
//!     for (name, size) in storage.list_files("My Bucket!").await? {
//!         println!("{name}: {size} bytes");
//!     }
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod errors;
pub mod storage;

pub use adapter::{
    ByteStream, CloudAdapter, FileEntry, FileSource, LocalAdapter, RangeOptions, StorageAdapter,
    StoreOptions,
};
pub use config::{
    AzureConfig, B2Config, GcsConfig, LocalConfig, MinioConfig, S3Config, StorageConfig,
    REGISTERED_TYPES,
};
pub use errors::{Result, StorageError};
pub use storage::Storage;

//! Local filesystem storage adapter
//!
//! Emulates bucket semantics on a directory tree: a bucket is a directory
//! under the configured storage root, named by a filesystem-safe slug of
//! the caller-supplied bucket name. Every resolved path is checked to stay
//! inside the root before any filesystem access; `..` segments and
//! absolute paths are rejected with `PathEscape`. Paths that exist are
//! additionally canonicalized so a symlink planted inside a bucket cannot
//! lead reads or writes across the root boundary.
//!
//! The only persisted state is the directory tree itself. The adapter
//! keeps two pieces of in-memory state: the selected bucket and a
//! "bucket created" flag that short-circuits repeated existence probes.
//! Both reset when a new adapter instance is constructed.

use async_trait::async_trait;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use crate::adapter::{
    ByteStream, FileEntry, FileSource, RangeOptions, StorageAdapter, StoreOptions,
};
use crate::config::{LocalConfig, StorageConfig};
use crate::errors::{Result, StorageError};

/// Normalize a caller-supplied bucket name into a filesystem-safe slug
///
/// Lowercases, keeps `[a-z0-9_-]`, maps everything else to `-` and
/// collapses the runs. A name that slugs to nothing (e.g. `".."`) is
/// rejected, which also keeps traversal-shaped names from ever reaching
/// the filesystem.
pub(crate) fn slugify(name: &str) -> Result<String> {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        return Err(StorageError::InvalidConfig(format!(
            "bucket name '{name}' does not contain any usable characters"
        )));
    }
    Ok(slug)
}

/// Split a relative file path into normalized segments
///
/// Rejects absolute paths and any `..` that would climb above the bucket
/// directory. Purely lexical; nothing is touched on disk.
fn normalize_relative(relative: &str) -> Result<Vec<String>> {
    let mut segments: Vec<String> = Vec::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                segments.push(part.to_string_lossy().into_owned());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if segments.pop().is_none() {
                    return Err(StorageError::PathEscape(relative.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::PathEscape(relative.to_string()));
            }
        }
    }
    if segments.is_empty() {
        return Err(StorageError::PathEscape(relative.to_string()));
    }
    Ok(segments)
}

#[cfg(unix)]
async fn apply_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn apply_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Local filesystem storage adapter
pub struct LocalAdapter {
    config: StorageConfig,
    root: PathBuf,
    mode: Option<u32>,
    selected_bucket: Option<String>,
    bucket_created: bool,
    initialized: bool,
    config_error: Option<StorageError>,
}

impl LocalAdapter {
    /// Create a new local adapter from a resolved configuration
    ///
    /// A structurally invalid config is recorded once here; every
    /// subsequent operation replays that error without touching the disk.
    pub fn new(config: LocalConfig) -> Self {
        let mut config_error = None;
        if config.directory.trim().is_empty() {
            config_error = Some(StorageError::InvalidConfig(
                "local configuration requires the 'directory' field".to_string(),
            ));
        }

        let selected_bucket = match &config.bucket_name {
            Some(name) => match slugify(name) {
                Ok(slug) => Some(slug),
                Err(e) => {
                    config_error.get_or_insert(e);
                    None
                }
            },
            None => None,
        };

        let root = PathBuf::from(config.directory.trim());
        let mode = config.mode;
        Self {
            config: StorageConfig::Local(config),
            root,
            mode,
            selected_bucket,
            bucket_created: false,
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

    fn bucket_dir(&self, slug: &str) -> PathBuf {
        self.root.join(slug)
    }

    /// Resolve `file` inside a bucket directory, enforcing containment
    fn file_path(&self, bucket_slug: &str, file: &str) -> Result<PathBuf> {
        let segments = normalize_relative(file)?;
        let mut path = self.bucket_dir(bucket_slug);
        for segment in &segments {
            path.push(segment);
        }
        Ok(path)
    }

    /// Slug of the bucket to operate on: the supplied name, or the
    /// currently selected bucket
    fn resolve_bucket(&self, name: Option<&str>) -> Result<String> {
        match name {
            Some(n) => slugify(n),
            None => self
                .selected_bucket
                .clone()
                .ok_or_else(|| StorageError::NotFound("no bucket is selected".to_string())),
        }
    }

    /// Reject a path whose real location, after resolving symlinks, is
    /// outside the storage root
    ///
    /// An absent path cannot escape; callers surface `NotFound` (or
    /// `false`) for those themselves.
    async fn check_real_path(&self, path: &Path, original: &str) -> Result<()> {
        let real = match fs::canonicalize(path).await {
            Ok(real) => real,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let real_root = fs::canonicalize(&self.root).await?;
        if !real.starts_with(&real_root) {
            return Err(StorageError::PathEscape(original.to_string()));
        }
        Ok(())
    }

    async fn ensure_dir(&self, dir: &Path) -> Result<()> {
        match fs::create_dir_all(dir).await {
            Ok(()) => {
                if let Some(mode) = self.mode {
                    apply_mode(dir, mode).await?;
                }
                Ok(())
            }
            // Benign race: a concurrent create beat us to it
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StorageAdapter for LocalAdapter {
    fn adapter_type(&self) -> &'static str {
        "local"
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
        let root = self.root.clone();
        self.ensure_dir(&root).await?;
        self.initialized = true;
        debug!(root = %self.root.display(), "local adapter initialized");
        Ok(true)
    }

    async fn create_bucket(&mut self, name: Option<&str>) -> Result<bool> {
        self.guard()?;
        if let Some(name) = name {
            let slug = slugify(name)?;
            if self.selected_bucket.as_deref() != Some(&slug) {
                self.selected_bucket = Some(slug);
                self.bucket_created = false;
            }
        }
        let slug = self.resolve_bucket(None)?;
        if self.bucket_created {
            return Ok(true);
        }
        let dir = self.bucket_dir(&slug);
        match fs::metadata(&dir).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.ensure_dir(&dir).await?;
                debug!(bucket = %slug, "bucket directory created");
            }
            Err(e) => return Err(e.into()),
        }
        self.bucket_created = true;
        Ok(true)
    }

    async fn clear_bucket(&mut self, name: Option<&str>) -> Result<bool> {
        self.guard()?;
        let slug = self.resolve_bucket(name)?;
        let dir = self.bucket_dir(&slug);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // Clearing an absent bucket is as empty as it gets
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let removal = if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            match removal {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        debug!(bucket = %slug, "bucket cleared");
        Ok(true)
    }

    async fn delete_bucket(&mut self, name: Option<&str>) -> Result<bool> {
        self.guard()?;
        let slug = self.resolve_bucket(name)?;
        let dir = self.bucket_dir(&slug);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if self.selected_bucket.as_deref() == Some(&slug) {
            self.bucket_created = false;
        }
        debug!(bucket = %slug, "bucket deleted");
        Ok(true)
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        self.guard()?;
        let mut buckets = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(buckets),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                buckets.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(buckets)
    }

    async fn select_bucket(&mut self, name: Option<&str>) -> Result<bool> {
        self.guard()?;
        match name {
            Some(name) => {
                let slug = slugify(name)?;
                if self.selected_bucket.as_deref() != Some(&slug) {
                    self.selected_bucket = Some(slug);
                    self.bucket_created = false;
                }
            }
            None => {
                self.selected_bucket = None;
                self.bucket_created = false;
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
        let slug = self.resolve_bucket(None)?;
        let segments = normalize_relative(target)?;
        let bucket_dir = self.bucket_dir(&slug);
        let mut dest = bucket_dir.clone();
        for segment in &segments {
            dest.push(segment);
        }
        // Containment re-check on the assembled absolute path; the lexical
        // normalization above already rejects traversal, this keeps the
        // invariant independent of it.
        if !dest.starts_with(&bucket_dir) {
            return Err(StorageError::PathEscape(target.to_string()));
        }
        if let Some(parent) = dest.parent() {
            self.ensure_dir(parent).await?;
            // A pre-existing symlinked subdirectory must not redirect the
            // write outside the root
            self.check_real_path(parent, target).await?;
        }

        debug!(bucket = %slug, target = %dest.display(), source = ?source, "storing file");
        match source {
            FileSource::Path(path) => {
                fs::copy(&path, &dest).await?;
                if options.remove_source {
                    // Only after the copy fully succeeded
                    match fs::remove_file(&path).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            FileSource::Buffer(buffer) => {
                fs::write(&dest, &buffer).await?;
            }
            FileSource::Stream(mut stream) => {
                let mut file = fs::File::create(&dest).await?;
                tokio::io::copy(&mut stream, &mut file).await?;
                file.flush().await?;
            }
        }
        Ok(segments.join("/"))
    }

    async fn get_file_as_stream(
        &self,
        bucket: &str,
        file: &str,
        range: &RangeOptions,
    ) -> Result<ByteStream> {
        self.guard()?;
        let slug = slugify(bucket)?;
        let path = self.file_path(&slug, file)?;
        self.check_real_path(&path, file).await?;
        let meta = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(StorageError::NotFound(format!("{bucket}/{file}"))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{bucket}/{file}")))
            }
            Err(e) => return Err(e.into()),
        };

        let mut handle = fs::File::open(&path).await?;
        let start = range.start.unwrap_or(0);
        if start > 0 {
            handle.seek(SeekFrom::Start(start)).await?;
        }
        let remaining = match range.end {
            // Inclusive end offset
            Some(end) => end.saturating_add(1).saturating_sub(start),
            None => meta.len().saturating_sub(start),
        };
        Ok(Box::new(handle.take(remaining)))
    }

    async fn get_file_as_url(&self, bucket: &str, file: &str) -> Result<String> {
        self.guard()?;
        let slug = slugify(bucket)?;
        let path = self.file_path(&slug, file)?;
        self.check_real_path(&path, file).await?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(format!("file://{}", path.display())),
            Ok(_) => Err(StorageError::NotFound(format!("{bucket}/{file}"))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{bucket}/{file}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_file(&mut self, bucket: &str, file: &str) -> Result<bool> {
        self.guard()?;
        let slug = slugify(bucket)?;
        let path = self.file_path(&slug, file)?;
        self.check_real_path(&path, file).await?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            // Removing an absent file is success, not an error
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_files(&self, bucket: &str) -> Result<Vec<FileEntry>> {
        self.guard()?;
        let slug = slugify(bucket)?;
        let dir = self.bucket_dir(&slug);
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(StorageError::NotFound(bucket.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(bucket.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        let mut files = Vec::new();
        let mut pending = vec![dir.clone()];
        while let Some(current) = pending.pop() {
            let mut entries = fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    let meta = entry.metadata().await?;
                    let path = entry.path();
                    let relative = match path.strip_prefix(&dir) {
                        Ok(relative) => relative,
                        Err(_) => continue,
                    };
                    let name = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    files.push((name, meta.len()));
                }
            }
        }
        Ok(files)
    }

    async fn size_of(&self, bucket: &str, file: &str) -> Result<u64> {
        self.guard()?;
        let slug = slugify(bucket)?;
        let path = self.file_path(&slug, file)?;
        self.check_real_path(&path, file).await?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            Ok(_) => Err(StorageError::NotFound(format!("{bucket}/{file}"))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{bucket}/{file}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn file_exists(&self, bucket: &str, file: &str) -> Result<bool> {
        self.guard()?;
        let slug = slugify(bucket)?;
        let path = self.file_path(&slug, file)?;
        self.check_real_path(&path, file).await?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.guard()?;
        let slug = slugify(bucket)?;
        match fs::metadata(self.bucket_dir(&slug)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

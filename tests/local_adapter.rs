//! Integration tests for the local filesystem adapter

use bytes::Bytes;
use polystore::{
    FileSource, LocalAdapter, LocalConfig, RangeOptions, StorageAdapter, StorageError,
    StoreOptions,
};
use std::sync::Once;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

fn adapter_for(root: &TempDir, bucket: Option<&str>) -> LocalAdapter {
    init_tracing();
    LocalAdapter::new(LocalConfig {
        directory: root.path().to_string_lossy().into_owned(),
        bucket_name: bucket.map(str::to_string),
        mode: None,
    })
}

async fn read_all(mut stream: polystore::ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn create_bucket_slugifies_and_is_idempotent() {
    let root = TempDir::new().unwrap();
    let mut adapter = adapter_for(&root, None);
    adapter.init().await.unwrap();

    assert!(adapter.create_bucket(Some("My Bucket!")).await.unwrap());
    assert!(root.path().join("my-bucket").is_dir());

    // Second call short-circuits on the created-flag, still succeeds
    assert!(adapter.create_bucket(Some("My Bucket!")).await.unwrap());
    let dirs: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
    assert_eq!(dirs.len(), 1);
}

#[tokio::test]
async fn created_flag_resets_per_instance() {
    let root = TempDir::new().unwrap();
    let mut adapter = adapter_for(&root, Some("docs"));
    adapter.init().await.unwrap();
    adapter.create_bucket(None).await.unwrap();
    assert!(root.path().join("docs").is_dir());

    // A fresh instance probes the directory again instead of trusting
    // the old flag
    let mut fresh = adapter_for(&root, Some("docs"));
    fresh.init().await.unwrap();
    assert!(fresh.create_bucket(None).await.unwrap());
}

#[tokio::test]
async fn store_and_read_round_trip() {
    let root = TempDir::new().unwrap();
    let mut adapter = adapter_for(&root, Some("files"));
    adapter.init().await.unwrap();
    adapter.create_bucket(None).await.unwrap();

    let content = b"the quick brown fox".to_vec();
    let stored = adapter
        .add_file_from_buffer(Bytes::from(content.clone()), "notes/a.txt")
        .await
        .unwrap();
    assert_eq!(stored, "notes/a.txt");

    let stream = adapter
        .get_file_as_stream("files", "notes/a.txt", &RangeOptions::default())
        .await
        .unwrap();
    assert_eq!(read_all(stream).await, content);
    assert_eq!(
        adapter.size_of("files", "notes/a.txt").await.unwrap(),
        content.len() as u64
    );
}

#[tokio::test]
async fn add_file_from_path_lands_in_bucket() {
    let root = TempDir::new().unwrap();
    let source_dir = TempDir::new().unwrap();
    let source = source_dir.path().join("a.txt");
    std::fs::write(&source, b"hello from disk").unwrap();

    let mut adapter = adapter_for(&root, None);
    adapter.init().await.unwrap();
    adapter.create_bucket(Some("My Bucket!")).await.unwrap();
    adapter
        .add_file_from_path(&source, "notes/a.txt", &StoreOptions::default())
        .await
        .unwrap();

    assert!(root.path().join("my-bucket/notes/a.txt").is_file());
    assert!(source.is_file());

    let files = adapter.list_files("My Bucket!").await.unwrap();
    assert_eq!(files, vec![("notes/a.txt".to_string(), 15)]);
}

#[tokio::test]
async fn remove_source_deletes_only_after_copy() {
    let root = TempDir::new().unwrap();
    let source_dir = TempDir::new().unwrap();
    let source = source_dir.path().join("move-me.txt");
    std::fs::write(&source, b"payload").unwrap();

    let mut adapter = adapter_for(&root, Some("inbox"));
    adapter.init().await.unwrap();
    adapter.create_bucket(None).await.unwrap();

    let options = StoreOptions {
        remove_source: true,
    };

    // A rejected target leaves the source untouched
    let err = adapter
        .add_file_from_path(&source, "../outside.txt", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::PathEscape(_)));
    assert!(source.is_file());

    adapter
        .add_file_from_path(&source, "moved.txt", &options)
        .await
        .unwrap();
    assert!(!source.exists());
    assert!(adapter.file_exists("inbox", "moved.txt").await.unwrap());
}

#[tokio::test]
async fn stream_source_store() {
    let root = TempDir::new().unwrap();
    let source_dir = TempDir::new().unwrap();
    let source = source_dir.path().join("in.bin");
    std::fs::write(&source, vec![7u8; 4096]).unwrap();

    let mut adapter = adapter_for(&root, Some("blobs"));
    adapter.init().await.unwrap();
    adapter.create_bucket(None).await.unwrap();

    let stream = Box::new(tokio::fs::File::open(&source).await.unwrap());
    adapter
        .add_file_from_stream(stream, "copy.bin")
        .await
        .unwrap();
    assert_eq!(adapter.size_of("blobs", "copy.bin").await.unwrap(), 4096);
}

#[tokio::test]
async fn traversal_is_rejected_everywhere() {
    let root = TempDir::new().unwrap();
    let mut adapter = adapter_for(&root, Some("jail"));
    adapter.init().await.unwrap();
    adapter.create_bucket(None).await.unwrap();

    let err = adapter
        .get_file_as_stream("jail", "../../etc/passwd", &RangeOptions::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, StorageError::PathEscape(_)));

    let err = adapter
        .store(
            FileSource::Buffer(Bytes::from_static(b"x")),
            "/etc/hosts",
            &StoreOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::PathEscape(_)));

    let err = adapter.size_of("jail", "a/../../../b").await.unwrap_err();
    assert!(matches!(err, StorageError::PathEscape(_)));

    // A traversal-shaped bucket name slugs to a name under the root
    adapter.create_bucket(Some("../../etc")).await.unwrap();
    assert!(root.path().join("etc").is_dir());
    assert!(!root.path().parent().unwrap().join("etc").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_files_cannot_escape_the_root() {
    let root = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let secret = outside.path().join("secret.txt");
    std::fs::write(&secret, b"outside the root").unwrap();

    let mut adapter = adapter_for(&root, Some("jail"));
    adapter.init().await.unwrap();
    adapter.create_bucket(None).await.unwrap();
    std::os::unix::fs::symlink(&secret, root.path().join("jail/link.txt")).unwrap();

    let err = adapter
        .get_file_as_stream("jail", "link.txt", &RangeOptions::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, StorageError::PathEscape(_)));
    assert!(matches!(
        adapter.size_of("jail", "link.txt").await.unwrap_err(),
        StorageError::PathEscape(_)
    ));
    assert!(matches!(
        adapter.file_exists("jail", "link.txt").await.unwrap_err(),
        StorageError::PathEscape(_)
    ));
    assert!(matches!(
        adapter.remove_file("jail", "link.txt").await.unwrap_err(),
        StorageError::PathEscape(_)
    ));
    assert!(secret.is_file());

    // A link that stays inside the root still resolves
    adapter
        .add_file_from_buffer(Bytes::from_static(b"internal"), "real.txt")
        .await
        .unwrap();
    std::os::unix::fs::symlink(
        root.path().join("jail/real.txt"),
        root.path().join("jail/alias.txt"),
    )
    .unwrap();
    let stream = adapter
        .get_file_as_stream("jail", "alias.txt", &RangeOptions::default())
        .await
        .unwrap();
    assert_eq!(read_all(stream).await, b"internal");
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_directories_cannot_redirect_writes() {
    let root = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();

    let mut adapter = adapter_for(&root, Some("jail"));
    adapter.init().await.unwrap();
    adapter.create_bucket(None).await.unwrap();
    std::os::unix::fs::symlink(outside.path(), root.path().join("jail/exit")).unwrap();

    let err = adapter
        .add_file_from_buffer(Bytes::from_static(b"x"), "exit/x.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::PathEscape(_)));
    assert!(!outside.path().join("x.txt").exists());
}

#[tokio::test]
async fn remove_file_is_idempotent() {
    let root = TempDir::new().unwrap();
    let mut adapter = adapter_for(&root, Some("files"));
    adapter.init().await.unwrap();
    adapter.create_bucket(None).await.unwrap();

    adapter
        .add_file_from_buffer(Bytes::from_static(b"bye"), "gone.txt")
        .await
        .unwrap();
    assert!(adapter.remove_file("files", "gone.txt").await.unwrap());
    // Already absent: success, not NotFound
    assert!(adapter.remove_file("files", "gone.txt").await.unwrap());
    assert!(adapter.remove_file("files", "missing.txt").await.unwrap());
}

#[tokio::test]
async fn list_files_walks_nested_directories() {
    let root = TempDir::new().unwrap();
    let mut adapter = adapter_for(&root, Some("tree"));
    adapter.init().await.unwrap();
    adapter.create_bucket(None).await.unwrap();

    let paths = ["a.txt", "sub/b.txt", "sub/deep/c.txt", "other/d.txt"];
    for (i, path) in paths.iter().enumerate() {
        adapter
            .add_file_from_buffer(Bytes::from(vec![0u8; i + 1]), path)
            .await
            .unwrap();
    }

    let mut files = adapter.list_files("tree").await.unwrap();
    files.sort();
    assert_eq!(
        files,
        vec![
            ("a.txt".to_string(), 1),
            ("other/d.txt".to_string(), 4),
            ("sub/b.txt".to_string(), 2),
            ("sub/deep/c.txt".to_string(), 3),
        ]
    );
}

#[tokio::test]
async fn ranged_reads_return_inclusive_slice() {
    let root = TempDir::new().unwrap();
    let mut adapter = adapter_for(&root, Some("ranges"));
    adapter.init().await.unwrap();
    adapter.create_bucket(None).await.unwrap();
    adapter
        .add_file_from_buffer(Bytes::from_static(b"0123456789"), "digits.txt")
        .await
        .unwrap();

    let range = RangeOptions {
        start: Some(2),
        end: Some(5),
    };
    let stream = adapter
        .get_file_as_stream("ranges", "digits.txt", &range)
        .await
        .unwrap();
    assert_eq!(read_all(stream).await, b"2345");

    let tail = RangeOptions {
        start: Some(7),
        end: None,
    };
    let stream = adapter
        .get_file_as_stream("ranges", "digits.txt", &tail)
        .await
        .unwrap();
    assert_eq!(read_all(stream).await, b"789");

    let head = RangeOptions {
        start: None,
        end: Some(3),
    };
    let stream = adapter
        .get_file_as_stream("ranges", "digits.txt", &head)
        .await
        .unwrap();
    assert_eq!(read_all(stream).await, b"0123");
}

#[tokio::test]
async fn missing_file_reads_fail_with_not_found() {
    let root = TempDir::new().unwrap();
    let mut adapter = adapter_for(&root, Some("empty"));
    adapter.init().await.unwrap();
    adapter.create_bucket(None).await.unwrap();

    let err = adapter
        .get_file_as_stream("empty", "nope.txt", &RangeOptions::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, StorageError::NotFound(_)));

    let err = adapter.size_of("empty", "nope.txt").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));

    assert!(!adapter.file_exists("empty", "nope.txt").await.unwrap());
}

#[tokio::test]
async fn clear_bucket_keeps_the_bucket_directory() {
    let root = TempDir::new().unwrap();
    let mut adapter = adapter_for(&root, Some("clearing"));
    adapter.init().await.unwrap();
    adapter.create_bucket(None).await.unwrap();
    adapter
        .add_file_from_buffer(Bytes::from_static(b"a"), "a.txt")
        .await
        .unwrap();
    adapter
        .add_file_from_buffer(Bytes::from_static(b"b"), "nested/b.txt")
        .await
        .unwrap();

    assert!(adapter.clear_bucket(None).await.unwrap());
    assert!(root.path().join("clearing").is_dir());
    assert!(adapter.list_files("clearing").await.unwrap().is_empty());

    // Clearing an already empty bucket succeeds
    assert!(adapter.clear_bucket(None).await.unwrap());
}

#[tokio::test]
async fn delete_bucket_removes_the_directory() {
    let root = TempDir::new().unwrap();
    let mut adapter = adapter_for(&root, None);
    adapter.init().await.unwrap();
    adapter.create_bucket(Some("doomed")).await.unwrap();
    adapter
        .add_file_from_buffer(Bytes::from_static(b"x"), "x.txt")
        .await
        .unwrap();

    assert!(adapter.delete_bucket(Some("doomed")).await.unwrap());
    assert!(!root.path().join("doomed").exists());
    assert!(!adapter.bucket_exists("doomed").await.unwrap());

    // Deleting an absent bucket is success
    assert!(adapter.delete_bucket(Some("doomed")).await.unwrap());

    // The created-flag was cleared, so create probes the disk again
    assert!(adapter.create_bucket(Some("doomed")).await.unwrap());
    assert!(root.path().join("doomed").is_dir());
}

#[tokio::test]
async fn list_buckets_reports_directories() {
    let root = TempDir::new().unwrap();
    let mut adapter = adapter_for(&root, None);
    adapter.init().await.unwrap();
    adapter.create_bucket(Some("one")).await.unwrap();
    adapter.create_bucket(Some("two")).await.unwrap();

    let mut buckets = adapter.list_buckets().await.unwrap();
    buckets.sort();
    assert_eq!(buckets, vec!["one".to_string(), "two".to_string()]);
}

#[tokio::test]
async fn test_probe_semantics() {
    let root = TempDir::new().unwrap();
    let mut adapter = adapter_for(&root, Some("probe"));

    // Before init
    assert_eq!(adapter.test().await.unwrap_err(), StorageError::NotInitialized);

    adapter.init().await.unwrap();
    // Selected bucket does not exist yet: the probe fails and is wrapped
    let err = adapter.test().await.unwrap_err();
    assert!(matches!(err, StorageError::ConfigurationSuspect(_)));

    adapter.create_bucket(None).await.unwrap();
    assert!(adapter.test().await.is_ok());

    // Without a selected bucket the probe lists buckets instead
    let mut unselected = adapter_for(&root, None);
    unselected.init().await.unwrap();
    assert!(unselected.test().await.is_ok());
}

#[tokio::test]
async fn sticky_config_error_short_circuits_operations() {
    let mut adapter = LocalAdapter::new(LocalConfig {
        directory: String::new(),
        bucket_name: None,
        mode: None,
    });

    let first = adapter.init().await.unwrap_err();
    assert!(matches!(first, StorageError::InvalidConfig(_)));
    // Every subsequent operation replays the same error
    assert_eq!(adapter.create_bucket(Some("x")).await.unwrap_err(), first);
    assert_eq!(adapter.list_buckets().await.unwrap_err(), first);
    assert_eq!(
        adapter.file_exists("x", "y.txt").await.unwrap_err(),
        first
    );
}

#[tokio::test]
async fn get_file_as_url_points_into_the_bucket() {
    let root = TempDir::new().unwrap();
    let mut adapter = adapter_for(&root, Some("linked"));
    adapter.init().await.unwrap();
    adapter.create_bucket(None).await.unwrap();
    adapter
        .add_file_from_buffer(Bytes::from_static(b"x"), "x.txt")
        .await
        .unwrap();

    let url = adapter.get_file_as_url("linked", "x.txt").await.unwrap();
    assert!(url.starts_with("file://"));
    assert!(url.ends_with("linked/x.txt"));

    let err = adapter.get_file_as_url("linked", "nope.txt").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

use std::path::Path;

use s3_helpers::{clear_bucket, list_all_objects, ListParams, LocalStore, S3};

async fn put(root: &Path, bucket: &str, key: &str) {
    let path = root.join(bucket).join(key);
    tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    tokio::fs::write(path, key.as_bytes()).await.unwrap();
}

fn keys(entries: &[s3_helpers::Entry]) -> Vec<&str> {
    entries.iter().map(|e| e.key.as_str()).collect()
}

#[tokio::test]
async fn test_list_all_objects_across_pages() {
    let root = tempfile::tempdir().unwrap();
    for key in ["a", "b", "c", "d", "e"] {
        put(root.path(), "bucket", key).await;
    }
    let s3 = S3::with_store(LocalStore::new(root.path()));

    let listed = list_all_objects(&s3, &ListParams::new("bucket").with_max_keys(2))
        .await
        .unwrap();
    assert_eq!(keys(&listed), vec!["a", "b", "c", "d", "e"]);
}

#[tokio::test]
async fn test_clear_bucket_keeps_directory_markers() {
    let root = tempfile::tempdir().unwrap();
    put(root.path(), "bucket", "top.txt").await;
    put(root.path(), "bucket", "nested/inner.txt").await;
    let s3 = S3::with_store(LocalStore::new(root.path()));

    let mut deleted = clear_bucket(&s3, "bucket").await.unwrap();
    deleted.sort();
    assert_eq!(deleted, vec!["nested/inner.txt", "top.txt"]);

    let left = s3.bucket("bucket".into()).list_all_objects().await.unwrap();
    assert_eq!(keys(&left), vec!["nested/"]);
}

#[tokio::test]
async fn test_clear_bucket_that_does_not_exist() {
    let root = tempfile::tempdir().unwrap();
    let s3 = S3::with_store(LocalStore::new(root.path()));

    let deleted = clear_bucket(&s3, "nothing-here").await.unwrap();
    assert!(deleted.is_empty());
}

use std::{
    collections::HashMap,
    io,
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;

use super::{
    bucket::ListParams,
    object::Entry,
    store::{ListPage, ObjectStore, StoreError},
};

/// Page size used when a listing call does not ask for one, same as S3.
const DEFAULT_MAX_KEYS: usize = 1000;

/// An object store backed by the local filesystem.
///
/// Every bucket is a directory directly under `root` and every object is a
/// file inside it, keyed by its `/`-separated path relative to the bucket
/// directory. Sub-directories show up in listings as directory markers.
///
/// Each page request walks the whole bucket directory, so this is meant for
/// tests and small local trees, not large directories.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(StoreError::Other {
                msg: "invalid bucket name".into(),
                data: HashMap::from([("bucket_name".into(), bucket.to_owned())]),
            });
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key.trim_end_matches('/'));
        let escapes_bucket = key.is_empty()
            || relative
                .components()
                .any(|component| !matches!(component, Component::Normal(_)));
        if escapes_bucket {
            return Err(StoreError::Other {
                msg: "object key does not name a path inside the bucket".into(),
                data: HashMap::from([
                    ("bucket_name".into(), bucket.to_owned()),
                    ("key".into(), key.to_owned()),
                ]),
            });
        }
        Ok(self.bucket_dir(bucket)?.join(relative))
    }

    /// Walk the bucket directory and return every entry sorted by key.
    async fn scan(&self, bucket: &str) -> Result<Vec<Entry>, StoreError> {
        let mut entries = Vec::new();
        let mut pending = vec![(self.bucket_dir(bucket)?, String::new())];

        while let Some((dir, key_prefix)) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(&dir)
                .await
                .map_err(|err| scan_error(err, &dir))?;
            while let Some(dir_entry) = read_dir
                .next_entry()
                .await
                .map_err(|err| scan_error(err, &dir))?
            {
                let name = dir_entry.file_name().into_string().map_err(|name| {
                    StoreError::Other {
                        msg: "file name is not valid unicode".into(),
                        data: HashMap::from([
                            ("directory".into(), dir.display().to_string()),
                            ("file_name".into(), name.to_string_lossy().into_owned()),
                        ]),
                    }
                })?;
                let metadata = dir_entry.metadata().await?;
                if metadata.is_dir() {
                    let marker = format!("{key_prefix}{name}/");
                    entries.push(Entry::new(marker.clone()));
                    pending.push((dir_entry.path(), marker));
                } else {
                    let mut entry = Entry::new(format!("{key_prefix}{name}"))
                        .with_size(i64::try_from(metadata.len()).unwrap_or(i64::MAX));
                    if let Ok(modified) = metadata.modified() {
                        entry = entry.with_last_modified(modified.into());
                    }
                    entries.push(entry);
                }
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

fn scan_error(err: io::Error, dir: &Path) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::ScanDirectoryNotFound {
            path: dir.to_path_buf(),
        }
    } else {
        StoreError::Io(err)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn list_page(&self, params: &ListParams) -> Result<ListPage, StoreError> {
        let max_keys = match params.max_keys() {
            None => DEFAULT_MAX_KEYS,
            Some(max) => match usize::try_from(max) {
                Ok(max) if max > 0 => max,
                _ => {
                    return Err(StoreError::Other {
                        msg: "max_keys must be positive".into(),
                        data: HashMap::from([
                            ("bucket_name".into(), params.bucket().to_owned()),
                            ("max_keys".into(), max.to_string()),
                        ]),
                    })
                }
            },
        };

        let mut remaining = self
            .scan(params.bucket())
            .await?
            .into_iter()
            .filter(|entry| params.prefix().map_or(true, |p| entry.key.starts_with(p)))
            .filter(|entry| {
                params
                    .continuation_token()
                    .map_or(true, |token| entry.key.as_str() > token)
            })
            .peekable();

        let contents: Vec<Entry> = remaining.by_ref().take(max_keys).collect();
        let is_truncated = remaining.peek().is_some();
        let next_continuation_token = if is_truncated {
            contents.last().map(|entry| entry.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            contents,
            is_truncated,
            next_continuation_token,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        let removed = if key.ends_with('/') {
            tokio::fs::remove_dir(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match removed {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(StoreError::Io(err)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn put(root: &Path, bucket: &str, key: &str, body: &[u8]) {
        let path = root.join(bucket).join(key);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(path, body).await.unwrap();
    }

    fn keys(page: &ListPage) -> Vec<&str> {
        page.contents.iter().map(|e| e.key.as_str()).collect()
    }

    #[tokio::test]
    async fn test_missing_bucket_directory() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path());

        let err = store
            .list_page(&ListParams::new("absent"))
            .await
            .unwrap_err();
        assert!(err.is_scan_directory_not_found());
    }

    #[tokio::test]
    async fn test_list_sorted_with_markers() {
        let root = tempfile::tempdir().unwrap();
        put(root.path(), "bucket", "b.txt", b"bb").await;
        put(root.path(), "bucket", "a.txt", b"a").await;
        put(root.path(), "bucket", "dir/c.txt", b"ccc").await;
        let store = LocalStore::new(root.path());

        let page = store.list_page(&ListParams::new("bucket")).await.unwrap();
        assert_eq!(keys(&page), vec!["a.txt", "b.txt", "dir/", "dir/c.txt"]);
        assert!(!page.is_truncated);
        assert!(page.next_continuation_token.is_none());
        assert_eq!(page.contents[1].size, 2);
        assert!(page.contents[1].last_modified.is_some());
    }

    #[tokio::test]
    async fn test_list_pages_and_prefix() {
        let root = tempfile::tempdir().unwrap();
        for key in ["logs/1", "logs/2", "logs/3", "other"] {
            put(root.path(), "bucket", key, b"x").await;
        }
        let store = LocalStore::new(root.path());
        let params = ListParams::new("bucket")
            .with_prefix("logs/")
            .with_max_keys(2);

        let first = store.list_page(&params).await.unwrap();
        assert_eq!(keys(&first), vec!["logs/1", "logs/2"]);
        assert!(first.is_truncated);
        assert_eq!(first.next_continuation_token.as_deref(), Some("logs/2"));

        let second = store
            .list_page(&params.with_continuation_token("logs/2"))
            .await
            .unwrap();
        assert_eq!(keys(&second), vec!["logs/3"]);
        assert!(!second.is_truncated);
    }

    #[tokio::test]
    async fn test_list_rejects_non_positive_max_keys() {
        let root = tempfile::tempdir().unwrap();
        put(root.path(), "bucket", "a", b"a").await;
        let store = LocalStore::new(root.path());

        for max_keys in [0, -5] {
            let err = store
                .list_page(&ListParams::new("bucket").with_max_keys(max_keys))
                .await
                .unwrap_err();
            match err {
                StoreError::Other { msg, data } => {
                    assert_eq!(msg, "max_keys must be positive");
                    assert_eq!(data["max_keys"], max_keys.to_string());
                }
                other => panic!("unexpected error for {max_keys}: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_delete_object() {
        let root = tempfile::tempdir().unwrap();
        put(root.path(), "bucket", "dir/a.txt", b"a").await;
        let store = LocalStore::new(root.path());

        store.delete_object("bucket", "dir/a.txt").await.unwrap();
        assert!(!root.path().join("bucket/dir/a.txt").exists());

        // Already gone.
        store.delete_object("bucket", "dir/a.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_rejects_escaping_keys() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path());

        for key in ["../other/a.txt", "/etc/passwd", ""] {
            let err = store.delete_object("bucket", key).await.unwrap_err();
            assert!(matches!(err, StoreError::Other { .. }), "{key}");
        }
    }
}

use std::{collections::HashMap, sync::Arc};

use futures::future::join_all;
use tracing::debug;

use super::{
    object::Entry,
    s3::S3,
    store::{ObjectStore, StoreError},
};

/// Parameters of a listing call.
///
/// Values are never modified in place, every `with_*` call produces a new
/// set of parameters, so each page request owns its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    bucket: String,
    prefix: Option<String>,
    continuation_token: Option<String>,
    max_keys: Option<i32>,
}

impl ListParams {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
            continuation_token: None,
            max_keys: None,
        }
    }

    /// Only list keys starting with `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Start listing after the page that returned `token`.
    pub fn with_continuation_token(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }

    /// Cap the number of entries per page. The store picks when unset.
    pub fn with_max_keys(mut self, max_keys: i32) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn continuation_token(&self) -> Option<&str> {
        self.continuation_token.as_deref()
    }

    pub fn max_keys(&self) -> Option<i32> {
        self.max_keys
    }
}

impl From<&str> for ListParams {
    fn from(bucket: &str) -> Self {
        Self::new(bucket)
    }
}

impl From<String> for ListParams {
    fn from(bucket: String) -> Self {
        Self::new(bucket)
    }
}

pub struct Bucket {
    pub name: String,
    store: Arc<dyn ObjectStore>,
}

impl Bucket {
    pub(crate) fn new(name: String, store: Arc<dyn ObjectStore>) -> Self {
        Self { name, store }
    }

    /// Every entry in the bucket, in the order the store lists them.
    pub async fn list_all_objects(&self) -> Result<Vec<Entry>, StoreError> {
        list_pages(self.store.as_ref(), &ListParams::new(&self.name), Vec::new()).await
    }

    /// Like [`Bucket::list_all_objects`], appending to `out` and handing it back.
    pub async fn list_all_objects_into(&self, out: Vec<Entry>) -> Result<Vec<Entry>, StoreError> {
        list_pages(self.store.as_ref(), &ListParams::new(&self.name), out).await
    }

    /// Every entry whose key starts with `prefix`.
    pub async fn list_objects_with_prefix(&self, prefix: &str) -> Result<Vec<Entry>, StoreError> {
        let params = ListParams::new(&self.name).with_prefix(prefix);
        list_pages(self.store.as_ref(), &params, Vec::new()).await
    }

    /// Delete the objects behind `entries`, skipping directory markers.
    /// Returns the deleted keys in input order.
    pub async fn delete_entries(&self, entries: &[Entry]) -> Result<Vec<String>, BulkDeleteError> {
        delete_all(self.store.as_ref(), &self.name, entries).await
    }

    /// List everything in the bucket, then delete all of it.
    pub async fn clear(&self) -> Result<Vec<String>, ClearBucketError> {
        clear(self.store.as_ref(), &self.name).await
    }
}

/// List every entry matching `params`, following continuation tokens until
/// the store reports the last page.
///
/// A bucket whose backing directory cannot be found yields no entries rather
/// than an error. Any other failure aborts the listing and nothing collected
/// so far is returned.
pub async fn list_all_objects(s3: &S3, params: &ListParams) -> Result<Vec<Entry>, StoreError> {
    list_pages(s3.store(), params, Vec::new()).await
}

/// Like [`list_all_objects`], appending to `out` and handing it back.
pub async fn list_all_objects_into(
    s3: &S3,
    params: &ListParams,
    out: Vec<Entry>,
) -> Result<Vec<Entry>, StoreError> {
    list_pages(s3.store(), params, out).await
}

/// Delete the objects behind `entries` from `bucket_name`, all at once.
///
/// Keys ending in `/` are directory markers and are skipped. Every delete is
/// allowed to finish, and the call fails if any of them failed.
pub async fn delete_entries(
    s3: &S3,
    bucket_name: &str,
    entries: &[Entry],
) -> Result<Vec<String>, BulkDeleteError> {
    delete_all(s3.store(), bucket_name, entries).await
}

/// Delete every object in `bucket_name`.
///
/// There is no rollback: if some deletes fail the others stay deleted, and
/// calling this again picks up whatever is left.
pub async fn clear_bucket(s3: &S3, bucket_name: &str) -> Result<Vec<String>, ClearBucketError> {
    clear(s3.store(), bucket_name).await
}

async fn list_pages(
    store: &dyn ObjectStore,
    params: &ListParams,
    mut out: Vec<Entry>,
) -> Result<Vec<Entry>, StoreError> {
    let mut page_params = params.clone();
    let mut pages = 0usize;
    loop {
        let page = match store.list_page(&page_params).await {
            Ok(page) => page,
            Err(err) if err.is_scan_directory_not_found() => {
                debug!(bucket = params.bucket(), error = %err, "bucket directory missing, treating as empty");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };
        pages += 1;
        debug!(
            bucket = params.bucket(),
            page = pages,
            entries = page.contents.len(),
            truncated = page.is_truncated,
            "listed page"
        );
        out.extend(page.contents);

        if !page.is_truncated {
            return Ok(out);
        }
        let token = page
            .next_continuation_token
            .ok_or_else(|| StoreError::Other {
                msg: "listing is truncated but no continuation token was returned".into(),
                data: HashMap::from([
                    ("bucket_name".into(), params.bucket().to_owned()),
                    ("page".into(), pages.to_string()),
                ]),
            })?;
        page_params = params.clone().with_continuation_token(token);
    }
}

async fn delete_all(
    store: &dyn ObjectStore,
    bucket_name: &str,
    entries: &[Entry],
) -> Result<Vec<String>, BulkDeleteError> {
    let deletes: Vec<_> = entries
        .iter()
        .filter(|entry| !entry.is_directory_marker())
        .map(|entry| async move {
            match store.delete_object(bucket_name, &entry.key).await {
                Ok(()) => Ok(entry.key.clone()),
                Err(source) => Err(DeleteError {
                    key: entry.key.clone(),
                    source,
                }),
            }
        })
        .collect();
    debug!(
        bucket = bucket_name,
        deletes = deletes.len(),
        skipped = entries.len() - deletes.len(),
        "deleting entries"
    );

    let mut deleted = Vec::with_capacity(deletes.len());
    let mut failures = Vec::new();
    for outcome in join_all(deletes).await {
        match outcome {
            Ok(key) => deleted.push(key),
            Err(err) => failures.push(err),
        }
    }

    if failures.is_empty() {
        Ok(deleted)
    } else {
        Err(BulkDeleteError { deleted, failures })
    }
}

async fn clear(store: &dyn ObjectStore, bucket_name: &str) -> Result<Vec<String>, ClearBucketError> {
    let entries = list_pages(store, &ListParams::new(bucket_name), Vec::new()).await?;
    Ok(delete_all(store, bucket_name, &entries).await?)
}

/// Deleting a single key failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to remove {key}: {source}")]
pub struct DeleteError {
    pub key: String,
    pub source: StoreError,
}

/// At least one delete of a bulk delete failed.
///
/// Holds every failure, in input order, along with the keys that were
/// removed anyway.
#[derive(Debug, thiserror::Error)]
#[error("{}", describe_failures(.failures))]
pub struct BulkDeleteError {
    deleted: Vec<String>,
    failures: Vec<DeleteError>,
}

impl BulkDeleteError {
    pub fn deleted(&self) -> &[String] {
        &self.deleted
    }

    pub fn failures(&self) -> &[DeleteError] {
        &self.failures
    }

    pub fn first(&self) -> &DeleteError {
        &self.failures[0]
    }

    pub fn into_failures(self) -> Vec<DeleteError> {
        self.failures
    }
}

fn describe_failures(failures: &[DeleteError]) -> String {
    match failures {
        [] => "bulk delete failed".to_owned(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more failed)", rest.len()),
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ClearBucketError {
    #[error(transparent)]
    List(#[from] StoreError),
    #[error(transparent)]
    Delete(#[from] BulkDeleteError),
}

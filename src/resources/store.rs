use std::{collections::HashMap, io, path::PathBuf};

use async_trait::async_trait;

use super::{bucket::ListParams, object::Entry};

/// One page of a listing call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    pub contents: Vec<Entry>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// The two capabilities the bucket helpers need from an object store.
///
/// Implementations must be safe to share between concurrent calls, since
/// deletes are issued side by side against the same handle.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a single page of entries described by `params`.
    async fn list_page(&self, params: &ListParams) -> Result<ListPage, StoreError>;

    /// Delete exactly one object.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl ObjectStore for aws_sdk_s3::Client {
    async fn list_page(&self, params: &ListParams) -> Result<ListPage, StoreError> {
        let list_objects_request = self
            .list_objects_v2()
            .bucket(params.bucket())
            .set_prefix(params.prefix().map(str::to_owned))
            .set_continuation_token(params.continuation_token().map(str::to_owned))
            .set_max_keys(params.max_keys());
        let response = list_objects_request.send().await?;
        Ok(ListPage {
            contents: response
                .contents()
                .unwrap_or_default()
                .iter()
                .map(Entry::from)
                .collect(),
            is_truncated: response.is_truncated(),
            next_continuation_token: response.next_continuation_token().map(str::to_owned),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let delete_object_request = self.delete_object().bucket(bucket).key(key);
        delete_object_request.send().await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error(transparent)]
    ListObjects(#[from] aws_sdk_s3::types::SdkError<aws_sdk_s3::error::ListObjectsV2Error>),
    #[error(transparent)]
    DeleteObject(#[from] aws_sdk_s3::types::SdkError<aws_sdk_s3::error::DeleteObjectError>),
    /// The directory backing a bucket vanished or never existed while it was
    /// being scanned.
    #[error("directory {} not found during scan", path.display())]
    ScanDirectoryNotFound { path: PathBuf },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{msg}")]
    Other {
        msg: String,
        data: HashMap<String, String>,
    },
}

impl StoreError {
    pub fn is_scan_directory_not_found(&self) -> bool {
        matches!(self, StoreError::ScanDirectoryNotFound { .. })
    }
}

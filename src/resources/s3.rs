use std::sync::Arc;

use tokio::sync::OnceCell;

use super::{bucket::Bucket, store::ObjectStore};

#[derive(Clone)]
pub struct S3 {
    store: Arc<dyn ObjectStore>,
}

impl S3 {
    /// Create an `S3` resource with the AWS configuration loaded from the
    /// environment.
    pub async fn default() -> Self {
        let aws_sdk_config = aws_config::from_env().load().await;
        Self::with_aws_sdk_config(&aws_sdk_config)
    }

    /// Create an `S3` resource with the provided AWS `config`.
    pub fn with_aws_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::with_store(aws_sdk_s3::Client::new(config))
    }

    /// Create an `S3` resource talking to any [`ObjectStore`], e.g. a
    /// [`LocalStore`](super::local::LocalStore) or a test double.
    pub fn with_store(store: impl ObjectStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn bucket(&self, name: String) -> Bucket {
        Bucket::new(name, Arc::clone(&self.store))
    }

    pub(crate) fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }
}

/// A process-wide [`S3`] handle built on first use.
///
/// Declare it in a `static` and every caller shares the same client:
///
/// ```ignore
/// static S3_HANDLE: LazyS3 = LazyS3::new();
///
/// let s3 = S3_HANDLE.get().await;
/// s3_helpers::clear_bucket(s3, "my-bucket").await?;
/// ```
///
/// The handle can only be swapped out by building it with [`LazyS3::with_s3`]
/// or by calling [`LazyS3::inject`] before anything has used it.
pub struct LazyS3 {
    cell: OnceCell<S3>,
}

impl LazyS3 {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    /// A handle that is already initialised with `s3`.
    pub fn with_s3(s3: S3) -> Self {
        Self {
            cell: OnceCell::new_with(Some(s3)),
        }
    }

    /// The shared `S3`, loading the AWS configuration from the environment
    /// the first time it is asked for.
    pub async fn get(&self) -> &S3 {
        self.cell.get_or_init(S3::default).await
    }

    /// Install `s3` as the shared handle. Hands `s3` back if the handle was
    /// already initialised.
    pub fn inject(&self, s3: S3) -> Result<(), S3> {
        self.cell.set(s3).map_err(|err| match err {
            tokio::sync::SetError::AlreadyInitializedError(s3)
            | tokio::sync::SetError::InitializingError(s3) => s3,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl Default for LazyS3 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::local::LocalStore;

    #[tokio::test]
    async fn test_injected_handle_is_reused() {
        let root = tempfile::tempdir().unwrap();
        let handle = LazyS3::new();
        assert!(!handle.is_initialized());

        assert!(handle.inject(S3::with_store(LocalStore::new(root.path()))).is_ok());
        assert!(handle.is_initialized());

        let first = handle.get().await;
        let second = handle.get().await;
        assert!(std::ptr::eq(first, second));

        assert!(handle
            .inject(S3::with_store(LocalStore::new(root.path())))
            .is_err());
    }

    #[tokio::test]
    async fn test_with_s3_starts_initialised() {
        let root = tempfile::tempdir().unwrap();
        let handle = LazyS3::with_s3(S3::with_store(LocalStore::new(root.path())));
        assert!(handle.is_initialized());

        let entries = crate::list_all_objects(handle.get().await, &"missing".into())
            .await
            .unwrap();
        assert!(entries.is_empty());
    }
}

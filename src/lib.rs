//! Helpers for enumerating and emptying S3 buckets.
//!
//! The [`S3`] resource owns a handle to an object store and hands out
//! [`Bucket`]s, which can list every object page by page, delete a set of
//! listed entries concurrently, or clear themselves entirely.

mod resources;

pub use resources::bucket::{
    clear_bucket, delete_entries, list_all_objects, list_all_objects_into, Bucket,
    BulkDeleteError, ClearBucketError, DeleteError, ListParams,
};
pub use resources::local::LocalStore;
pub use resources::object::Entry;
pub use resources::s3::{LazyS3, S3};
pub use resources::store::{ListPage, ObjectStore, StoreError};

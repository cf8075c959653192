pub mod bucket;
pub mod local;
pub mod object;
pub mod s3;
pub mod store;

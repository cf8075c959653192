/// One object as reported by a listing call.
///
/// Only `key` drives any behaviour in this crate, the rest is carried along
/// for callers that want it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<aws_sdk_s3::types::DateTime>,
    pub e_tag: Option<String>,
}

impl Entry {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: 0,
            last_modified: None,
            e_tag: None,
        }
    }

    pub fn with_size(mut self, size: i64) -> Self {
        self.size = size;
        self
    }

    pub fn with_last_modified(mut self, last_modified: aws_sdk_s3::types::DateTime) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Zero-byte placeholder objects used to emulate folders. Their key ends
    /// with `/`.
    pub fn is_directory_marker(&self) -> bool {
        self.key.ends_with('/')
    }
}

impl From<&aws_sdk_s3::model::Object> for Entry {
    fn from(object: &aws_sdk_s3::model::Object) -> Self {
        Self {
            key: object.key().unwrap_or_default().to_owned(),
            size: object.size(),
            last_modified: object.last_modified().cloned(),
            e_tag: object.e_tag().map(str::to_owned),
        }
    }
}

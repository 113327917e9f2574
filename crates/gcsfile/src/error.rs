use std::io::ErrorKind;
use thiserror::Error;

/// Errors surfaced by gcsfile.
///
/// Failures of the storage client are carried through untouched in
/// [`CloudError::ObjectStore`]; the remaining variants are raised by the
/// adapter itself.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid object location: {0}")]
    InvalidPath(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Storage client is closed")]
    ClientClosed,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Upload stream failed earlier: {0}")]
    UploadFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[cfg(feature = "parquet")]
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[cfg(feature = "parquet")]
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

pub type Result<T> = std::result::Result<T, CloudError>;

impl CloudError {
    /// Whether the error reports a missing object or bucket.
    pub fn is_not_found(&self) -> bool {
        match self {
            CloudError::ObjectStore(object_store::Error::NotFound { .. }) => true,
            CloudError::BucketNotFound(_) => true,
            CloudError::Io(err) => err.kind() == ErrorKind::NotFound,
            _ => false,
        }
    }

    fn io_kind(&self) -> ErrorKind {
        match self {
            CloudError::ObjectStore(object_store::Error::NotFound { .. })
            | CloudError::BucketNotFound(_) => ErrorKind::NotFound,
            CloudError::InvalidPath(_) => ErrorKind::InvalidInput,
            CloudError::ClientClosed => ErrorKind::NotConnected,
            CloudError::DeadlineExceeded => ErrorKind::TimedOut,
            _ => ErrorKind::Other,
        }
    }
}

impl From<CloudError> for std::io::Error {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::Io(io_err) => io_err,
            other => std::io::Error::new(other.io_kind(), other),
        }
    }
}

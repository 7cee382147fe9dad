use std::io;

use learnhub_model::ModelError;
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup {0} not found")]
    NotFound(String),
    #[error("invalid backup filename: {0}")]
    InvalidFilename(String),
    #[error("malformed backup {filename}: {source}")]
    Malformed {
        filename: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("backup rejected: {0}")]
    Rejected(#[from] ModelError),
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

use std::io;

use learnhub_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("invalid model data: {0}")]
    Model(#[from] ModelError),
    #[error("connection poisoned")]
    Poisoned,
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

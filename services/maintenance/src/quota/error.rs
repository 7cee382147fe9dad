use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("AI request quota exhausted for account {account_id}: limit={limit}, used={used}")]
    LimitExceeded {
        account_id: String,
        limit: u32,
        used: u32,
    },
    #[error("account {0} not found")]
    AccountNotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),
}

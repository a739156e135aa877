use thiserror::Error;
use tokio::task::JoinError;

/// Errors related to storing and loading sources.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal storage error: {0}")]
    StorageError(String),
}

impl From<JoinError> for StoreError {
    fn from(value: JoinError) -> Self {
        StoreError::StorageError(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::StorageError(format!("unable to (de)serialize source: {}", value))
    }
}

impl From<redb::Error> for StoreError {
    fn from(value: redb::Error) -> Self {
        StoreError::StorageError(value.to_string())
    }
}

impl From<redb::DatabaseError> for StoreError {
    fn from(value: redb::DatabaseError) -> Self {
        StoreError::StorageError(value.to_string())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(value: redb::TableError) -> Self {
        StoreError::StorageError(value.to_string())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(value: redb::TransactionError) -> Self {
        StoreError::StorageError(value.to_string())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(value: redb::StorageError) -> Self {
        StoreError::StorageError(value.to_string())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(value: redb::CommitError) -> Self {
        StoreError::StorageError(value.to_string())
    }
}

//! Domain Errors
//!
//! Typed failures crossing the dispatch core boundary and its ports.

use thiserror::Error;

/// Selection is impossible for the current target set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no targets available")]
    NoTargetsAvailable,
}

/// A single outbound attempt failed. Absorbed by the retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("request timed out")]
    Timeout,
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
}

/// Failure of the external storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
    #[error("storage task failed: {0}")]
    Task(String),
}

/// Errors surfaced by the dispatch service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("destination has been marked invalid")]
    InvalidDestination,
    #[error("no targets available")]
    NoTargetsAvailable,
    #[error("max retries exceeded after {attempts} attempts")]
    RetriesExceeded { attempts: u32 },
    #[error("no message with provider id {0}")]
    UnknownMessage(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<SelectionError> for DispatchError {
    fn from(e: SelectionError) -> Self {
        match e {
            SelectionError::NoTargetsAvailable => DispatchError::NoTargetsAvailable,
        }
    }
}

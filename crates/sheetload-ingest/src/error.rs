//! Error types for spreadsheet ingestion
//!
//! Every variant maps onto one [`ErrorKind`]; the file ingestor and the
//! coordinator turn errors into failed outcomes instead of propagating them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Failure categories reported on an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Decode,
    EmptyInput,
    Schema,
    Unexpected,
}

#[derive(Error, Debug)]
pub enum IngestError {
    /// File or folder does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// Spreadsheet bytes could not be parsed
    #[error("Failed to read spreadsheet: {0}")]
    Decode(String),

    /// Header-only or blank worksheet
    #[error("Spreadsheet is empty, nothing to import")]
    EmptyInput,

    /// Incoming columns do not fit the existing table
    #[error("Schema mismatch on table '{table}': {detail}")]
    SchemaMismatch { table: String, detail: String },

    /// DDL or insert rejected by the store
    #[error("Failed to write to the database: {0}")]
    Store(#[from] StoreError),

    /// Anything not classified above, including worker panics
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::NotFound(_) => ErrorKind::NotFound,
            IngestError::Decode(_) => ErrorKind::Decode,
            IngestError::EmptyInput => ErrorKind::EmptyInput,
            IngestError::SchemaMismatch { .. } | IngestError::Store(_) => ErrorKind::Schema,
            IngestError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }
}

impl From<calamine::Error> for IngestError {
    fn from(err: calamine::Error) -> Self {
        match err {
            calamine::Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                IngestError::NotFound(io.to_string())
            },
            other => IngestError::Decode(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for IngestError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            IngestError::Unexpected(format!("worker panicked: {}", panic_message(err.into_panic())))
        } else {
            IngestError::Unexpected(format!("worker cancelled: {}", err))
        }
    }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

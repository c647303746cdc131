// File: src/error.rs
//! Error types for classification, training and the count store.

use thiserror::Error;

/// Failures of the count store. Any of these aborts the in-flight operation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Another writer panicked while holding the store lock.
    #[error("count store lock poisoned: {0}")]
    Poisoned(String),

    /// A transaction could not be applied.
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// Snapshot file could not be read or written.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file could not be encoded or decoded.
    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Errors surfaced by the classifier, tokenizer setup and batch tooling.
#[derive(Error, Debug)]
pub enum SniffError {
    /// Attribute id is not one of name, engine, os, type, device.
    #[error("unknown attribute id: {0}")]
    UnknownAttribute(String),

    /// A required input was empty or absent.
    #[error("missing required input: {0}")]
    MissingInput(&'static str),

    /// Phrase dictionary has an unexpected shape.
    #[error("invalid phrase dictionary: {0}")]
    Dictionary(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SniffError {
    /// True for failures of the count store, which abort a whole batch.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, SniffError::Store(_))
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, SniffError>;

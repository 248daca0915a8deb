//! # Store Errors
//!
//! Driver-level failures. The HTTP layer pattern-matches these shapes and
//! rewrites them into client-facing messages.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the document store and by model validation
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A value could not be cast to the type a path expects (e.g. a malformed id)
    #[error("Cast to {kind} failed for value \"{value}\" at path \"{path}\"")]
    Cast {
        path: String,
        value: String,
        kind: &'static str,
    },

    /// A write violated a unique index
    #[error("duplicate key error collection: {collection} index: {index} dup key: {value}")]
    DuplicateKey {
        collection: String,
        index: String,
        value: String,
    },

    /// Schema validation failed; one message per violated field
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// The backing engine failed
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A document could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lock guarding in-memory state was poisoned
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Build a cast error for a malformed document id
    pub fn invalid_id(value: impl Into<String>) -> Self {
        StoreError::Cast {
            path: "_id".to_string(),
            value: value.into(),
            kind: "ObjectId",
        }
    }

    /// Build a validation error holding a single message
    pub fn invalid(message: impl Into<String>) -> Self {
        StoreError::Validation(vec![message.into()])
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

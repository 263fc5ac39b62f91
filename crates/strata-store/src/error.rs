use strata_types::ObjectId;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The object exists but has a different kind than the caller expected.
    #[error("unexpected kind for {id}: expected {expected}, got {actual}")]
    KindMismatch {
        id: ObjectId,
        expected: &'static str,
        actual: &'static str,
    },

    /// Attempted to write an object that hashes to the null ID.
    #[error("cannot store object with null ID")]
    NullObjectId,

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

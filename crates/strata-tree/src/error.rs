//! Error types for the tree crate.

use strata_store::StoreError;

/// Errors that can occur while parsing, querying, or building trees.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// The named entry does not exist (or is tombstoned in a builder).
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// An entry name was empty or contained a path separator.
    #[error("invalid entry name: {0:?}")]
    InvalidName(String),

    /// A filemode value outside the recognized set.
    #[error("invalid filemode {0:#o}")]
    InvalidFileMode(u32),

    /// A serialized tree buffer could not be parsed. The tree is never
    /// partially populated: parsing fails atomically.
    #[error("corrupt tree object: {0}")]
    Corrupt(&'static str),

    /// A walk callback requested an abort.
    #[error("walk cancelled by callback")]
    Cancelled,

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias for tree results.
pub type TreeResult<T> = Result<T, TreeError>;

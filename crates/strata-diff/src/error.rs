//! Error types for the diff crate.

use strata_index::IndexError;
use strata_store::StoreError;
use strata_tree::TreeError;

/// Errors from diff construction, traversal, and patch generation.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A delta index was past the end of the diff list.
    #[error("delta index {index} out of range (list has {count})")]
    DeltaOutOfRange { index: usize, count: usize },

    /// A hunk index was past the end of a patch.
    #[error("hunk index {index} out of range (patch has {count})")]
    HunkOutOfRange { index: usize, count: usize },

    /// A line index was past the end of a hunk.
    #[error("line index {index} out of range (hunk has {count})")]
    LineOutOfRange { index: usize, count: usize },

    /// A callback requested an abort during a foreach walk.
    #[error("diff walk cancelled by callback")]
    Cancelled,

    /// Malformed diff options.
    #[error("invalid diff options: {0}")]
    InvalidOptions(&'static str),

    /// Tree operation failed.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// Index operation failed.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Filesystem access failed during working-directory iteration or
    /// content loading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;

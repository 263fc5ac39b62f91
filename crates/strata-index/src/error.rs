//! Error types for the index crate.

use strata_store::StoreError;
use strata_tree::TreeError;

/// Errors from staging-index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// A path was empty, absolute, or had empty components.
    #[error("invalid index path: {0:?}")]
    InvalidPath(String),

    /// The entry's filemode is not usable in a flat index.
    #[error("invalid filemode for index entry {0:?}")]
    InvalidMode(String),

    /// No entry exists at the given path.
    #[error("path not found in index: {0}")]
    PathNotFound(String),

    /// Tree construction or parsing failed.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;

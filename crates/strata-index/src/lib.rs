//! Flat staged index for the Strata snapshot store.
//!
//! The index holds one complete snapshot as a sorted list of
//! `(path, id, mode, size)` entries. Directories never appear explicitly;
//! they exist as shared path prefixes and materialize as tree objects only
//! when [`Index::write_tree`] recursively builds and stores them.
//!
//! # Key Types
//!
//! - [`Index`] -- Sorted path-keyed staging area with subtree caching
//! - [`IndexEntry`] -- One fully populated staged file
//! - [`IndexError`] -- Errors from staging and tree construction

pub mod entry;
pub mod error;
pub mod index;

pub use entry::{validate_index_path, IndexEntry};
pub use error::{IndexError, IndexResult};
pub use index::Index;

//! Tree model for the Strata snapshot store.
//!
//! A tree is an immutable, content-addressed, ordered list of named entries
//! (files, symlinks, subtrees, or submodule references). Entries are sorted
//! by the directory-aware comparator in [`path`]: a subtree sorts as if its
//! name carried a trailing `/`, which is why lookups need the two-phase
//! homing search instead of a plain binary search.
//!
//! # Key Types
//!
//! - [`Tree`] / [`TreeEntry`] / [`FileMode`] -- The parsed tree model
//! - [`TreeBuilder`] -- Mutable staging structure with tombstoned removal
//! - [`WalkOrder`] / [`WalkDecision`] -- Recursive traversal control

pub mod builder;
pub mod entry;
pub mod error;
pub mod path;
pub mod tree;

pub use builder::TreeBuilder;
pub use entry::{FileMode, TreeEntry};
pub use error::{TreeError, TreeResult};
pub use tree::{Tree, WalkDecision, WalkOrder};

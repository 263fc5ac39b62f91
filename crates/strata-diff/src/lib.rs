//! Snapshot comparison for the Strata store.
//!
//! This crate pairs any two ordered snapshots -- stored trees, the staged
//! index, or a live working directory -- and classifies their differences
//! into an ordered [`DiffList`] of [`Delta`] records. Per-delta detail is
//! generated lazily: a [`Patch`] walks a strictly forward state machine
//! (`Allocated -> Prepped -> Loaded -> Diffable -> Diffed`, with a terminal
//! binary short-circuit) and caches its hunks and lines once built.
//!
//! # Key Types
//!
//! - [`SnapshotIter`] -- Uniform cursor over the three snapshot kinds
//! - [`DiffList`] / [`Delta`] / [`DeltaStatus`] -- Classified differences
//! - [`Patch`] / [`Hunk`] / [`LineRef`] -- Lazily built hunk and line detail
//! - [`DiffOptions`] / [`Whitespace`] -- Classification and diff options
//! - [`format_compact`] / [`format_patch`] -- Textual rendering

pub mod error;
pub mod hunks;
pub mod iter;
pub mod list;
pub mod options;
pub mod patch;
pub mod print;

pub use error::{DiffError, DiffResult};
pub use hunks::{Hunk, LineOrigin};
pub use iter::{IndexIter, SnapshotEntry, SnapshotIter, SourceKind, TreeIter, WorkdirIter};
pub use list::{Delta, DeltaStatus, DiffList};
pub use options::{DiffOptions, Whitespace, DEFAULT_MAX_SIZE};
pub use patch::{LineRef, Patch, PatchState};
pub use print::{format_compact, format_patch};

// The callback conventions for traversals are shared with tree walks.
pub use strata_tree::WalkDecision;

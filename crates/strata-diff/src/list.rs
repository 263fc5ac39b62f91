//! Delta classification: pairing two snapshot iterators into an ordered
//! list of change records.
//!
//! The classifier is a two-pointer merge-walk. At each step the current
//! paths are compared: the lesser side yields a one-sided delta (Deleted or
//! Added) and advances alone; equal paths classify against each other and
//! both advance. Working-directory entries without ids are hashed on demand
//! only when needed to settle Modified against Unmodified.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_store::{object_id_for, ObjectKind, ObjectStore};
use strata_tree::{Tree, WalkDecision};
use strata_types::ObjectId;
use tracing::debug;

use crate::error::{DiffError, DiffResult};
use crate::hunks::Hunk;
use crate::iter::{IndexIter, SnapshotEntry, SnapshotIter, SourceKind, TreeIter, WorkdirIter};
use crate::options::DiffOptions;
use crate::patch::{LineRef, Patch};

/// How a path changed between the old and new snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeltaStatus {
    /// Present only in the new snapshot.
    Added,
    /// Present only in the old snapshot.
    Deleted,
    /// Present in both with different content or mode.
    Modified,
    /// The entry changed kind across the tree boundary.
    TypeChange,
    /// Identical on both sides.
    Unmodified,
}

impl DeltaStatus {
    /// One-letter status code used in compact listings.
    pub fn as_char(&self) -> char {
        match self {
            Self::Added => 'A',
            Self::Deleted => 'D',
            Self::Modified => 'M',
            Self::TypeChange => 'T',
            Self::Unmodified => ' ',
        }
    }
}

/// A classified difference between an old and new entry at one path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// The old side, absent for additions.
    pub old: Option<SnapshotEntry>,
    /// The new side, absent for deletions.
    pub new: Option<SnapshotEntry>,
    /// Classification of the change.
    pub status: DeltaStatus,
}

impl Delta {
    /// The path this delta affects.
    pub fn path(&self) -> &str {
        self.old
            .as_ref()
            .or(self.new.as_ref())
            .map(|e| e.path.as_str())
            .expect("delta always has at least one side")
    }
}

/// An ordered sequence of deltas plus the options that produced them.
///
/// Delta order matches the snapshot order produced by the merge-walk.
/// Lists are immutable after construction; [`DiffList::merge`] produces a
/// new list rather than mutating either input.
pub struct DiffList {
    deltas: Vec<Delta>,
    options: DiffOptions,
    old_src: SourceKind,
    new_src: SourceKind,
    workdir_root: Option<PathBuf>,
}

impl DiffList {
    /// Compare two stored trees.
    pub fn tree_to_tree(
        store: &dyn ObjectStore,
        old: &Tree,
        new: &Tree,
        options: DiffOptions,
    ) -> DiffResult<Self> {
        let old_iter = SnapshotIter::Tree(TreeIter::new(store, old)?);
        let new_iter = SnapshotIter::Tree(TreeIter::new(store, new)?);
        Self::from_iterators(old_iter, new_iter, options)
    }

    /// Compare a stored tree against the staged index.
    pub fn tree_to_index(
        store: &dyn ObjectStore,
        old: &Tree,
        index: &strata_index::Index,
        options: DiffOptions,
    ) -> DiffResult<Self> {
        let old_iter = SnapshotIter::Tree(TreeIter::new(store, old)?);
        let new_iter = SnapshotIter::Index(IndexIter::new(index));
        Self::from_iterators(old_iter, new_iter, options)
    }

    /// Compare a stored tree against a live directory.
    pub fn tree_to_workdir(
        store: &dyn ObjectStore,
        old: &Tree,
        root: &Path,
        options: DiffOptions,
    ) -> DiffResult<Self> {
        let old_iter = SnapshotIter::Tree(TreeIter::new(store, old)?);
        let new_iter = SnapshotIter::Workdir(WorkdirIter::new(root)?);
        Self::from_iterators(old_iter, new_iter, options)
    }

    /// Compare the staged index against a live directory.
    pub fn index_to_workdir(
        index: &strata_index::Index,
        root: &Path,
        options: DiffOptions,
    ) -> DiffResult<Self> {
        let old_iter = SnapshotIter::Index(IndexIter::new(index));
        let new_iter = SnapshotIter::Workdir(WorkdirIter::new(root)?);
        Self::from_iterators(old_iter, new_iter, options)
    }

    /// Run the merge-walk over two iterators of any kinds.
    pub fn from_iterators(
        mut old_iter: SnapshotIter<'_>,
        mut new_iter: SnapshotIter<'_>,
        options: DiffOptions,
    ) -> DiffResult<Self> {
        options.validate()?;

        let workdir_root = old_iter
            .workdir_root()
            .or(new_iter.workdir_root())
            .map(Path::to_path_buf);
        let (mut old_src, mut new_src) = (old_iter.kind(), new_iter.kind());
        if options.reverse {
            std::mem::swap(&mut old_src, &mut new_src);
        }

        let mut deltas = Vec::new();
        let workdir_for_hash = workdir_root.as_deref();

        loop {
            let o = old_iter.current().cloned();
            let n = new_iter.current().cloned();

            let order = match (&o, &n) {
                (None, None) => break,
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (Some(o), Some(n)) => o.path.as_bytes().cmp(n.path.as_bytes()),
            };

            match order {
                std::cmp::Ordering::Less => {
                    push_delta(&mut deltas, &options, o, None, DeltaStatus::Deleted);
                    old_iter.advance()?;
                }
                std::cmp::Ordering::Greater => {
                    let n = n.expect("new side present when it sorts first");
                    // A directory on the new side either contains entries
                    // the old side is already into (descend) or is wholly
                    // new (yield it as one Added delta, undescended).
                    if n.mode.is_tree() {
                        let old_is_inside =
                            o.as_ref().is_some_and(|o| o.path.starts_with(&n.path));
                        if old_is_inside {
                            new_iter.advance_into_dir()?;
                            continue;
                        }
                    }
                    push_delta(&mut deltas, &options, None, Some(n), DeltaStatus::Added);
                    new_iter.advance()?;
                }
                std::cmp::Ordering::Equal => {
                    let (o, n) = (o.expect("equal paths"), n.expect("equal paths"));
                    let (old, new, status) =
                        classify_pair(o, n, &old_iter, &new_iter, workdir_for_hash)?;
                    push_delta(&mut deltas, &options, old, new, status);
                    old_iter.advance()?;
                    new_iter.advance()?;
                }
            }
        }

        debug!(deltas = deltas.len(), "built diff list");
        Ok(Self {
            deltas,
            options,
            old_src,
            new_src,
            workdir_root,
        })
    }

    /// Number of deltas.
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Returns `true` if the list has no deltas.
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// The deltas in merge-walk order.
    pub fn deltas(&self) -> &[Delta] {
        &self.deltas
    }

    /// Delta at the given position.
    pub fn get(&self, index: usize) -> DiffResult<&Delta> {
        self.deltas.get(index).ok_or(DiffError::DeltaOutOfRange {
            index,
            count: self.deltas.len(),
        })
    }

    /// Number of deltas with the given status.
    pub fn num_deltas_of_type(&self, status: DeltaStatus) -> usize {
        self.deltas.iter().filter(|d| d.status == status).count()
    }

    /// The options this list was built with.
    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// Source kind of the old side.
    pub fn old_src(&self) -> SourceKind {
        self.old_src
    }

    /// Source kind of the new side.
    pub fn new_src(&self) -> SourceKind {
        self.new_src
    }

    /// Working-directory root, when either side came from one.
    pub fn workdir_root(&self) -> Option<&Path> {
        self.workdir_root.as_deref()
    }

    /// Generate the patch for one delta, running every stage.
    pub fn patch(self: &Arc<Self>, store: &dyn ObjectStore, index: usize) -> DiffResult<Patch> {
        Patch::generate(self, index, store)
    }

    /// Combine two diff lists into a new one whose delta set is the
    /// path-wise union.
    ///
    /// Two deltas on the same path coalesce into their net effect: the
    /// result keeps `self`'s old side and `other`'s new side and is
    /// reclassified from those endpoints, so a delete followed by an add
    /// nets to a modify. Every path from either input appears exactly once.
    pub fn merge(&self, other: &DiffList) -> DiffList {
        let mut deltas = Vec::with_capacity(self.deltas.len().max(other.deltas.len()));
        let (mut i, mut j) = (0, 0);

        while i < self.deltas.len() || j < other.deltas.len() {
            let a = self.deltas.get(i);
            let b = other.deltas.get(j);

            let delta = match (a, b) {
                (Some(a), Some(b)) if a.path() == b.path() => {
                    i += 1;
                    j += 1;
                    coalesce(a, b)
                }
                (Some(a), Some(b)) if a.path() < b.path() => {
                    i += 1;
                    a.clone()
                }
                (Some(_), Some(b)) => {
                    j += 1;
                    b.clone()
                }
                (Some(a), None) => {
                    i += 1;
                    a.clone()
                }
                (None, Some(b)) => {
                    j += 1;
                    b.clone()
                }
                (None, None) => unreachable!(),
            };
            deltas.push(delta);
        }

        DiffList {
            deltas,
            options: self.options.clone(),
            old_src: self.old_src,
            new_src: other.new_src,
            workdir_root: self
                .workdir_root
                .clone()
                .or_else(|| other.workdir_root.clone()),
        }
    }

    /// Walk every delta, generating hunks and lines on demand.
    ///
    /// `delta_cb` receives each delta with a progress fraction. The hunk
    /// and line callbacks run only for deltas that produce patches
    /// (Unmodified deltas never do). Returning
    /// [`WalkDecision::SkipEntry`] from any callback skips the remaining
    /// work for the current delta; [`WalkDecision::Abort`] stops the whole
    /// walk with [`DiffError::Cancelled`].
    pub fn foreach(
        self: &Arc<Self>,
        store: &dyn ObjectStore,
        delta_cb: &mut dyn FnMut(&Delta, f32) -> WalkDecision,
        mut hunk_cb: Option<&mut dyn FnMut(&Delta, &Hunk) -> WalkDecision>,
        mut line_cb: Option<&mut dyn FnMut(&Delta, &Hunk, &LineRef<'_>) -> WalkDecision>,
    ) -> DiffResult<()> {
        let total = self.deltas.len().max(1);

        for index in 0..self.deltas.len() {
            let delta = &self.deltas[index];
            match delta_cb(delta, index as f32 / total as f32) {
                WalkDecision::Abort => return Err(DiffError::Cancelled),
                WalkDecision::SkipEntry => continue,
                WalkDecision::Continue => {}
            }

            if hunk_cb.is_none() && line_cb.is_none() {
                continue;
            }
            if delta.status == DeltaStatus::Unmodified {
                continue;
            }

            let patch = Patch::generate(self, index, store)?;
            'delta: for h in 0..patch.num_hunks() {
                let hunk = patch.hunk(h)?;
                if let Some(cb) = hunk_cb.as_mut() {
                    match cb(delta, hunk) {
                        WalkDecision::Abort => return Err(DiffError::Cancelled),
                        WalkDecision::SkipEntry => break 'delta,
                        WalkDecision::Continue => {}
                    }
                }
                if let Some(cb) = line_cb.as_mut() {
                    for l in 0..patch.num_lines_in_hunk(h)? {
                        let line = patch.line_in_hunk(h, l)?;
                        match cb(delta, hunk, &line) {
                            WalkDecision::Abort => return Err(DiffError::Cancelled),
                            WalkDecision::SkipEntry => break 'delta,
                            WalkDecision::Continue => {}
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for DiffList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffList")
            .field("deltas", &self.deltas.len())
            .field("old_src", &self.old_src)
            .field("new_src", &self.new_src)
            .finish()
    }
}

// Classify an equal-path pair. Returns the (old, new, status) triple before
// any reverse swapping.
fn classify_pair(
    mut o: SnapshotEntry,
    mut n: SnapshotEntry,
    old_iter: &SnapshotIter<'_>,
    new_iter: &SnapshotIter<'_>,
    workdir_root: Option<&Path>,
) -> DiffResult<(Option<SnapshotEntry>, Option<SnapshotEntry>, DeltaStatus)> {
    if o.mode.is_tree() != n.mode.is_tree() {
        return Ok((Some(o), Some(n), DeltaStatus::TypeChange));
    }

    let same_mode = o.mode == n.mode;

    // Fill in missing ids by hashing working files, so Modified against
    // Unmodified can be settled.
    if o.id.is_none() && old_iter.kind() == SourceKind::Workdir {
        o.id = hash_workdir_entry(workdir_root, &o)?;
    }
    if n.id.is_none() && new_iter.kind() == SourceKind::Workdir {
        n.id = hash_workdir_entry(workdir_root, &n)?;
    }

    let status = match (o.id, n.id) {
        (Some(a), Some(b)) if a == b && same_mode => DeltaStatus::Unmodified,
        _ => DeltaStatus::Modified,
    };
    Ok((Some(o), Some(n), status))
}

// Hash a working file with the store's id rule so the result is comparable
// to stored blob ids. Submodules and directories stay unhashed.
fn hash_workdir_entry(
    root: Option<&Path>,
    entry: &SnapshotEntry,
) -> DiffResult<Option<ObjectId>> {
    let Some(root) = root else { return Ok(None) };
    if entry.mode.is_tree() || entry.mode.is_submodule() {
        return Ok(None);
    }

    let path = root.join(&entry.path);
    let content = if entry.mode == strata_tree::FileMode::Link {
        std::fs::read_link(&path)?
            .to_string_lossy()
            .into_owned()
            .into_bytes()
    } else {
        std::fs::read(&path)?
    };
    Ok(Some(object_id_for(ObjectKind::Blob, &content)))
}

fn push_delta(
    deltas: &mut Vec<Delta>,
    options: &DiffOptions,
    mut old: Option<SnapshotEntry>,
    mut new: Option<SnapshotEntry>,
    mut status: DeltaStatus,
) {
    if status == DeltaStatus::Unmodified && !options.include_unmodified {
        return;
    }

    // Directory paths keep their trailing separator only inside the walk.
    for side in [&mut old, &mut new] {
        if let Some(entry) = side {
            while entry.path.ends_with('/') {
                entry.path.pop();
            }
        }
    }

    if options.reverse {
        std::mem::swap(&mut old, &mut new);
        status = match status {
            DeltaStatus::Added => DeltaStatus::Deleted,
            DeltaStatus::Deleted => DeltaStatus::Added,
            other => other,
        };
    }

    deltas.push(Delta { old, new, status });
}

// Net-effect coalescing for merge: keep a's old side and b's new side, then
// reclassify from those endpoints.
fn coalesce(a: &Delta, b: &Delta) -> Delta {
    let old = a.old.clone();
    let new = b.new.clone();

    match (&old, &new) {
        (None, None) => Delta {
            // Added in one list, deleted in the other: nothing changed
            // between the outer endpoints. Keep the inner sides so the
            // path stays representable.
            old: b.old.clone(),
            new: a.new.clone(),
            status: DeltaStatus::Unmodified,
        },
        (None, Some(_)) => Delta {
            old,
            new,
            status: DeltaStatus::Added,
        },
        (Some(_), None) => Delta {
            old,
            new,
            status: DeltaStatus::Deleted,
        },
        (Some(o), Some(n)) => {
            let status = if o.mode.is_tree() != n.mode.is_tree() {
                DeltaStatus::TypeChange
            } else {
                match (o.id, n.id) {
                    (Some(a), Some(b)) if a == b && o.mode == n.mode => DeltaStatus::Unmodified,
                    _ => DeltaStatus::Modified,
                }
            };
            Delta { old, new, status }
        }
    }
}

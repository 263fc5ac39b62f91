//! The flat staging index and recursive tree construction.
//!
//! The index is a sorted map from full path to [`IndexEntry`], representing
//! one complete snapshot of staged state. [`Index::write_tree`] converts it
//! into nested tree objects by scanning the sorted entry list once,
//! recursing for each contiguous run of entries that share a directory
//! prefix. Previously computed subtree ids are cached per directory so an
//! unchanged subtree is neither rebuilt nor rescanned.

use std::collections::{BTreeMap, HashMap};

use strata_store::{ObjectKind, ObjectStore};
use strata_tree::{FileMode, Tree, TreeBuilder, WalkDecision, WalkOrder};
use strata_types::ObjectId;
use tracing::debug;

use crate::entry::IndexEntry;
use crate::error::{IndexError, IndexResult};

/// The staging index: a flat, sorted snapshot of `(path, id, mode, size)`
/// entries.
#[derive(Default)]
pub struct Index {
    entries: BTreeMap<String, IndexEntry>,
    // Subtree ids from earlier write_tree calls, keyed by directory path,
    // with the number of index entries each subtree consumed. Cleared on
    // every mutation.
    tree_cache: HashMap<String, (ObjectId, usize)>,
}

impl Index {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of staged entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an entry by path.
    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    /// All entries in path-sorted order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Stage an entry for content that is already in the store.
    pub fn stage(
        &mut self,
        path: &str,
        id: ObjectId,
        mode: FileMode,
        size: u64,
    ) -> IndexResult<()> {
        let entry = IndexEntry::new(path, id, mode, size)?;
        self.entries.insert(entry.path.clone(), entry);
        self.tree_cache.clear();
        Ok(())
    }

    /// Write content to the store as a blob and stage it.
    pub fn stage_content(
        &mut self,
        store: &dyn ObjectStore,
        path: &str,
        content: &[u8],
        mode: FileMode,
    ) -> IndexResult<()> {
        let id = store.write(ObjectKind::Blob, content)?;
        self.stage(path, id, mode, content.len() as u64)
    }

    /// Remove a staged entry, returning it.
    pub fn remove(&mut self, path: &str) -> IndexResult<IndexEntry> {
        self.tree_cache.clear();
        self.entries
            .remove(path)
            .ok_or_else(|| IndexError::PathNotFound(path.to_string()))
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.tree_cache.clear();
    }

    /// Build nested tree objects from the staged entries and return the
    /// root tree id.
    ///
    /// Unchanged subtrees hit the per-directory cache and skip both the
    /// rebuild and the rescan of their entries.
    pub fn write_tree(&mut self, store: &dyn ObjectStore) -> IndexResult<ObjectId> {
        let entries: Vec<&IndexEntry> = self.entries.values().collect();
        let cache = &mut self.tree_cache;
        let (root, consumed) = write_tree_at(store, &entries, "", 0, cache)?;
        debug_assert_eq!(consumed, entries.len());
        debug!(root = %root.short_hex(), entries = entries.len(), "wrote index tree");
        Ok(root)
    }

    /// Replace the index contents with the flattened entries of a tree.
    ///
    /// Blob sizes are recovered by reading each blob from the store, so the
    /// resulting entries are fully populated.
    pub fn read_tree(&mut self, store: &dyn ObjectStore, tree_id: &ObjectId) -> IndexResult<()> {
        let tree = Tree::load(store, tree_id)?;
        let mut entries = BTreeMap::new();
        let mut failure = None;

        let walked = tree.walk(store, WalkOrder::Pre, |prefix, entry| {
            if entry.is_tree() {
                return WalkDecision::Continue;
            }
            let path = format!("{prefix}{}", entry.name);
            let size = if entry.mode.is_submodule() {
                Ok(0)
            } else {
                store
                    .lookup(&entry.id, ObjectKind::Blob)
                    .map(|data| data.len() as u64)
            };
            match size {
                Ok(size) => {
                    entries.insert(
                        path.clone(),
                        IndexEntry {
                            path,
                            id: entry.id,
                            mode: entry.mode.normalized(),
                            size,
                        },
                    );
                    WalkDecision::Continue
                }
                Err(e) => {
                    failure = Some(e);
                    WalkDecision::Abort
                }
            }
        });
        if let Err(e) = walked {
            return Err(match failure.take() {
                Some(store_err) => IndexError::Store(store_err),
                None => IndexError::Tree(e),
            });
        }

        self.entries = entries;
        self.tree_cache.clear();
        self.tree_cache
            .insert(String::new(), (*tree_id, self.entries.len()));
        Ok(())
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("entries", &self.entries.len())
            .field("cached_subtrees", &self.tree_cache.len())
            .finish()
    }
}

/// Returns `true` if `path` lies inside the directory `prefix`.
///
/// The boundary byte after the prefix must be exactly `/`; a plain prefix
/// comparison would put `win32mmap.c` inside a `win32` directory.
fn in_dir(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    path.len() > prefix.len()
        && path.starts_with(prefix)
        && path.as_bytes()[prefix.len()] == b'/'
}

/// Build the tree for one directory prefix out of the sorted entry slice,
/// starting at `start`. Returns the subtree id and the offset of the first
/// entry past the subtree.
fn write_tree_at(
    store: &dyn ObjectStore,
    entries: &[&IndexEntry],
    prefix: &str,
    start: usize,
    cache: &mut HashMap<String, (ObjectId, usize)>,
) -> IndexResult<(ObjectId, usize)> {
    if let Some(&(id, count)) = cache.get(prefix) {
        // Entries under one directory are contiguous in sorted order, so a
        // hit can fast-forward the scan without re-walking them.
        return Ok((id, start + count));
    }

    let rel_start = if prefix.is_empty() { 0 } else { prefix.len() + 1 };
    let mut builder = TreeBuilder::new(None);
    let mut i = start;

    while i < entries.len() {
        let entry = entries[i];
        if !in_dir(&entry.path, prefix) {
            break;
        }

        let rel = &entry.path[rel_start..];
        match rel.find('/') {
            Some(slash) => {
                let subdir = &entry.path[..rel_start + slash];
                let leaf = &rel[..slash];
                let (sub_id, next) = write_tree_at(store, entries, subdir, i, cache)?;
                builder.insert(leaf, sub_id, FileMode::Tree)?;
                i = next;
            }
            None => {
                builder.insert(rel, entry.id, entry.mode)?;
                i += 1;
            }
        }
    }

    let id = builder.write(store)?;
    cache.insert(prefix.to_string(), (id, i - start));
    Ok((id, i))
}

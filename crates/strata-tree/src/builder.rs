//! Mutable staging structure for constructing trees.
//!
//! A builder holds entries plus a per-entry tombstone flag. Removal only
//! tombstones; nothing is physically dropped until [`TreeBuilder::write`],
//! which serializes the live entry set in sorted order and writes it through
//! the object store. Identical live entry sets always serialize to the same
//! bytes and therefore the same id.

use strata_store::{ObjectKind, ObjectStore};
use strata_types::ObjectId;
use tracing::debug;

use crate::entry::{validate_entry_name, FileMode, TreeEntry};
use crate::error::{TreeError, TreeResult};
use crate::path::compare;
use crate::tree::{key_search, serialize_entries, Tree};

struct Slot {
    entry: TreeEntry,
    removed: bool,
}

/// Mutable builder for tree objects.
pub struct TreeBuilder {
    // Kept sorted by the directory-aware comparator at all times so the
    // homing search works for upserts.
    slots: Vec<Slot>,
}

impl TreeBuilder {
    /// Create a builder, optionally seeded with the entries of an existing
    /// tree. The deprecated group-writable mode is normalized on the way in.
    pub fn new(source: Option<&Tree>) -> Self {
        let slots = source
            .map(|tree| {
                tree.entries()
                    .iter()
                    .map(|e| Slot {
                        entry: TreeEntry {
                            name: e.name.clone(),
                            mode: e.mode.normalized(),
                            id: e.id,
                        },
                        removed: false,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { slots }
    }

    /// Number of live (non-tombstoned) entries.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| !s.removed).count()
    }

    /// Returns `true` if no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or update an entry.
    ///
    /// Rejects invalid names. If an entry with the name already exists it is
    /// updated in place (clearing any tombstone); otherwise a new entry is
    /// allocated at its sorted position. The mode is normalized before
    /// storage.
    pub fn insert(&mut self, name: &str, id: ObjectId, mode: FileMode) -> TreeResult<&TreeEntry> {
        validate_entry_name(name)?;
        let mode = mode.normalized();

        if let Some(pos) = key_search(&self.slots, name, |s| &s.entry.name) {
            // A mode change across the tree boundary moves the entry's sort
            // position, so reinsert instead of updating in place.
            if self.slots[pos].entry.mode.is_tree() != mode.is_tree() {
                self.slots.remove(pos);
            } else {
                let slot = &mut self.slots[pos];
                slot.removed = false;
                slot.entry.id = id;
                slot.entry.mode = mode;
                return Ok(&self.slots[pos].entry);
            }
        }

        let pos = match self.slots.binary_search_by(|s| {
            compare(&s.entry.name, s.entry.is_tree(), name, mode.is_tree())
        }) {
            Ok(pos) => {
                let slot = &mut self.slots[pos];
                slot.removed = false;
                slot.entry.id = id;
                slot.entry.mode = mode;
                return Ok(&self.slots[pos].entry);
            }
            Err(pos) => pos,
        };
        self.slots.insert(
            pos,
            Slot {
                entry: TreeEntry {
                    name: name.to_string(),
                    mode,
                    id,
                },
                removed: false,
            },
        );
        Ok(&self.slots[pos].entry)
    }

    /// Look up a live entry by name. Tombstoned entries are invisible.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        key_search(&self.slots, name, |s| &s.entry.name)
            .map(|pos| &self.slots[pos])
            .filter(|slot| !slot.removed)
            .map(|slot| &slot.entry)
    }

    /// Tombstone an entry.
    ///
    /// Fails with [`TreeError::EntryNotFound`] if the entry is absent or
    /// already tombstoned. The entry is retained until [`write`].
    ///
    /// [`write`]: TreeBuilder::write
    pub fn remove(&mut self, name: &str) -> TreeResult<()> {
        let pos = key_search(&self.slots, name, |s| &s.entry.name)
            .filter(|&pos| !self.slots[pos].removed)
            .ok_or_else(|| TreeError::EntryNotFound(name.to_string()))?;
        self.slots[pos].removed = true;
        Ok(())
    }

    /// Tombstone every live entry the predicate selects.
    pub fn filter<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&TreeEntry) -> bool,
    {
        for slot in &mut self.slots {
            if !slot.removed && predicate(&slot.entry) {
                slot.removed = true;
            }
        }
    }

    /// Drop all entries, tombstoned or not.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Serialize the live entries in sorted order and write the tree object
    /// through the store, returning its content-addressed id.
    pub fn write(&self, store: &dyn ObjectStore) -> TreeResult<ObjectId> {
        let mut live: Vec<&TreeEntry> = self
            .slots
            .iter()
            .filter(|s| !s.removed)
            .map(|s| &s.entry)
            .collect();
        live.sort_by(|a, b| compare(&a.name, a.is_tree(), &b.name, b.is_tree()));

        let buf = serialize_entries(live.into_iter());
        let id = store.write(ObjectKind::Tree, &buf)?;
        debug!(id = %id.short_hex(), entries = self.len(), "wrote tree");
        Ok(id)
    }
}

impl std::fmt::Debug for TreeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeBuilder")
            .field("live", &self.len())
            .field("total", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cmp::Ordering;
    use strata_store::InMemoryObjectStore;

    fn oid(data: &[u8]) -> ObjectId {
        ObjectId::from_bytes(data)
    }

    #[test]
    fn insert_and_get() {
        let mut bld = TreeBuilder::new(None);
        bld.insert("file.txt", oid(b"f"), FileMode::Blob).unwrap();
        bld.insert("dir", oid(b"d"), FileMode::Tree).unwrap();

        assert_eq!(bld.len(), 2);
        assert_eq!(bld.get("file.txt").unwrap().mode, FileMode::Blob);
        assert_eq!(bld.get("dir").unwrap().mode, FileMode::Tree);
        assert!(bld.get("absent").is_none());
    }

    #[test]
    fn insert_rejects_invalid_name() {
        let mut bld = TreeBuilder::new(None);
        assert!(bld.insert("", oid(b"x"), FileMode::Blob).is_err());
        assert!(bld.insert("a/b", oid(b"x"), FileMode::Blob).is_err());
    }

    #[test]
    fn insert_normalizes_group_writable_mode() {
        let mut bld = TreeBuilder::new(None);
        bld.insert("old.txt", oid(b"x"), FileMode::BlobGroupWritable)
            .unwrap();
        assert_eq!(bld.get("old.txt").unwrap().mode, FileMode::Blob);
    }

    #[test]
    fn insert_upserts_existing_entry() {
        let mut bld = TreeBuilder::new(None);
        bld.insert("f", oid(b"one"), FileMode::Blob).unwrap();
        bld.insert("f", oid(b"two"), FileMode::BlobExecutable).unwrap();

        assert_eq!(bld.len(), 1);
        let e = bld.get("f").unwrap();
        assert_eq!(e.id, oid(b"two"));
        assert_eq!(e.mode, FileMode::BlobExecutable);
    }

    #[test]
    fn insert_clears_tombstone() {
        let mut bld = TreeBuilder::new(None);
        bld.insert("f", oid(b"one"), FileMode::Blob).unwrap();
        bld.remove("f").unwrap();
        assert!(bld.get("f").is_none());

        bld.insert("f", oid(b"two"), FileMode::Blob).unwrap();
        assert_eq!(bld.get("f").unwrap().id, oid(b"two"));
        assert_eq!(bld.len(), 1);
    }

    #[test]
    fn remove_missing_or_tombstoned_fails() {
        let mut bld = TreeBuilder::new(None);
        assert!(matches!(
            bld.remove("ghost").unwrap_err(),
            TreeError::EntryNotFound(_)
        ));

        bld.insert("f", oid(b"x"), FileMode::Blob).unwrap();
        bld.remove("f").unwrap();
        assert!(matches!(
            bld.remove("f").unwrap_err(),
            TreeError::EntryNotFound(_)
        ));
    }

    #[test]
    fn filter_tombstones_matching_entries() {
        let mut bld = TreeBuilder::new(None);
        bld.insert("keep.rs", oid(b"a"), FileMode::Blob).unwrap();
        bld.insert("drop.log", oid(b"b"), FileMode::Blob).unwrap();
        bld.insert("also.log", oid(b"c"), FileMode::Blob).unwrap();

        bld.filter(|e| e.name.ends_with(".log"));
        assert_eq!(bld.len(), 1);
        assert!(bld.get("keep.rs").is_some());
        assert!(bld.get("drop.log").is_none());
    }

    #[test]
    fn write_skips_tombstones() {
        let store = InMemoryObjectStore::new();
        let mut bld = TreeBuilder::new(None);
        bld.insert("kept", oid(b"k"), FileMode::Blob).unwrap();
        bld.insert("gone", oid(b"g"), FileMode::Blob).unwrap();
        bld.remove("gone").unwrap();

        let id = bld.write(&store).unwrap();
        let tree = Tree::load(&store, &id).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(&tree.entries()[0].name, "kept");
    }

    #[test]
    fn write_is_deterministic_over_insertion_order() {
        let store = InMemoryObjectStore::new();

        let mut a = TreeBuilder::new(None);
        a.insert("lib.c", oid(b"1"), FileMode::Blob).unwrap();
        a.insert("lib", oid(b"2"), FileMode::Tree).unwrap();
        a.insert("alpha", oid(b"3"), FileMode::Blob).unwrap();

        let mut b = TreeBuilder::new(None);
        b.insert("alpha", oid(b"3"), FileMode::Blob).unwrap();
        b.insert("lib", oid(b"2"), FileMode::Tree).unwrap();
        b.insert("lib.c", oid(b"1"), FileMode::Blob).unwrap();

        assert_eq!(a.write(&store).unwrap(), b.write(&store).unwrap());
    }

    #[test]
    fn unmutated_builder_roundtrips_tree_id() {
        let store = InMemoryObjectStore::new();
        let mut bld = TreeBuilder::new(None);
        bld.insert("x.txt", oid(b"x"), FileMode::Blob).unwrap();
        bld.insert("sub", oid(b"s"), FileMode::Tree).unwrap();
        let id = bld.write(&store).unwrap();

        let tree = Tree::load(&store, &id).unwrap();
        let rebuilt = TreeBuilder::new(Some(&tree));
        assert_eq!(rebuilt.write(&store).unwrap(), id);
    }

    #[test]
    fn written_entries_are_strictly_ordered() {
        let store = InMemoryObjectStore::new();
        let mut bld = TreeBuilder::new(None);
        for (name, mode) in [
            ("zz", FileMode::Blob),
            ("lib", FileMode::Tree),
            ("lib.c", FileMode::Blob),
            ("a", FileMode::Blob),
        ] {
            bld.insert(name, oid(name.as_bytes()), mode).unwrap();
        }
        let id = bld.write(&store).unwrap();
        let tree = Tree::load(&store, &id).unwrap();
        for pair in tree.entries().windows(2) {
            assert_eq!(
                compare(&pair[0].name, pair[0].is_tree(), &pair[1].name, pair[1].is_tree()),
                Ordering::Less
            );
        }
        // The directory sorts after the file sharing its prefix.
        let names: Vec<_> = tree.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "lib.c", "lib", "zz"]);
    }

    #[test]
    fn mode_class_change_resorts_entry() {
        let store = InMemoryObjectStore::new();
        let mut bld = TreeBuilder::new(None);
        bld.insert("lib", oid(b"blob"), FileMode::Blob).unwrap();
        bld.insert("lib.c", oid(b"c"), FileMode::Blob).unwrap();
        // Turn "lib" into a directory; it must move past "lib.c".
        bld.insert("lib", oid(b"tree"), FileMode::Tree).unwrap();

        let id = bld.write(&store).unwrap();
        let tree = Tree::load(&store, &id).unwrap();
        let names: Vec<_> = tree.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["lib.c", "lib"]);
        assert_eq!(bld.len(), 2);
    }

    #[test]
    fn clear_drops_everything() {
        let mut bld = TreeBuilder::new(None);
        bld.insert("a", oid(b"a"), FileMode::Blob).unwrap();
        bld.insert("b", oid(b"b"), FileMode::Blob).unwrap();
        bld.clear();
        assert!(bld.is_empty());
        assert!(bld.get("a").is_none());
    }

    proptest! {
        #[test]
        fn determinism_under_shuffled_insertion(
            names in prop::collection::btree_set("[a-z]{1,8}(\\.[a-z]{1,3})?", 1..20),
            seed in any::<u64>(),
        ) {
            let store = InMemoryObjectStore::new();
            let names: Vec<String> = names.into_iter().collect();

            let mut forward = TreeBuilder::new(None);
            for (i, name) in names.iter().enumerate() {
                let mode = if i % 3 == 0 { FileMode::Tree } else { FileMode::Blob };
                forward.insert(name, oid(name.as_bytes()), mode).unwrap();
            }

            // A cheap deterministic shuffle driven by the seed.
            let mut shuffled: Vec<(usize, &String)> = names.iter().enumerate().collect();
            shuffled.sort_by_key(|(i, _)| seed.wrapping_mul(*i as u64 + 1).rotate_left(17));

            let mut reordered = TreeBuilder::new(None);
            for (i, name) in shuffled {
                let mode = if i % 3 == 0 { FileMode::Tree } else { FileMode::Blob };
                reordered.insert(name, oid(name.as_bytes()), mode).unwrap();
            }

            prop_assert_eq!(forward.write(&store).unwrap(), reordered.write(&store).unwrap());
        }

        #[test]
        fn builder_from_tree_roundtrips_id(
            names in prop::collection::btree_set("[a-z]{1,8}", 1..15),
        ) {
            let store = InMemoryObjectStore::new();
            let mut bld = TreeBuilder::new(None);
            for (i, name) in names.iter().enumerate() {
                let mode = if i % 2 == 0 { FileMode::Blob } else { FileMode::Tree };
                bld.insert(name, oid(name.as_bytes()), mode).unwrap();
            }
            let id = bld.write(&store).unwrap();
            let tree = Tree::load(&store, &id).unwrap();
            prop_assert_eq!(TreeBuilder::new(Some(&tree)).write(&store).unwrap(), id);
        }
    }
}

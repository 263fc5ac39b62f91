//! The immutable tree object: parsing, lookup, and traversal.
//!
//! A serialized tree is a concatenation of `{octal mode} {name}\0{raw id}`
//! records in sorted order. Parsing is atomic: a malformed buffer never
//! yields a partially populated tree.

use std::cmp::Ordering;

use strata_store::{ObjectKind, ObjectStore};
use strata_types::{ObjectId, OBJECT_ID_RAW_LEN};
use tracing::debug;

use crate::entry::{validate_entry_name, FileMode, TreeEntry};
use crate::error::{TreeError, TreeResult};
use crate::path::{compare, prefix_compare};

/// An immutable, content-addressed, ordered list of named entries.
#[derive(Clone, Debug)]
pub struct Tree {
    id: ObjectId,
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Read and parse the tree with the given id from the store.
    pub fn load(store: &dyn ObjectStore, id: &ObjectId) -> TreeResult<Self> {
        let data = store.lookup(id, ObjectKind::Tree)?;
        Self::from_buffer(*id, &data)
    }

    /// Parse a serialized tree buffer.
    ///
    /// The buffer must contain `{octal mode} {name}\0{raw id}` records in
    /// sorted order with unique names. Any malformed record fails the whole
    /// parse; no partially populated tree is ever returned.
    pub fn from_buffer(id: ObjectId, data: &[u8]) -> TreeResult<Self> {
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            let sp = data[pos..]
                .iter()
                .position(|&b| b == b' ')
                .ok_or(TreeError::Corrupt("missing filemode terminator"))?;
            if sp == 0 {
                return Err(TreeError::Corrupt("empty filemode"));
            }
            let mode_str = std::str::from_utf8(&data[pos..pos + sp])
                .map_err(|_| TreeError::Corrupt("filemode is not octal"))?;
            let bits = u32::from_str_radix(mode_str, 8)
                .map_err(|_| TreeError::Corrupt("filemode is not octal"))?;
            let mode = FileMode::from_mode_bits(bits)?;
            pos += sp + 1;

            let nul = data[pos..]
                .iter()
                .position(|&b| b == 0)
                .ok_or(TreeError::Corrupt("missing name terminator"))?;
            let name = std::str::from_utf8(&data[pos..pos + nul])
                .map_err(|_| TreeError::Corrupt("entry name is not valid utf-8"))?
                .to_string();
            validate_entry_name(&name)?;
            pos += nul + 1;

            if data.len() - pos < OBJECT_ID_RAW_LEN {
                return Err(TreeError::Corrupt("truncated object id"));
            }
            let entry_id = ObjectId::from_raw(&data[pos..pos + OBJECT_ID_RAW_LEN])
                .map_err(|_| TreeError::Corrupt("truncated object id"))?;
            pos += OBJECT_ID_RAW_LEN;

            entries.push(TreeEntry {
                name,
                mode,
                id: entry_id,
            });
        }

        for pair in entries.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if compare(&a.name, a.is_tree(), &b.name, b.is_tree()) != Ordering::Less {
                return Err(TreeError::Corrupt("entries out of order or duplicated"));
            }
        }

        debug!(id = %id.short_hex(), entries = entries.len(), "parsed tree");
        Ok(Self { id, entries })
    }

    /// The tree's content-addressed id.
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries in sorted order.
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// Entry at a position in sort order, if in range.
    pub fn entry_by_index(&self, index: usize) -> Option<&TreeEntry> {
        self.entries.get(index)
    }

    /// Look up an entry by exact name.
    ///
    /// Uses the two-phase homing search; fails with
    /// [`TreeError::EntryNotFound`] if no entry has that name.
    pub fn by_name(&self, name: &str) -> TreeResult<&TreeEntry> {
        key_search(&self.entries, name, |e| &e.name)
            .map(|idx| &self.entries[idx])
            .ok_or_else(|| TreeError::EntryNotFound(name.to_string()))
    }

    /// First entry whose id matches, in sort order.
    pub fn entry_by_id(&self, id: &ObjectId) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.id == *id)
    }

    /// Position of the first entry that sorts at or after the given prefix.
    ///
    /// Used to locate where a subtree's children begin. Returns `len()` when
    /// every entry sorts before the prefix.
    pub fn prefix_position(&self, prefix: &str) -> usize {
        let entries = &self.entries;
        let mut pos = match entries.binary_search_by(|e| prefix_compare(&e.name, prefix)) {
            Ok(p) | Err(p) => p,
        };

        while pos < entries.len() {
            if prefix_compare(prefix, &entries[pos].name) == Ordering::Less {
                break;
            }
            pos += 1;
        }
        while pos > 0 {
            if prefix_compare(prefix, &entries[pos - 1].name) == Ordering::Greater {
                break;
            }
            pos -= 1;
        }
        pos
    }

    /// Resolve a slash-separated path to an entry, descending through
    /// subtrees via the store.
    pub fn entry_by_path(&self, store: &dyn ObjectStore, path: &str) -> TreeResult<TreeEntry> {
        let comp_len = path.find('/').unwrap_or(path.len());
        if comp_len == 0 {
            return Err(TreeError::EntryNotFound(path.to_string()));
        }

        let entry = self
            .by_name(&path[..comp_len])
            .map_err(|_| TreeError::EntryNotFound(path.to_string()))?;

        let rest = &path[comp_len..];
        if rest.is_empty() {
            return Ok(entry.clone());
        }

        // More components follow, so this entry must be a subtree.
        if !entry.is_tree() {
            return Err(TreeError::EntryNotFound(path.to_string()));
        }
        let rest = &rest[1..];
        if rest.is_empty() {
            return Ok(entry.clone());
        }

        let subtree = Tree::load(store, &entry.id)?;
        subtree.entry_by_path(store, rest)
    }

    /// Recursively walk the tree, calling `callback(dir_prefix, entry)` for
    /// every entry.
    ///
    /// In pre-order, [`WalkDecision::SkipEntry`] skips descending into the
    /// current subtree; in post-order it is equivalent to
    /// [`WalkDecision::Continue`]. [`WalkDecision::Abort`] stops the walk
    /// with [`TreeError::Cancelled`].
    pub fn walk<F>(&self, store: &dyn ObjectStore, order: WalkOrder, mut callback: F) -> TreeResult<()>
    where
        F: FnMut(&str, &TreeEntry) -> WalkDecision,
    {
        let mut prefix = String::new();
        self.walk_inner(store, order, &mut prefix, &mut callback)
    }

    fn walk_inner(
        &self,
        store: &dyn ObjectStore,
        order: WalkOrder,
        prefix: &mut String,
        callback: &mut dyn FnMut(&str, &TreeEntry) -> WalkDecision,
    ) -> TreeResult<()> {
        for entry in &self.entries {
            if order == WalkOrder::Pre {
                match callback(prefix, entry) {
                    WalkDecision::Abort => return Err(TreeError::Cancelled),
                    WalkDecision::SkipEntry => continue,
                    WalkDecision::Continue => {}
                }
            }

            if entry.is_tree() {
                let subtree = Tree::load(store, &entry.id)?;
                let saved = prefix.len();
                prefix.push_str(&entry.name);
                prefix.push('/');
                subtree.walk_inner(store, order, prefix, callback)?;
                prefix.truncate(saved);
            }

            if order == WalkOrder::Post {
                if callback(prefix, entry) == WalkDecision::Abort {
                    return Err(TreeError::Cancelled);
                }
            }
        }
        Ok(())
    }
}

/// Traversal order for [`Tree::walk`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkOrder {
    /// Parents before children.
    Pre,
    /// Children before parents.
    Post,
}

/// What a traversal callback wants done next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkDecision {
    /// Keep going.
    Continue,
    /// Skip remaining work for the current entry (in pre-order tree walks,
    /// do not descend into the current subtree).
    SkipEntry,
    /// Abort the whole operation; surfaces as a cancellation error.
    Abort,
}

/// Two-phase search for an exact name in a sorted entry slice.
///
/// Entries are not sorted alphabetically: a subtree with the same root
/// prefix as a file sorts to a different position (it compares as if its
/// name carried a trailing `/`). A plain binary search cannot find a name
/// without knowing whether it belongs to a subtree, so we first home in with
/// the minimum-length prefix comparison, then scan linearly in both
/// directions while the prefix comparison stays ambiguous.
pub(crate) fn key_search<T, F>(entries: &[T], name: &str, name_of: F) -> Option<usize>
where
    F: Fn(&T) -> &str,
{
    let homing = match entries.binary_search_by(|e| prefix_compare(name_of(e), name)) {
        Ok(pos) => pos,
        Err(_) => return None,
    };

    // Forward while entries still share the prefix.
    for (i, entry) in entries.iter().enumerate().skip(homing) {
        let candidate = name_of(entry);
        if prefix_compare(name, candidate) == Ordering::Less {
            break;
        }
        if candidate == name {
            return Some(i);
        }
    }

    // Not ahead of the homing point; look behind it.
    for i in (0..homing).rev() {
        let candidate = name_of(&entries[i]);
        if prefix_compare(name, candidate) == Ordering::Greater {
            break;
        }
        if candidate == name {
            return Some(i);
        }
    }

    None
}

/// Serialize live entries, already sorted, into the tree wire format.
pub(crate) fn serialize_entries<'a>(entries: impl Iterator<Item = &'a TreeEntry>) -> Vec<u8> {
    let mut buf = Vec::new();
    for entry in entries {
        buf.extend_from_slice(format!("{:o} ", entry.mode.mode_bits()).as_bytes());
        buf.extend_from_slice(entry.name.as_bytes());
        buf.push(0);
        buf.extend_from_slice(entry.id.as_bytes());
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_store::InMemoryObjectStore;

    fn blob_id(data: &[u8]) -> ObjectId {
        ObjectId::from_bytes(data)
    }

    fn entry(name: &str, mode: FileMode) -> TreeEntry {
        TreeEntry::new(name, mode, blob_id(name.as_bytes())).unwrap()
    }

    fn tree_from(mut entries: Vec<TreeEntry>) -> Tree {
        entries.sort_by(|a, b| compare(&a.name, a.is_tree(), &b.name, b.is_tree()));
        let buf = serialize_entries(entries.iter());
        Tree::from_buffer(ObjectId::from_bytes(&buf), &buf).unwrap()
    }

    #[test]
    fn parse_roundtrip_preserves_entries() {
        let tree = tree_from(vec![
            entry("README", FileMode::Blob),
            entry("src", FileMode::Tree),
            entry("run.sh", FileMode::BlobExecutable),
        ]);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.by_name("README").unwrap().mode, FileMode::Blob);
        assert_eq!(tree.by_name("src").unwrap().mode, FileMode::Tree);
    }

    #[test]
    fn parse_rejects_bad_filemode() {
        let buf = b"999999 name\0";
        let mut data = buf.to_vec();
        data.extend_from_slice(&[0u8; 32]);
        let err = Tree::from_buffer(ObjectId::null(), &data).unwrap_err();
        assert!(matches!(err, TreeError::InvalidFileMode(_)));
    }

    #[test]
    fn parse_rejects_missing_name_terminator() {
        let data = b"100644 name-without-nul".to_vec();
        let err = Tree::from_buffer(ObjectId::null(), &data).unwrap_err();
        assert!(matches!(err, TreeError::Corrupt(_)));
    }

    #[test]
    fn parse_rejects_truncated_id() {
        let mut data = b"100644 file\0".to_vec();
        data.extend_from_slice(&[0u8; 10]);
        let err = Tree::from_buffer(ObjectId::null(), &data).unwrap_err();
        assert!(matches!(err, TreeError::Corrupt("truncated object id")));
    }

    #[test]
    fn parse_rejects_unsorted_entries() {
        let b = serialize_entries(
            [entry("zeta", FileMode::Blob), entry("alpha", FileMode::Blob)]
                .iter(),
        );
        let err = Tree::from_buffer(ObjectId::null(), &b).unwrap_err();
        assert!(matches!(err, TreeError::Corrupt(_)));
    }

    #[test]
    fn parse_rejects_non_octal_mode() {
        let data = b"10x644 file\0".to_vec();
        let err = Tree::from_buffer(ObjectId::null(), &data).unwrap_err();
        assert!(matches!(err, TreeError::Corrupt(_)));
    }

    #[test]
    fn by_name_distinguishes_file_from_directory_prefix() {
        // "lib" (dir) sorts after "lib.c" (file); both share the prefix.
        let tree = tree_from(vec![
            entry("lib.c", FileMode::Blob),
            entry("lib", FileMode::Tree),
            entry("libx", FileMode::Blob),
        ]);
        assert_eq!(tree.by_name("lib").unwrap().mode, FileMode::Tree);
        assert_eq!(tree.by_name("lib.c").unwrap().mode, FileMode::Blob);
        assert_eq!(tree.by_name("libx").unwrap().mode, FileMode::Blob);
    }

    #[test]
    fn by_name_missing_is_not_found() {
        let tree = tree_from(vec![entry("only", FileMode::Blob)]);
        let err = tree.by_name("__missing__").unwrap_err();
        assert!(matches!(err, TreeError::EntryNotFound(_)));
    }

    #[test]
    fn every_entry_is_found_by_name() {
        let names = ["a", "a.c", "ab", "b", "sub", "sub.c", "z"];
        let tree = tree_from(
            names
                .iter()
                .enumerate()
                .map(|(i, n)| {
                    entry(n, if i % 2 == 0 { FileMode::Blob } else { FileMode::Tree })
                })
                .collect(),
        );
        for e in tree.entries() {
            assert_eq!(tree.by_name(&e.name).unwrap(), e);
        }
    }

    #[test]
    fn adjacent_entries_are_strictly_ordered() {
        let tree = tree_from(vec![
            entry("lib.c", FileMode::Blob),
            entry("lib", FileMode::Tree),
            entry("alpha", FileMode::Blob),
            entry("zz", FileMode::Tree),
        ]);
        for pair in tree.entries().windows(2) {
            assert_eq!(
                compare(&pair[0].name, pair[0].is_tree(), &pair[1].name, pair[1].is_tree()),
                Ordering::Less
            );
        }
    }

    #[test]
    fn prefix_position_finds_first_matching_entry() {
        let tree = tree_from(vec![
            entry("abc", FileMode::Blob),
            entry("sub", FileMode::Tree),
            entry("sub.c", FileMode::Blob),
            entry("zz", FileMode::Blob),
        ]);
        let pos = tree.prefix_position("sub");
        assert_eq!(&tree.entries()[pos].name, "sub.c");
        assert_eq!(tree.prefix_position("zzz"), tree.len());
        assert_eq!(tree.prefix_position("a"), 0);
    }

    #[test]
    fn entry_by_id_returns_first_match() {
        let shared = blob_id(b"shared");
        let tree = tree_from(vec![
            TreeEntry::new("one", FileMode::Blob, shared).unwrap(),
            TreeEntry::new("two", FileMode::Blob, shared).unwrap(),
        ]);
        assert_eq!(&tree.entry_by_id(&shared).unwrap().name, "one");
        assert!(tree.entry_by_id(&blob_id(b"absent")).is_none());
    }

    fn store_with_nested_tree() -> (InMemoryObjectStore, ObjectId) {
        let store = InMemoryObjectStore::new();
        let inner = serialize_entries([entry("deep.txt", FileMode::Blob)].iter());
        let inner_id = store.write(ObjectKind::Tree, &inner).unwrap();

        let mut mid_entries = vec![
            TreeEntry::new("inner", FileMode::Tree, inner_id).unwrap(),
            entry("mid.txt", FileMode::Blob),
        ];
        mid_entries.sort_by(|a, b| compare(&a.name, a.is_tree(), &b.name, b.is_tree()));
        let mid = serialize_entries(mid_entries.iter());
        let mid_id = store.write(ObjectKind::Tree, &mid).unwrap();

        let mut root_entries = vec![
            TreeEntry::new("sub", FileMode::Tree, mid_id).unwrap(),
            entry("top.txt", FileMode::Blob),
        ];
        root_entries.sort_by(|a, b| compare(&a.name, a.is_tree(), &b.name, b.is_tree()));
        let root = serialize_entries(root_entries.iter());
        let root_id = store.write(ObjectKind::Tree, &root).unwrap();
        (store, root_id)
    }

    #[test]
    fn entry_by_path_descends_subtrees() {
        let (store, root_id) = store_with_nested_tree();
        let root = Tree::load(&store, &root_id).unwrap();

        assert_eq!(root.entry_by_path(&store, "top.txt").unwrap().name, "top.txt");
        assert_eq!(root.entry_by_path(&store, "sub").unwrap().mode, FileMode::Tree);
        assert_eq!(root.entry_by_path(&store, "sub/").unwrap().mode, FileMode::Tree);
        assert_eq!(
            root.entry_by_path(&store, "sub/inner/deep.txt").unwrap().name,
            "deep.txt"
        );
        assert!(matches!(
            root.entry_by_path(&store, "sub/missing").unwrap_err(),
            TreeError::EntryNotFound(_)
        ));
        // A path through a blob cannot resolve.
        assert!(root.entry_by_path(&store, "top.txt/x").is_err());
    }

    #[test]
    fn walk_preorder_visits_everything() {
        let (store, root_id) = store_with_nested_tree();
        let root = Tree::load(&store, &root_id).unwrap();

        let mut seen = Vec::new();
        root.walk(&store, WalkOrder::Pre, |prefix, e| {
            seen.push(format!("{prefix}{}", e.name));
            WalkDecision::Continue
        })
        .unwrap();
        assert_eq!(
            seen,
            vec!["sub", "sub/inner", "sub/inner/deep.txt", "sub/mid.txt", "top.txt"]
        );
    }

    #[test]
    fn walk_skip_entry_prunes_subtree() {
        let (store, root_id) = store_with_nested_tree();
        let root = Tree::load(&store, &root_id).unwrap();

        let mut seen = Vec::new();
        root.walk(&store, WalkOrder::Pre, |prefix, e| {
            seen.push(format!("{prefix}{}", e.name));
            if e.name == "inner" {
                WalkDecision::SkipEntry
            } else {
                WalkDecision::Continue
            }
        })
        .unwrap();
        assert_eq!(seen, vec!["sub", "sub/inner", "sub/mid.txt", "top.txt"]);
    }

    #[test]
    fn walk_abort_is_cancelled() {
        let (store, root_id) = store_with_nested_tree();
        let root = Tree::load(&store, &root_id).unwrap();

        let err = root
            .walk(&store, WalkOrder::Pre, |_, _| WalkDecision::Abort)
            .unwrap_err();
        assert!(matches!(err, TreeError::Cancelled));
    }

    #[test]
    fn walk_postorder_visits_children_first() {
        let (store, root_id) = store_with_nested_tree();
        let root = Tree::load(&store, &root_id).unwrap();

        let mut seen = Vec::new();
        root.walk(&store, WalkOrder::Post, |prefix, e| {
            seen.push(format!("{prefix}{}", e.name));
            WalkDecision::Continue
        })
        .unwrap();
        assert_eq!(
            seen,
            vec!["sub/inner/deep.txt", "sub/inner", "sub/mid.txt", "sub", "top.txt"]
        );
    }
}

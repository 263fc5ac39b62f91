//! Snapshot iterators: a uniform cursor over trees, the staged index, and
//! the working directory.
//!
//! All three sources yield entries in the same total order, which lets two
//! iterators of different kinds be walked in lock-step by the delta
//! classifier. Tree iterators descend into subtrees automatically and yield
//! only leaf entries; working-directory iterators yield directories as-is
//! (path with a trailing `/`) and descend only on explicit request, so a
//! caller can notice a newly appeared directory without forced recursion.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_tree::{path::join, FileMode, Tree, TreeEntry};
use strata_types::ObjectId;
use walkdir::WalkDir;

use crate::error::DiffResult;

/// Which kind of snapshot an iterator (or diff side) was built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// A stored, content-addressed tree object.
    Tree,
    /// The flat staged index.
    Index,
    /// The live working directory.
    Workdir,
}

/// One entry yielded by a snapshot iterator.
///
/// Completeness depends on the source: tree entries carry mode, id, and
/// path; index entries carry everything; working-directory entries carry
/// mode and path but never an id (hashing happens on demand elsewhere).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Full snapshot-relative path. Working-directory subdirectories carry
    /// a trailing `/` so byte ordering agrees with the tree entry order.
    pub path: String,
    /// File mode.
    pub mode: FileMode,
    /// Content id, when the source knows it.
    pub id: Option<ObjectId>,
    /// Content size in bytes, when the source knows it.
    pub size: Option<u64>,
}

/// Polymorphic cursor over exactly three source kinds.
pub enum SnapshotIter<'a> {
    /// Cursor over a stored tree, descending into subtrees.
    Tree(TreeIter<'a>),
    /// Cursor over the staged index.
    Index(IndexIter<'a>),
    /// Cursor over a live directory.
    Workdir(WorkdirIter),
}

impl<'a> SnapshotIter<'a> {
    /// The entry at the cursor, if any. Invalidated by the next advance.
    pub fn current(&self) -> Option<&SnapshotEntry> {
        match self {
            Self::Tree(it) => it.current(),
            Self::Index(it) => it.current(),
            Self::Workdir(it) => it.current(),
        }
    }

    /// True once the cursor has exhausted the source.
    pub fn at_end(&self) -> bool {
        self.current().is_none()
    }

    /// Move to the next entry in sort order and return it.
    pub fn advance(&mut self) -> DiffResult<Option<&SnapshotEntry>> {
        match self {
            Self::Tree(it) => it.advance(),
            Self::Index(it) => Ok(it.advance()),
            Self::Workdir(it) => it.advance(),
        }
    }

    /// Rewind to the first entry.
    pub fn reset(&mut self) -> DiffResult<()> {
        match self {
            Self::Tree(it) => it.reset(),
            Self::Index(it) => {
                it.reset();
                Ok(())
            }
            Self::Workdir(it) => {
                it.reset();
                Ok(())
            }
        }
    }

    /// Descend into the most recently yielded directory.
    ///
    /// Only the working-directory iterator has unexpanded directories; if
    /// the directory turns out empty this degenerates into an ordinary
    /// advance past it. For other sources (and non-directory entries) the
    /// cursor is left where it is.
    pub fn advance_into_dir(&mut self) -> DiffResult<Option<&SnapshotEntry>> {
        match self {
            Self::Workdir(it) => it.advance_into_dir(),
            _ => Ok(self.current()),
        }
    }

    /// The kind of source backing this iterator.
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Tree(_) => SourceKind::Tree,
            Self::Index(_) => SourceKind::Index,
            Self::Workdir(_) => SourceKind::Workdir,
        }
    }

    /// Root directory, for working-directory iterators.
    pub fn workdir_root(&self) -> Option<&Path> {
        match self {
            Self::Workdir(it) => Some(&it.root),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------
// Tree iterator
// ---------------------------------------------------------------------

struct TreeFrame {
    prefix: String,
    tree: Tree,
    index: usize,
}

/// Cursor over a stored tree.
///
/// Keeps a frame stack of the trees between the root and the cursor;
/// subtrees are loaded from the store and entered as they are reached, so
/// only leaf entries (blobs, links, submodule references) are yielded.
pub struct TreeIter<'a> {
    store: &'a dyn strata_store::ObjectStore,
    stack: Vec<TreeFrame>,
    entry: Option<SnapshotEntry>,
}

impl<'a> TreeIter<'a> {
    /// Position a new cursor on the first leaf entry of `tree`.
    pub fn new(store: &'a dyn strata_store::ObjectStore, tree: &Tree) -> DiffResult<Self> {
        let mut iter = Self {
            store,
            stack: vec![TreeFrame {
                prefix: String::new(),
                tree: tree.clone(),
                index: 0,
            }],
            entry: None,
        };
        iter.settle()?;
        Ok(iter)
    }

    /// The entry at the cursor.
    pub fn current(&self) -> Option<&SnapshotEntry> {
        self.entry.as_ref()
    }

    /// Advance to the next leaf entry.
    pub fn advance(&mut self) -> DiffResult<Option<&SnapshotEntry>> {
        if self.entry.is_some() {
            if let Some(top) = self.stack.last_mut() {
                top.index += 1;
            }
            self.settle()?;
        }
        Ok(self.entry.as_ref())
    }

    /// Rewind to the first entry.
    pub fn reset(&mut self) -> DiffResult<()> {
        self.stack.truncate(1);
        self.stack[0].index = 0;
        self.settle()
    }

    // Walk forward until the cursor rests on a leaf entry: exhausted frames
    // pop (advancing the parent past the finished subtree), subtree entries
    // push a new frame.
    fn settle(&mut self) -> DiffResult<()> {
        loop {
            enum Step {
                Pop,
                Push(TreeEntry, String),
                Yield(SnapshotEntry),
                End,
            }

            let step = {
                let frame = self.stack.last().expect("root frame always present");
                match frame.tree.entry_by_index(frame.index) {
                    None if self.stack.len() == 1 => Step::End,
                    None => Step::Pop,
                    Some(e) if e.is_tree() => Step::Push(e.clone(), frame.prefix.clone()),
                    Some(e) => Step::Yield(SnapshotEntry {
                        path: join(&frame.prefix, &e.name),
                        mode: e.mode,
                        id: Some(e.id),
                        size: None,
                    }),
                }
            };

            match step {
                Step::End => {
                    self.entry = None;
                    return Ok(());
                }
                Step::Pop => {
                    self.stack.pop();
                    if let Some(parent) = self.stack.last_mut() {
                        parent.index += 1;
                    }
                }
                Step::Push(e, prefix) => {
                    let subtree = Tree::load(self.store, &e.id)?;
                    let mut sub_prefix = join(&prefix, &e.name);
                    sub_prefix.push('/');
                    self.stack.push(TreeFrame {
                        prefix: sub_prefix,
                        tree: subtree,
                        index: 0,
                    });
                }
                Step::Yield(entry) => {
                    self.entry = Some(entry);
                    return Ok(());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------
// Index iterator
// ---------------------------------------------------------------------

/// Cursor over the staged index.
///
/// Index entries are fully populated and already path-sorted, so this is a
/// plain positional cursor.
pub struct IndexIter<'a> {
    entries: Vec<&'a strata_index::IndexEntry>,
    pos: usize,
    entry: Option<SnapshotEntry>,
}

impl<'a> IndexIter<'a> {
    /// Position a new cursor on the first staged entry.
    pub fn new(index: &'a strata_index::Index) -> Self {
        let mut iter = Self {
            entries: index.entries().collect(),
            pos: 0,
            entry: None,
        };
        iter.settle();
        iter
    }

    /// The entry at the cursor.
    pub fn current(&self) -> Option<&SnapshotEntry> {
        self.entry.as_ref()
    }

    /// Advance to the next entry.
    pub fn advance(&mut self) -> Option<&SnapshotEntry> {
        if self.pos < self.entries.len() {
            self.pos += 1;
        }
        self.settle();
        self.entry.as_ref()
    }

    /// Rewind to the first entry.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.settle();
    }

    fn settle(&mut self) {
        self.entry = self.entries.get(self.pos).map(|e| SnapshotEntry {
            path: e.path.clone(),
            mode: e.mode,
            id: Some(e.id),
            size: Some(e.size),
        });
    }
}

// ---------------------------------------------------------------------
// Working-directory iterator
// ---------------------------------------------------------------------

/// Name of the store directory skipped at the top level and used to detect
/// nested repositories (yielded as submodule references).
const REPO_DIR: &str = ".strata";

#[derive(Clone)]
struct WdEntry {
    // Directory names carry a trailing '/' so byte ordering matches the
    // directory-aware entry order.
    name: String,
    mode: FileMode,
    size: Option<u64>,
}

struct WdFrame {
    prefix: String,
    entries: Vec<WdEntry>,
    index: usize,
}

/// Cursor over a live directory.
///
/// Directories are read one frame at a time; subdirectories are yielded
/// as entries and only entered via [`WorkdirIter::advance_into_dir`].
/// Entries never carry ids; hashing working files is the caller's concern.
pub struct WorkdirIter {
    root: PathBuf,
    stack: Vec<WdFrame>,
    entry: Option<SnapshotEntry>,
}

impl WorkdirIter {
    /// Position a new cursor on the first entry under `root`.
    pub fn new(root: &Path) -> DiffResult<Self> {
        let entries = read_dir_frame(root, true)?;
        let mut iter = Self {
            root: root.to_path_buf(),
            stack: vec![WdFrame {
                prefix: String::new(),
                entries,
                index: 0,
            }],
            entry: None,
        };
        iter.settle();
        Ok(iter)
    }

    /// The entry at the cursor.
    pub fn current(&self) -> Option<&SnapshotEntry> {
        self.entry.as_ref()
    }

    /// Advance to the next entry without entering directories.
    pub fn advance(&mut self) -> DiffResult<Option<&SnapshotEntry>> {
        if self.entry.is_some() {
            if let Some(top) = self.stack.last_mut() {
                top.index += 1;
            }
            self.settle();
        }
        Ok(self.entry.as_ref())
    }

    /// Descend into the directory at the cursor.
    ///
    /// If the cursor is not on a directory this is a no-op; if the
    /// directory is empty (or unreadable) the request degenerates into an
    /// ordinary advance past it.
    pub fn advance_into_dir(&mut self) -> DiffResult<Option<&SnapshotEntry>> {
        let Some(current) = self.entry.as_ref() else {
            return Ok(None);
        };
        if current.mode != FileMode::Tree {
            return Ok(self.entry.as_ref());
        }

        let prefix = current.path.clone();
        let dir = self.root.join(prefix.trim_end_matches('/'));
        let entries = read_dir_frame(&dir, false).unwrap_or_default();
        if entries.is_empty() {
            return self.advance();
        }

        self.stack.push(WdFrame {
            prefix,
            entries,
            index: 0,
        });
        self.settle();
        Ok(self.entry.as_ref())
    }

    /// Rewind to the first entry.
    pub fn reset(&mut self) {
        self.stack.truncate(1);
        self.stack[0].index = 0;
        self.settle();
    }

    fn settle(&mut self) {
        loop {
            let frame = self.stack.last().expect("root frame always present");
            if let Some(e) = frame.entries.get(frame.index) {
                self.entry = Some(SnapshotEntry {
                    path: format!("{}{}", frame.prefix, e.name),
                    mode: e.mode,
                    id: None,
                    size: e.size,
                });
                return;
            }
            if self.stack.len() == 1 {
                self.entry = None;
                return;
            }
            self.stack.pop();
            if let Some(parent) = self.stack.last_mut() {
                parent.index += 1;
            }
        }
    }
}

/// Read one directory level into sorted frame entries.
fn read_dir_frame(dir: &Path, top_level: bool) -> DiffResult<Vec<WdEntry>> {
    let mut out = Vec::new();

    for dirent in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        let dirent = dirent.map_err(|e| std::io::Error::from(e))?;
        let name = dirent.file_name().to_string_lossy().into_owned();
        if top_level && name == REPO_DIR {
            continue;
        }

        let file_type = dirent.file_type();
        let entry = if file_type.is_dir() {
            if dirent.path().join(REPO_DIR).is_dir() {
                // A nested repository is a submodule reference, which sorts
                // as a non-tree entry (no trailing slash).
                WdEntry {
                    name,
                    mode: FileMode::Commit,
                    size: None,
                }
            } else {
                WdEntry {
                    name: format!("{name}/"),
                    mode: FileMode::Tree,
                    size: None,
                }
            }
        } else if file_type.is_symlink() {
            let meta = std::fs::symlink_metadata(dirent.path())?;
            WdEntry {
                name,
                mode: FileMode::Link,
                size: Some(meta.len()),
            }
        } else {
            let meta = dirent.metadata().map_err(|e| std::io::Error::from(e))?;
            WdEntry {
                name,
                mode: file_mode_for(&meta),
                size: Some(meta.len()),
            }
        };
        out.push(entry);
    }

    out.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
    Ok(out)
}

#[cfg(unix)]
fn file_mode_for(meta: &std::fs::Metadata) -> FileMode {
    use std::os::unix::fs::PermissionsExt;
    if meta.permissions().mode() & 0o111 != 0 {
        FileMode::BlobExecutable
    } else {
        FileMode::Blob
    }
}

#[cfg(not(unix))]
fn file_mode_for(_meta: &std::fs::Metadata) -> FileMode {
    FileMode::Blob
}

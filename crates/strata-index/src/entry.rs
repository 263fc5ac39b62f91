//! Index entry type and path validation.

use serde::{Deserialize, Serialize};
use strata_tree::FileMode;
use strata_types::ObjectId;

use crate::error::{IndexError, IndexResult};

/// One staged file in the flat index.
///
/// Unlike tree entries, index entries carry full repository-relative paths;
/// directories exist only implicitly as path prefixes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Repository-relative path (`/`-separated, no leading slash).
    pub path: String,
    /// Content-addressed id of the staged blob.
    pub id: ObjectId,
    /// File mode; never [`FileMode::Tree`].
    pub mode: FileMode,
    /// Size of the staged content in bytes.
    pub size: u64,
}

impl IndexEntry {
    /// Create an entry after validating path and mode.
    pub fn new(
        path: impl Into<String>,
        id: ObjectId,
        mode: FileMode,
        size: u64,
    ) -> IndexResult<Self> {
        let path = path.into();
        validate_index_path(&path)?;
        if mode.is_tree() {
            return Err(IndexError::InvalidMode(path));
        }
        Ok(Self {
            path,
            id,
            mode: mode.normalized(),
            size,
        })
    }
}

/// Check that a path is usable as an index key: non-empty, relative, no
/// empty components, no NUL bytes.
pub fn validate_index_path(path: &str) -> IndexResult<()> {
    if path.is_empty()
        || path.contains('\0')
        || path.starts_with('/')
        || path.ends_with('/')
        || path.split('/').any(|comp| comp.is_empty())
    {
        return Err(IndexError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_validation() {
        assert!(validate_index_path("a.txt").is_ok());
        assert!(validate_index_path("dir/sub/file").is_ok());
        assert!(validate_index_path("").is_err());
        assert!(validate_index_path("/abs").is_err());
        assert!(validate_index_path("trailing/").is_err());
        assert!(validate_index_path("a//b").is_err());
        assert!(validate_index_path("nul\0byte").is_err());
    }

    #[test]
    fn new_rejects_tree_mode() {
        let err = IndexEntry::new("dir", ObjectId::null(), FileMode::Tree, 0).unwrap_err();
        assert!(matches!(err, IndexError::InvalidMode(_)));
    }

    #[test]
    fn new_normalizes_group_writable() {
        let e = IndexEntry::new("f", ObjectId::null(), FileMode::BlobGroupWritable, 1).unwrap();
        assert_eq!(e.mode, FileMode::Blob);
    }

    #[test]
    fn entry_serde_roundtrip() {
        let entry =
            IndexEntry::new("dir/file.rs", ObjectId::from_bytes(b"c"), FileMode::Blob, 42).unwrap();
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: IndexEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, parsed);
    }
}

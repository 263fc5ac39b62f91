use serde::{Deserialize, Serialize};
use strata_types::ObjectId;

use crate::error::{TreeError, TreeResult};

/// File mode for a tree entry.
///
/// The group-writable blob mode is an early design mistake kept only so old
/// trees still parse; it is normalized to [`FileMode::Blob`] whenever an
/// entry passes through a builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileMode {
    /// Subtree / directory (0o040000).
    Tree,
    /// Normal file (0o100644).
    Blob,
    /// Group-writable file (0o100664, deprecated).
    BlobGroupWritable,
    /// Executable file (0o100755).
    BlobExecutable,
    /// Symbolic link (0o120000).
    Link,
    /// Submodule reference (0o160000).
    Commit,
}

impl FileMode {
    /// Octal mode value (for display/serialization).
    pub fn mode_bits(&self) -> u32 {
        match self {
            Self::Tree => 0o040000,
            Self::Blob => 0o100644,
            Self::BlobGroupWritable => 0o100664,
            Self::BlobExecutable => 0o100755,
            Self::Link => 0o120000,
            Self::Commit => 0o160000,
        }
    }

    /// Parse from an octal mode value.
    pub fn from_mode_bits(bits: u32) -> TreeResult<Self> {
        match bits {
            0o040000 => Ok(Self::Tree),
            0o100644 => Ok(Self::Blob),
            0o100664 => Ok(Self::BlobGroupWritable),
            0o100755 => Ok(Self::BlobExecutable),
            0o120000 => Ok(Self::Link),
            0o160000 => Ok(Self::Commit),
            other => Err(TreeError::InvalidFileMode(other)),
        }
    }

    /// Collapse the deprecated group-writable mode to the plain blob mode.
    pub fn normalized(self) -> Self {
        match self {
            Self::BlobGroupWritable => Self::Blob,
            other => other,
        }
    }

    /// Returns `true` for the subtree mode.
    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree)
    }

    /// Returns `true` for the submodule-reference mode.
    pub fn is_submodule(&self) -> bool {
        matches!(self, Self::Commit)
    }

    /// Returns `true` for any blob-class mode (plain, group-writable,
    /// executable).
    pub fn is_blob(&self) -> bool {
        matches!(
            self,
            Self::Blob | Self::BlobGroupWritable | Self::BlobExecutable
        )
    }
}

impl std::fmt::Display for FileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06o}", self.mode_bits())
    }
}

/// A single entry in a tree object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Entry name (a single path component, no separators).
    pub name: String,
    /// File mode.
    pub mode: FileMode,
    /// Content-addressed ID of the referenced object.
    pub id: ObjectId,
}

impl TreeEntry {
    /// Create a new tree entry after validating the name.
    pub fn new(name: impl Into<String>, mode: FileMode, id: ObjectId) -> TreeResult<Self> {
        let name = name.into();
        validate_entry_name(&name)?;
        Ok(Self { name, mode, id })
    }

    /// Returns `true` if this entry references a subtree.
    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }
}

/// Check that a name is usable as a tree entry: non-empty, no path
/// separator, no NUL (the serialized format is NUL-terminated).
pub fn validate_entry_name(name: &str) -> TreeResult<()> {
    if name.is_empty() || name.contains('/') || name.contains('\0') {
        return Err(TreeError::InvalidName(name.to_string()));
    }
    Ok(())
}

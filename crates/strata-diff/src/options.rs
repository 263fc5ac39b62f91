//! Options controlling delta classification and patch generation.

use serde::{Deserialize, Serialize};

use crate::error::{DiffError, DiffResult};

/// Content larger than this is classified binary without being diffed.
pub const DEFAULT_MAX_SIZE: u64 = 512 * 1024 * 1024;

/// Sanity cap on context and interhunk widths.
const MAX_LINE_OPTION: u32 = 1 << 20;

/// Whitespace sensitivity of the text comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Whitespace {
    /// Lines compare byte for byte.
    #[default]
    Exact,
    /// All whitespace is ignored.
    IgnoreAll,
    /// Changes in the amount of whitespace are ignored; presence still
    /// matters.
    IgnoreChange,
    /// Only trailing whitespace at end of line is ignored.
    IgnoreEol,
}

/// Options for building a diff list and its patches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    /// Swap the old/new roles after classification: Added and Deleted
    /// trade places and each delta's sides are exchanged.
    pub reverse: bool,
    /// Treat every pair as text, skipping binary classification.
    pub force_text: bool,
    /// Whitespace equivalence rule forwarded to the text comparison.
    pub whitespace: Whitespace,
    /// Unchanged lines retained around each change.
    pub context_lines: u32,
    /// Longest run of unchanged lines between two changed regions that
    /// still merges them into one hunk.
    pub interhunk_lines: u32,
    /// Size threshold above which content is classified binary.
    pub max_size: u64,
    /// Keep Unmodified deltas visible in the delta enumeration. They are
    /// never patch-generated either way.
    pub include_unmodified: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            reverse: false,
            force_text: false,
            whitespace: Whitespace::Exact,
            context_lines: 3,
            interhunk_lines: 0,
            max_size: DEFAULT_MAX_SIZE,
            include_unmodified: true,
        }
    }
}

impl DiffOptions {
    /// Validate option values before use.
    pub fn validate(&self) -> DiffResult<()> {
        if self.context_lines > MAX_LINE_OPTION {
            return Err(DiffError::InvalidOptions("context_lines too large"));
        }
        if self.interhunk_lines > MAX_LINE_OPTION {
            return Err(DiffError::InvalidOptions("interhunk_lines too large"));
        }
        Ok(())
    }
}

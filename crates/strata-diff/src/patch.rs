//! Lazy per-delta patch generation.
//!
//! A patch advances through a strictly forward state machine:
//! `Allocated -> Prepped -> Loaded -> Diffable -> Diffed`, with a terminal
//! `Binary` short-circuit out of `Prepped` when either side is over the
//! size threshold or sniffs as binary. Hunks are generated at most once and
//! cached for the patch's remaining lifetime. Content buffers are owned by
//! the patch and released when it drops; a patch keeps its diff list alive
//! through a shared handle.

use std::sync::Arc;

use memmap2::Mmap;
use strata_store::{ObjectKind, ObjectStore};
use strata_tree::FileMode;
use tracing::debug;

use crate::error::{DiffError, DiffResult};
use crate::hunks::{self, Hunk, Line, LineOrigin, Side};
use crate::iter::{SnapshotEntry, SourceKind};
use crate::list::{Delta, DeltaStatus, DiffList};

/// Where a patch is in its lazy pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchState {
    /// Bound to a delta; no content examined.
    Allocated,
    /// Known sizes checked against the binary threshold.
    Prepped,
    /// Content for each present side is in memory.
    Loaded,
    /// Both available sides confirmed text and in bounds.
    Diffable,
    /// Hunks and lines generated and cached.
    Diffed,
    /// Terminal: classified binary, zero hunks and lines.
    Binary,
}

fn transition_allowed(from: PatchState, to: PatchState) -> bool {
    use PatchState::*;
    matches!(
        (from, to),
        (Allocated, Prepped) | (Prepped, Loaded) | (Prepped, Binary) | (Loaded, Diffable) | (Diffable, Diffed)
    )
}

enum Buffer {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Buffer {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Owned(v) => v,
            Self::Mapped(m) => m,
        }
    }
}

enum SideLoad {
    Absent,
    Binary,
    Data(Buffer),
}

/// One line of a diffed patch, resolved against the loaded content.
#[derive(Debug)]
pub struct LineRef<'a> {
    /// Context, Added, or Deleted.
    pub origin: LineOrigin,
    /// The raw line bytes, including any trailing newline.
    pub content: &'a [u8],
    /// 1-based line number on the old side; absent for added lines.
    pub old_lineno: Option<usize>,
    /// 1-based line number on the new side; absent for deleted lines.
    pub new_lineno: Option<usize>,
}

/// The lazily generated hunk/line detail for one delta.
///
/// Holds a shared handle on its diff list, so the list outlives every
/// outstanding patch.
pub struct Patch {
    list: Arc<DiffList>,
    index: usize,
    state: PatchState,
    old_data: Option<Buffer>,
    new_data: Option<Buffer>,
    hunks: Vec<Hunk>,
    lines: Vec<Line>,
}

impl Patch {
    /// Bind a new patch to the delta at `index`. No content is examined.
    pub fn new(list: &Arc<DiffList>, index: usize) -> DiffResult<Self> {
        if index >= list.len() {
            return Err(DiffError::DeltaOutOfRange {
                index,
                count: list.len(),
            });
        }
        Ok(Self {
            list: Arc::clone(list),
            index,
            state: PatchState::Allocated,
            old_data: None,
            new_data: None,
            hunks: Vec::new(),
            lines: Vec::new(),
        })
    }

    /// Run every stage and return the finished patch.
    pub fn generate(list: &Arc<DiffList>, index: usize, store: &dyn ObjectStore) -> DiffResult<Self> {
        let mut patch = Self::new(list, index)?;
        patch.diff(store)?;
        Ok(patch)
    }

    /// Current pipeline state.
    pub fn state(&self) -> PatchState {
        self.state
    }

    /// The delta this patch details.
    pub fn delta(&self) -> &Delta {
        &self.list.deltas()[self.index]
    }

    /// Returns `true` once the patch has been classified binary.
    pub fn is_binary(&self) -> bool {
        self.state == PatchState::Binary
    }

    fn advance_state(&mut self, to: PatchState) {
        debug_assert!(
            transition_allowed(self.state, to),
            "illegal patch transition {:?} -> {:?}",
            self.state,
            to
        );
        self.state = to;
    }

    /// Check known sizes against the binary threshold.
    ///
    /// Sides whose sizes only become known at load time are re-checked
    /// then. A no-op once past `Allocated`.
    pub fn prepare(&mut self) -> DiffResult<()> {
        if self.state != PatchState::Allocated {
            return Ok(());
        }
        self.advance_state(PatchState::Prepped);

        let options = self.list.options();
        if options.force_text {
            return Ok(());
        }
        let delta = &self.list.deltas()[self.index];
        let oversize = [&delta.old, &delta.new]
            .into_iter()
            .flatten()
            .any(|side| side.size.is_some_and(|s| s > options.max_size));
        if oversize {
            self.short_circuit_binary();
        }
        Ok(())
    }

    /// Read or map content for each present side.
    ///
    /// A missing side (pure add or delete) stays an explicit absence. If
    /// either side turns out binary here, the patch short-circuits without
    /// ever reaching `Loaded`. A no-op once past `Prepped`.
    pub fn load(&mut self, store: &dyn ObjectStore) -> DiffResult<()> {
        self.prepare()?;
        if self.state != PatchState::Prepped {
            return Ok(());
        }

        let list = Arc::clone(&self.list);
        let delta = &list.deltas()[self.index];
        let options = list.options();

        match self.load_side(store, delta.old.as_ref(), list.old_src())? {
            SideLoad::Absent => self.old_data = None,
            SideLoad::Data(buf) => self.old_data = Some(buf),
            SideLoad::Binary => {
                self.short_circuit_binary();
                return Ok(());
            }
        }
        match self.load_side(store, delta.new.as_ref(), list.new_src())? {
            SideLoad::Absent => self.new_data = None,
            SideLoad::Data(buf) => self.new_data = Some(buf),
            SideLoad::Binary => {
                self.short_circuit_binary();
                return Ok(());
            }
        }

        if !options.force_text {
            let sniffed_binary = [&self.old_data, &self.new_data]
                .into_iter()
                .flatten()
                .any(|buf| looks_binary(buf.as_bytes()));
            if sniffed_binary {
                self.short_circuit_binary();
                return Ok(());
            }
        }

        self.advance_state(PatchState::Loaded);
        Ok(())
    }

    /// Run the line-level comparison, caching hunks and lines.
    ///
    /// Unmodified deltas and pairs with identical content produce zero
    /// hunks and stay `Loaded`; binary patches stay `Binary`. Otherwise the
    /// patch passes through `Diffable` and finishes `Diffed`. Idempotent.
    pub fn diff(&mut self, store: &dyn ObjectStore) -> DiffResult<()> {
        self.load(store)?;
        if self.state != PatchState::Loaded {
            return Ok(());
        }

        if self.list.deltas()[self.index].status == DeltaStatus::Unmodified {
            return Ok(());
        }
        if self.old_data.is_none() && self.new_data.is_none() {
            return Ok(());
        }
        {
            let old_bytes = self.old_data.as_ref().map(Buffer::as_bytes);
            let new_bytes = self.new_data.as_ref().map(Buffer::as_bytes);
            if old_bytes == new_bytes {
                return Ok(());
            }
        }

        self.advance_state(PatchState::Diffable);
        let (hunks, lines) = {
            let old_bytes = self.old_data.as_ref().map_or(&b""[..], |b| b.as_bytes());
            let new_bytes = self.new_data.as_ref().map_or(&b""[..], |b| b.as_bytes());
            hunks::build(old_bytes, new_bytes, self.list.options())
        };
        debug!(
            path = self.list.deltas()[self.index].path(),
            hunks = hunks.len(),
            "generated patch"
        );
        self.hunks = hunks;
        self.lines = lines;
        self.advance_state(PatchState::Diffed);
        Ok(())
    }

    /// Number of hunks. Zero until diffed, and always zero for binary
    /// patches.
    pub fn num_hunks(&self) -> usize {
        self.hunks.len()
    }

    /// Hunk at the given position; fails distinctly when out of range.
    pub fn hunk(&self, index: usize) -> DiffResult<&Hunk> {
        self.hunks.get(index).ok_or(DiffError::HunkOutOfRange {
            index,
            count: self.hunks.len(),
        })
    }

    /// Number of lines in one hunk.
    pub fn num_lines_in_hunk(&self, hunk: usize) -> DiffResult<usize> {
        Ok(self.hunk(hunk)?.lines())
    }

    /// Line within a hunk; fails distinctly when either index is out of
    /// range, so callers can detect one-past-last deterministically.
    pub fn line_in_hunk(&self, hunk: usize, line: usize) -> DiffResult<LineRef<'_>> {
        let h = self.hunk(hunk)?;
        if line >= h.lines() {
            return Err(DiffError::LineOutOfRange {
                index: line,
                count: h.lines(),
            });
        }
        let record = &self.lines[h.line_start + line];
        let buffer = match record.side {
            Side::Old => self.old_data.as_ref(),
            Side::New => self.new_data.as_ref(),
        }
        .expect("line span points into a loaded buffer");

        Ok(LineRef {
            origin: record.origin,
            content: &buffer.as_bytes()[record.start..record.start + record.len],
            old_lineno: record.old_lineno,
            new_lineno: record.new_lineno,
        })
    }

    /// Added and deleted line totals across all hunks.
    pub fn line_stats(&self) -> (usize, usize) {
        let added = self
            .lines
            .iter()
            .filter(|l| l.origin == LineOrigin::Added)
            .count();
        let deleted = self
            .lines
            .iter()
            .filter(|l| l.origin == LineOrigin::Deleted)
            .count();
        (added, deleted)
    }

    fn short_circuit_binary(&mut self) {
        debug!(path = self.list.deltas()[self.index].path(), "binary delta");
        self.old_data = None;
        self.new_data = None;
        self.hunks.clear();
        self.lines.clear();
        self.state = PatchState::Binary;
    }

    fn load_side(
        &self,
        store: &dyn ObjectStore,
        side: Option<&SnapshotEntry>,
        source: SourceKind,
    ) -> DiffResult<SideLoad> {
        let Some(entry) = side else {
            return Ok(SideLoad::Absent);
        };
        let options = self.list.options();

        match entry.mode {
            // Directory deltas carry no content.
            FileMode::Tree => Ok(SideLoad::Absent),
            FileMode::Commit => Ok(match entry.id {
                Some(id) => SideLoad::Data(Buffer::Owned(
                    format!("Subproject commit {}\n", id.to_hex()).into_bytes(),
                )),
                None => SideLoad::Absent,
            }),
            _ if source == SourceKind::Workdir => {
                let root = self
                    .list
                    .workdir_root()
                    .ok_or(DiffError::InvalidOptions("workdir source without a root"))?;
                let path = root.join(&entry.path);

                if entry.mode == FileMode::Link {
                    let target = std::fs::read_link(&path)?;
                    return Ok(SideLoad::Data(Buffer::Owned(
                        target.to_string_lossy().into_owned().into_bytes(),
                    )));
                }

                let file = std::fs::File::open(&path)?;
                let len = file.metadata()?.len();
                if !options.force_text && len > options.max_size {
                    return Ok(SideLoad::Binary);
                }
                if len == 0 {
                    Ok(SideLoad::Data(Buffer::Owned(Vec::new())))
                } else {
                    let map = unsafe { Mmap::map(&file)? };
                    Ok(SideLoad::Data(Buffer::Mapped(map)))
                }
            }
            _ => {
                let Some(id) = entry.id else {
                    return Ok(SideLoad::Absent);
                };
                let data = store.lookup(&id, ObjectKind::Blob)?;
                if !options.force_text && data.len() as u64 > options.max_size {
                    return Ok(SideLoad::Binary);
                }
                Ok(SideLoad::Data(Buffer::Owned(data)))
            }
        }
    }
}

impl std::fmt::Debug for Patch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Patch")
            .field("path", &self.delta().path())
            .field("state", &self.state)
            .field("hunks", &self.hunks.len())
            .finish()
    }
}

/// Content-sniffing heuristic over the leading window of a buffer: a NUL
/// byte, or a high enough ratio of non-printable bytes, classifies the
/// content as binary.
fn looks_binary(data: &[u8]) -> bool {
    const SNIFF_LEN: usize = 4000;

    let window = &data[..data.len().min(SNIFF_LEN)];
    let mut printable = 0usize;
    let mut nonprintable = 0usize;
    for &b in window {
        if b == 0 {
            return true;
        }
        if b > 0x1f && b < 0x7f {
            printable += 1;
        } else if !matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c) {
            nonprintable += 1;
        }
    }
    (printable >> 7) < nonprintable
}

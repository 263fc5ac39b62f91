//! Line-level comparison and hunk assembly.
//!
//! The longest-common-subsequence core comes from the `similar` crate
//! (Myers); this module layers whitespace equivalence, context expansion,
//! interhunk coalescing, and line numbering on top. Lines are stored as
//! byte spans into the patch's loaded buffers, never copied.

use std::borrow::Cow;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices, Algorithm, DiffTag};

use crate::options::{DiffOptions, Whitespace};

/// Which loaded buffer a line's span points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Side {
    Old,
    New,
}

/// Classification of a single patch line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineOrigin {
    /// Present on both sides.
    Context,
    /// Present only on the new side.
    Added,
    /// Present only on the old side.
    Deleted,
}

impl LineOrigin {
    /// The single-character marker used in patch text.
    pub fn as_char(&self) -> char {
        match self {
            Self::Context => ' ',
            Self::Added => '+',
            Self::Deleted => '-',
        }
    }
}

/// A contiguous run of changed lines plus surrounding context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hunk {
    /// First old-side line covered (1-based; 0 when the hunk has no
    /// old-side lines).
    pub old_start: usize,
    /// Old-side lines covered.
    pub old_count: usize,
    /// First new-side line covered (1-based; 0 when none).
    pub new_start: usize,
    /// New-side lines covered.
    pub new_count: usize,
    /// Displayable `@@ -a,b +c,d @@` header, newline-terminated.
    pub header: String,
    pub(crate) line_start: usize,
    pub(crate) line_count: usize,
}

impl Hunk {
    /// Number of lines in this hunk.
    pub fn lines(&self) -> usize {
        self.line_count
    }
}

/// A single line, stored as a span into one of the loaded buffers.
#[derive(Clone, Debug)]
pub(crate) struct Line {
    pub side: Side,
    pub start: usize,
    pub len: usize,
    pub origin: LineOrigin,
    pub old_lineno: Option<usize>,
    pub new_lineno: Option<usize>,
}

// A maximal run of non-equal ops: `old` lines are replaced by `new` lines.
#[derive(Clone)]
struct ChangeRegion {
    old: Range<usize>,
    new: Range<usize>,
}

/// Compare two text buffers line-by-line and assemble hunks.
///
/// An absent side is passed as an empty buffer; the result is then a single
/// hunk of all-added (or all-deleted) lines with no context.
pub(crate) fn build(old: &[u8], new: &[u8], options: &DiffOptions) -> (Vec<Hunk>, Vec<Line>) {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);

    let old_keys: Vec<Cow<'_, [u8]>> = old_lines
        .iter()
        .map(|r| ws_key(&old[r.clone()], options.whitespace))
        .collect();
    let new_keys: Vec<Cow<'_, [u8]>> = new_lines
        .iter()
        .map(|r| ws_key(&new[r.clone()], options.whitespace))
        .collect();

    let ops = capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys);

    let mut regions: Vec<ChangeRegion> = Vec::new();
    for op in &ops {
        if op.tag() == DiffTag::Equal {
            continue;
        }
        let (o, n) = (op.old_range(), op.new_range());
        match regions.last_mut() {
            Some(last) if last.old.end == o.start && last.new.end == n.start => {
                last.old.end = o.end;
                last.new.end = n.end;
            }
            _ => regions.push(ChangeRegion { old: o, new: n }),
        }
    }
    if regions.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let context = options.context_lines as usize;
    let interhunk = options.interhunk_lines as usize;

    // Two changes share a hunk when the unchanged run between them fits in
    // the trailing context of one, the leading context of the other, and
    // the interhunk allowance.
    let mut groups: Vec<Vec<ChangeRegion>> = Vec::new();
    let mut prev_end = None::<usize>;
    for region in regions {
        let merge = prev_end.is_some_and(|end| region.old.start - end <= 2 * context + interhunk);
        prev_end = Some(region.old.end);
        match groups.last_mut() {
            Some(group) if merge => group.push(region),
            _ => groups.push(vec![region]),
        }
    }

    let mut hunks = Vec::new();
    let mut lines = Vec::new();
    let mut prev_group_old_end = 0usize;

    for group in &groups {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };

        let lead = context.min(first.old.start - prev_group_old_end);
        let hunk_old_start = first.old.start - lead;
        let hunk_new_start = first.new.start - lead;
        let trail = context.min(old_lines.len() - last.old.end);
        let hunk_old_end = last.old.end + trail;
        let hunk_new_end = last.new.end + trail;
        prev_group_old_end = last.old.end;

        let line_start = lines.len();
        let mut o = hunk_old_start;
        let mut n = hunk_new_start;

        for region in group {
            while o < region.old.start {
                lines.push(Line {
                    side: Side::Old,
                    start: old_lines[o].start,
                    len: old_lines[o].len(),
                    origin: LineOrigin::Context,
                    old_lineno: Some(o + 1),
                    new_lineno: Some(n + 1),
                });
                o += 1;
                n += 1;
            }
            for i in region.old.clone() {
                lines.push(Line {
                    side: Side::Old,
                    start: old_lines[i].start,
                    len: old_lines[i].len(),
                    origin: LineOrigin::Deleted,
                    old_lineno: Some(i + 1),
                    new_lineno: None,
                });
            }
            o = region.old.end;
            for j in region.new.clone() {
                lines.push(Line {
                    side: Side::New,
                    start: new_lines[j].start,
                    len: new_lines[j].len(),
                    origin: LineOrigin::Added,
                    old_lineno: None,
                    new_lineno: Some(j + 1),
                });
            }
            n = region.new.end;
        }
        while o < hunk_old_end {
            lines.push(Line {
                side: Side::Old,
                start: old_lines[o].start,
                len: old_lines[o].len(),
                origin: LineOrigin::Context,
                old_lineno: Some(o + 1),
                new_lineno: Some(n + 1),
            });
            o += 1;
            n += 1;
        }

        let old_count = hunk_old_end - hunk_old_start;
        let new_count = hunk_new_end - hunk_new_start;
        let old_start = if old_count == 0 { hunk_old_start } else { hunk_old_start + 1 };
        let new_start = if new_count == 0 { hunk_new_start } else { hunk_new_start + 1 };

        hunks.push(Hunk {
            old_start,
            old_count,
            new_start,
            new_count,
            header: hunk_header(old_start, old_count, new_start, new_count),
            line_start,
            line_count: lines.len() - line_start,
        });
    }

    (hunks, lines)
}

/// Byte ranges of the lines in `data`, each including its newline.
fn split_lines(data: &[u8]) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, &b) in data.iter().enumerate() {
        if b == b'\n' {
            out.push(start..i + 1);
            start = i + 1;
        }
    }
    if start < data.len() {
        out.push(start..data.len());
    }
    out
}

fn hunk_header(old_start: usize, old_count: usize, new_start: usize, new_count: usize) -> String {
    let mut header = String::from("@@ -");
    header.push_str(&old_start.to_string());
    if old_count != 1 {
        header.push(',');
        header.push_str(&old_count.to_string());
    }
    header.push_str(" +");
    header.push_str(&new_start.to_string());
    if new_count != 1 {
        header.push(',');
        header.push_str(&new_count.to_string());
    }
    header.push_str(" @@\n");
    header
}

fn is_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c)
}

fn trim_end_ws(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && is_ws(line[end - 1]) {
        end -= 1;
    }
    &line[..end]
}

/// The equivalence key a line compares under for the given whitespace mode.
fn ws_key(line: &[u8], mode: Whitespace) -> Cow<'_, [u8]> {
    match mode {
        Whitespace::Exact => Cow::Borrowed(line),
        Whitespace::IgnoreEol => Cow::Borrowed(trim_end_ws(line)),
        Whitespace::IgnoreAll => {
            Cow::Owned(line.iter().copied().filter(|&b| !is_ws(b)).collect())
        }
        Whitespace::IgnoreChange => {
            let trimmed = trim_end_ws(line);
            let mut out = Vec::with_capacity(trimmed.len());
            let mut in_run = false;
            for &b in trimmed {
                if is_ws(b) {
                    if !in_run {
                        out.push(b' ');
                        in_run = true;
                    }
                } else {
                    out.push(b);
                    in_run = false;
                }
            }
            Cow::Owned(out)
        }
    }
}

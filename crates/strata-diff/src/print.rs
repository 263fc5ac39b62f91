//! Textual rendering of diff lists: compact status listings and full
//! unified-diff patch text.

use std::fmt::Write as _;
use std::sync::Arc;

use strata_store::ObjectStore;
use strata_tree::FileMode;
use strata_types::ObjectId;

use crate::error::DiffResult;
use crate::iter::SnapshotEntry;
use crate::list::{Delta, DeltaStatus, DiffList};
use crate::patch::Patch;

const OLD_PREFIX: &str = "a/";
const NEW_PREFIX: &str = "b/";

fn suffix_for(mode: FileMode) -> char {
    match mode {
        FileMode::Tree => '/',
        FileMode::BlobExecutable => '*',
        _ => ' ',
    }
}

/// One status line per changed delta: `X<TAB>path`, with `/` appended to
/// directories and `*` to executables. Unmodified deltas are omitted.
pub fn format_compact(list: &DiffList) -> String {
    let mut out = String::new();

    for delta in list.deltas() {
        let code = delta.status.as_char();
        if code == ' ' {
            continue;
        }

        let primary = delta
            .new
            .as_ref()
            .or(delta.old.as_ref())
            .expect("delta always has one side");
        let suffix = suffix_for(primary.mode);

        match (&delta.old, &delta.new) {
            (Some(o), Some(n)) if o.mode != n.mode => {
                let _ = writeln!(
                    out,
                    "{code}\t{}{suffix} ({:o} -> {:o})",
                    delta.path(),
                    o.mode.mode_bits(),
                    n.mode.mode_bits()
                );
            }
            _ if suffix != ' ' => {
                let _ = writeln!(out, "{code}\t{}{suffix}", delta.path());
            }
            _ => {
                let _ = writeln!(out, "{code}\t{}", delta.path());
            }
        }
    }
    out
}

fn short_id(id: Option<ObjectId>) -> String {
    match id {
        Some(id) => id.short_hex(),
        None => "00000000".to_string(),
    }
}

fn side_mode(side: &Option<SnapshotEntry>) -> Option<u32> {
    side.as_ref().map(|e| e.mode.mode_bits())
}

/// Full unified-diff text for every changed delta in the list.
///
/// Absent sides render as `/dev/null`; binary deltas render as a single
/// `Binary files ... differ` line with no hunks. Under the `reverse`
/// option the `a/` and `b/` prefixes trade places.
pub fn format_patch(list: &Arc<DiffList>, store: &dyn ObjectStore) -> DiffResult<String> {
    let (old_prefix, new_prefix) = if list.options().reverse {
        (NEW_PREFIX, OLD_PREFIX)
    } else {
        (OLD_PREFIX, NEW_PREFIX)
    };

    let mut out = String::new();

    for index in 0..list.len() {
        let delta = list.get(index)?;
        if delta.status == DeltaStatus::Unmodified {
            continue;
        }
        // Directory deltas have no content to render.
        let primary = delta.new.as_ref().or(delta.old.as_ref());
        if primary.is_some_and(|e| e.mode.is_tree()) {
            continue;
        }

        let patch = Patch::generate(list, index, store)?;
        write_file_header(&mut out, delta, old_prefix, new_prefix);

        let old_path = delta.old.as_ref().map(|e| e.path.as_str());
        let new_path = delta.new.as_ref().map(|e| e.path.as_str());

        if patch.is_binary() {
            let _ = writeln!(
                out,
                "Binary files {} and {} differ",
                display_path(old_prefix, old_path),
                display_path(new_prefix, new_path),
            );
            continue;
        }

        let _ = writeln!(out, "--- {}", display_path(old_prefix, old_path));
        let _ = writeln!(out, "+++ {}", display_path(new_prefix, new_path));

        for h in 0..patch.num_hunks() {
            let hunk = patch.hunk(h)?;
            out.push_str(&hunk.header);
            for l in 0..hunk.lines() {
                let line = patch.line_in_hunk(h, l)?;
                out.push(line.origin.as_char());
                out.push_str(&String::from_utf8_lossy(line.content));
                if !line.content.ends_with(b"\n") {
                    out.push('\n');
                }
            }
        }
    }

    Ok(out)
}

fn display_path(prefix: &str, path: Option<&str>) -> String {
    match path {
        Some(path) => format!("{prefix}{path}"),
        None => "/dev/null".to_string(),
    }
}

fn write_file_header(out: &mut String, delta: &Delta, old_prefix: &str, new_prefix: &str) {
    let path = delta.path();
    let _ = writeln!(out, "diff --git {old_prefix}{path} {new_prefix}{path}");

    let old_id = delta.old.as_ref().and_then(|e| e.id);
    let new_id = delta.new.as_ref().and_then(|e| e.id);

    match (side_mode(&delta.old), side_mode(&delta.new)) {
        (Some(old_mode), Some(new_mode)) if old_mode == new_mode => {
            let _ = writeln!(
                out,
                "index {}..{} {:o}",
                short_id(old_id),
                short_id(new_id),
                old_mode
            );
        }
        (Some(old_mode), Some(new_mode)) => {
            let _ = writeln!(out, "old mode {old_mode:o}");
            let _ = writeln!(out, "new mode {new_mode:o}");
            let _ = writeln!(out, "index {}..{}", short_id(old_id), short_id(new_id));
        }
        (None, Some(new_mode)) => {
            let _ = writeln!(out, "new file mode {new_mode:o}");
            let _ = writeln!(out, "index {}..{}", short_id(old_id), short_id(new_id));
        }
        (Some(old_mode), None) => {
            let _ = writeln!(out, "deleted file mode {old_mode:o}");
            let _ = writeln!(out, "index {}..{}", short_id(old_id), short_id(new_id));
        }
        (None, None) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DiffOptions;
    use strata_index::Index;
    use strata_store::InMemoryObjectStore;
    use strata_tree::Tree;

    fn snapshot(store: &InMemoryObjectStore, files: &[(&str, &[u8])]) -> Tree {
        let mut index = Index::new();
        for (path, content) in files {
            index
                .stage_content(store, path, content, FileMode::Blob)
                .unwrap();
        }
        Tree::load(store, &index.write_tree(store).unwrap()).unwrap()
    }

    fn list_for(
        store: &InMemoryObjectStore,
        old: &[(&str, &[u8])],
        new: &[(&str, &[u8])],
    ) -> Arc<DiffList> {
        let old = snapshot(store, old);
        let new = snapshot(store, new);
        Arc::new(DiffList::tree_to_tree(store, &old, &new, DiffOptions::default()).unwrap())
    }

    #[test]
    fn compact_lists_changed_paths_with_codes() {
        let store = InMemoryObjectStore::new();
        let list = list_for(
            &store,
            &[("same.txt", b"s"), ("gone.txt", b"g"), ("edit.txt", b"1")],
            &[("same.txt", b"s"), ("edit.txt", b"2"), ("fresh.txt", b"f")],
        );

        let compact = format_compact(&list);
        assert_eq!(compact, "M\tedit.txt\nA\tfresh.txt\nD\tgone.txt\n");
    }

    #[test]
    fn compact_annotates_mode_changes() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[]);
        let mut index = Index::new();
        index
            .stage_content(&store, "tool", b"#!/bin/sh\n", FileMode::BlobExecutable)
            .unwrap();
        let new = Tree::load(&store, &index.write_tree(&store).unwrap()).unwrap();
        let list = DiffList::tree_to_tree(&store, &old, &new, DiffOptions::default()).unwrap();

        let compact = format_compact(&list);
        assert_eq!(compact, "A\ttool*\n");
    }

    #[test]
    fn patch_text_has_unified_headers_and_markers() {
        let store = InMemoryObjectStore::new();
        let list = list_for(&store, &[("f.txt", b"a\nb\n")], &[("f.txt", b"a\nc\n")]);

        let text = format_patch(&list, &store).unwrap();
        assert!(text.starts_with("diff --git a/f.txt b/f.txt\n"));
        assert!(text.contains("--- a/f.txt\n"));
        assert!(text.contains("+++ b/f.txt\n"));
        assert!(text.contains("@@ -1,2 +1,2 @@\n"));
        assert!(text.contains(" a\n"));
        assert!(text.contains("-b\n"));
        assert!(text.contains("+c\n"));
    }

    #[test]
    fn absent_sides_render_dev_null() {
        let store = InMemoryObjectStore::new();
        let list = list_for(&store, &[], &[("new.txt", b"hello\n")]);

        let text = format_patch(&list, &store).unwrap();
        assert!(text.contains("new file mode 100644\n"));
        assert!(text.contains("--- /dev/null\n"));
        assert!(text.contains("+++ b/new.txt\n"));
        assert!(text.contains("@@ -0,0 +1 @@\n"));
        assert!(text.contains("+hello\n"));

        let list = list_for(&store, &[("dead.txt", b"bye\n")], &[]);
        let text = format_patch(&list, &store).unwrap();
        assert!(text.contains("deleted file mode 100644\n"));
        assert!(text.contains("--- a/dead.txt\n"));
        assert!(text.contains("+++ /dev/null\n"));
        assert!(text.contains("-bye\n"));
    }

    #[test]
    fn binary_deltas_render_one_marker_line() {
        let store = InMemoryObjectStore::new();
        let list = list_for(
            &store,
            &[("blob.bin", &[0u8, 1, 2][..])],
            &[("blob.bin", &[3u8, 0, 4][..])],
        );

        let text = format_patch(&list, &store).unwrap();
        assert!(text.contains("Binary files a/blob.bin and b/blob.bin differ\n"));
        assert!(!text.contains("@@"));
        assert!(!text.contains("---"));
    }

    #[test]
    fn unmodified_deltas_are_not_rendered() {
        let store = InMemoryObjectStore::new();
        let list = list_for(&store, &[("same", b"x\n")], &[("same", b"x\n")]);
        assert_eq!(format_patch(&list, &store).unwrap(), "");
        assert_eq!(format_compact(&list), "");
    }

    #[test]
    fn reverse_swaps_display_prefixes() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[("f", b"1\n")]);
        let new = snapshot(&store, &[("f", b"2\n")]);
        let list = Arc::new(
            DiffList::tree_to_tree(
                &store,
                &old,
                &new,
                DiffOptions {
                    reverse: true,
                    ..Default::default()
                },
            )
            .unwrap(),
        );

        let text = format_patch(&list, &store).unwrap();
        assert!(text.contains("--- b/f\n"));
        assert!(text.contains("+++ a/f\n"));
        // The reversed diff deletes the new content and restores the old.
        assert!(text.contains("-2\n"));
        assert!(text.contains("+1\n"));
    }

    #[test]
    fn missing_final_newline_is_terminated() {
        let store = InMemoryObjectStore::new();
        let list = list_for(&store, &[("f", b"a")], &[("f", b"b")]);
        let text = format_patch(&list, &store).unwrap();
        assert!(text.ends_with('\n'));
        assert!(text.contains("-a\n"));
        assert!(text.contains("+b\n"));
    }
}

//! Path utilities: the directory-aware entry comparator and path joining.
//!
//! Tree entries are not sorted alphabetically. A subtree sorts as if its
//! name carried a trailing `/`, so `lib` (directory) lands *after* `lib.c`
//! (file) even though plain byte order would put them the other way around.
//! Every sort and every search over entries must go through [`compare`].

use std::cmp::Ordering;

/// Compare two entry names under the directory-aware ordering.
///
/// Equivalent to comparing `name + ('/' if is_tree else '')` byte-wise,
/// without allocating. Pure and stateless: the sort, the homing search and
/// the builder upsert all call this exact function.
pub fn compare(a_name: &str, a_is_tree: bool, b_name: &str, b_is_tree: bool) -> Ordering {
    let a = a_name.as_bytes();
    let b = b_name.as_bytes();
    let len = a.len().min(b.len());

    match a[..len].cmp(&b[..len]) {
        Ordering::Equal => {}
        other => return other,
    }

    // One name is a prefix of the other (or they are equal); the virtual
    // next byte is '/' for subtrees and NUL otherwise.
    let ca = a.get(len).copied().unwrap_or(if a_is_tree { b'/' } else { 0 });
    let cb = b.get(len).copied().unwrap_or(if b_is_tree { b'/' } else { 0 });
    ca.cmp(&cb)
}

/// Minimum-length prefix comparison used by the homing search.
///
/// Compares only the overlapping prefix of the two names, so two names
/// where one is a prefix of the other compare as equal. This is
/// deliberately ambiguous: it lets a binary search land *near* the target,
/// after which a linear scan disambiguates.
pub fn prefix_compare(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let len = a.len().min(b.len());
    a[..len].cmp(&b[..len])
}

/// Join a directory path and a leaf name with a single separator.
pub fn join(base: &str, leaf: &str) -> String {
    if base.is_empty() {
        leaf.to_string()
    } else if base.ends_with('/') {
        format!("{base}{leaf}")
    } else {
        format!("{base}/{leaf}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_compare_bytewise() {
        assert_eq!(compare("alpha", false, "beta", false), Ordering::Less);
        assert_eq!(compare("beta", false, "alpha", false), Ordering::Greater);
        assert_eq!(compare("same", false, "same", false), Ordering::Equal);
    }

    #[test]
    fn directory_sorts_with_virtual_separator() {
        // "lib.c" vs directory "lib": compare "lib.c" with "lib/".
        assert_eq!(compare("lib.c", false, "lib", true), Ordering::Less);
        // Plain byte order would say "lib" < "lib.c" instead.
        assert_eq!(compare("lib", false, "lib.c", false), Ordering::Less);
    }

    #[test]
    fn file_before_directory_with_same_name() {
        assert_eq!(compare("x", false, "x", true), Ordering::Less);
        assert_eq!(compare("x", true, "x", false), Ordering::Greater);
    }

    #[test]
    fn prefix_compare_is_ambiguous_on_containment() {
        assert_eq!(prefix_compare("lib", "lib.c"), Ordering::Equal);
        assert_eq!(prefix_compare("lib.c", "lib"), Ordering::Equal);
        assert_eq!(prefix_compare("lia", "lib"), Ordering::Less);
    }

    #[test]
    fn join_handles_empty_and_trailing_slash() {
        assert_eq!(join("", "file"), "file");
        assert_eq!(join("dir", "file"), "dir/file");
        assert_eq!(join("dir/", "file"), "dir/file");
        assert_eq!(join("a/b", "c"), "a/b/c");
    }
}

use serde::{Deserialize, Serialize};
use strata_types::ObjectId;

/// The kind of object stored.
///
/// The comparison engine only ever resolves blobs (file payloads) and trees
/// (directory listings); everything else the surrounding system stores is
/// invisible through this interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Raw content (file contents, symlink targets).
    Blob,
    /// Directory listing: ordered entries mapping names to object references.
    Tree,
}

impl ObjectKind {
    /// Short lowercase tag, used in the hashed object header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the content-addressed ID for an object of the given kind.
///
/// The id is the BLAKE3 hash of `"{kind} {len}\0"` followed by the object
/// bytes, so identical content stored under different kinds never collides.
/// This is the single id rule shared by every store implementation; callers
/// that hash content out-of-band (e.g. hashing a working file on demand)
/// must use it too so their ids agree with stored ones.
pub fn object_id_for(kind: ObjectKind, data: &[u8]) -> ObjectId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(format!(" {}\0", data.len()).as_bytes());
    hasher.update(data);
    ObjectId::from_hash(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic() {
        let a = object_id_for(ObjectKind::Blob, b"content");
        let b = object_id_for(ObjectKind::Blob, b"content");
        assert_eq!(a, b);
    }

    #[test]
    fn different_kinds_produce_different_ids() {
        let blob = object_id_for(ObjectKind::Blob, b"same data");
        let tree = object_id_for(ObjectKind::Tree, b"same data");
        assert_ne!(blob, tree);
    }

    #[test]
    fn different_content_produces_different_ids() {
        let a = object_id_for(ObjectKind::Blob, b"aaa");
        let b = object_id_for(ObjectKind::Blob, b"bbb");
        assert_ne!(a, b);
    }

    #[test]
    fn kind_display() {
        assert_eq!(format!("{}", ObjectKind::Blob), "blob");
        assert_eq!(format!("{}", ObjectKind::Tree), "tree");
    }

    #[test]
    fn kind_serde_roundtrip() {
        for kind in [ObjectKind::Blob, ObjectKind::Tree] {
            let json = serde_json::to_string(&kind).unwrap();
            let parsed: ObjectKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, parsed);
        }
    }
}

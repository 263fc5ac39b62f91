use std::collections::HashMap;
use std::sync::RwLock;

use strata_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{object_id_for, ObjectKind};
use crate::traits::ObjectStore;

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. All objects are held in memory behind a
/// `RwLock` for safe concurrent access. Objects are cloned on read.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, (ObjectKind, Vec<u8>)>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(|(_, data)| data.len() as u64)
            .sum()
    }

    /// Remove all objects from the store.
    pub fn clear(&self) {
        self.objects.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn lookup(&self, id: &ObjectId, kind: ObjectKind) -> StoreResult<Vec<u8>> {
        let map = self.objects.read().expect("lock poisoned");
        match map.get(id) {
            None => Err(StoreError::NotFound(*id)),
            Some((stored_kind, _)) if *stored_kind != kind => Err(StoreError::KindMismatch {
                id: *id,
                expected: kind.as_str(),
                actual: stored_kind.as_str(),
            }),
            Some((_, data)) => Ok(data.clone()),
        }
    }

    fn write(&self, kind: ObjectKind, data: &[u8]) -> StoreResult<ObjectId> {
        let id = object_id_for(kind, data);
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let mut map = self.objects.write().expect("lock poisoned");
        // Idempotent: content-addressing guarantees the same ID always maps
        // to the same content.
        map.entry(id).or_insert_with(|| (kind, data.to_vec()));
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_lookup_blob() {
        let store = InMemoryObjectStore::new();
        let id = store.write(ObjectKind::Blob, b"hello world").unwrap();
        assert!(!id.is_null());

        let data = store.lookup(&id, ObjectKind::Blob).unwrap();
        assert_eq!(data, b"hello world");
    }

    #[test]
    fn lookup_missing_object_is_not_found() {
        let store = InMemoryObjectStore::new();
        let id = ObjectId::from_bytes(b"missing");
        let err = store.lookup(&id, ObjectKind::Blob).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn lookup_with_wrong_kind_is_mismatch() {
        let store = InMemoryObjectStore::new();
        let id = store.write(ObjectKind::Blob, b"blob bytes").unwrap();
        let err = store.lookup(&id, ObjectKind::Tree).unwrap_err();
        assert!(matches!(err, StoreError::KindMismatch { .. }));
    }

    #[test]
    fn same_content_produces_same_id() {
        let store = InMemoryObjectStore::new();
        let id1 = store.write(ObjectKind::Blob, b"identical").unwrap();
        let id2 = store.write(ObjectKind::Blob, b"identical").unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn exists_reflects_writes() {
        let store = InMemoryObjectStore::new();
        let id = store.write(ObjectKind::Blob, b"present").unwrap();
        assert!(store.exists(&id).unwrap());
        assert!(!store.exists(&ObjectId::from_bytes(b"absent")).unwrap());
    }

    #[test]
    fn written_id_matches_id_rule() {
        let store = InMemoryObjectStore::new();
        let id = store.write(ObjectKind::Tree, b"entries").unwrap();
        assert_eq!(id, object_id_for(ObjectKind::Tree, b"entries"));
    }

    #[test]
    fn len_and_clear() {
        let store = InMemoryObjectStore::new();
        assert!(store.is_empty());
        store.write(ObjectKind::Blob, b"a").unwrap();
        store.write(ObjectKind::Blob, b"bb").unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_bytes(), 3);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_reads_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryObjectStore::new());
        let id = store.write(ObjectKind::Blob, b"shared data").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let data = store.lookup(&id, ObjectKind::Blob).unwrap();
                    assert_eq!(data, b"shared data");
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
    }
}

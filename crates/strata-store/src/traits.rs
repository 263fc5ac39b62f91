use strata_types::ObjectId;

use crate::error::StoreResult;
use crate::object::ObjectKind;

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. Content-addressing guarantees this:
///   the same data always produces the same ID.
/// - Concurrent reads are always safe (objects are immutable).
/// - The store never interprets object contents beyond the kind tag.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read an object's bytes by its content-addressed ID.
    ///
    /// Fails with [`StoreError::NotFound`] if the object does not exist and
    /// [`StoreError::KindMismatch`] if it exists under a different kind.
    ///
    /// [`StoreError::NotFound`]: crate::StoreError::NotFound
    /// [`StoreError::KindMismatch`]: crate::StoreError::KindMismatch
    fn lookup(&self, id: &ObjectId, kind: ObjectKind) -> StoreResult<Vec<u8>>;

    /// Write an object and return its content-addressed ID.
    ///
    /// If the object already exists, this is a no-op (idempotent).
    fn write(&self, kind: ObjectKind, data: &[u8]) -> StoreResult<ObjectId>;

    /// Check whether an object exists in the store.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;
}

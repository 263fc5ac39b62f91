use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Width of a raw object identifier in bytes.
pub const OBJECT_ID_RAW_LEN: usize = 32;

/// Content-addressed identifier for any stored object.
///
/// An `ObjectId` is the BLAKE3 hash of an object's content. Identical content
/// always produces the same `ObjectId`, making objects deduplicatable and
/// verifiable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; OBJECT_ID_RAW_LEN]);

impl ObjectId {
    /// Compute an `ObjectId` from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create an `ObjectId` from a pre-computed hash.
    pub fn from_hash(hash: [u8; OBJECT_ID_RAW_LEN]) -> Self {
        Self(hash)
    }

    /// Create an `ObjectId` from a raw slice, as read out of a serialized
    /// tree entry.
    pub fn from_raw(raw: &[u8]) -> Result<Self, TypeError> {
        if raw.len() != OBJECT_ID_RAW_LEN {
            return Err(TypeError::InvalidLength {
                expected: OBJECT_ID_RAW_LEN,
                actual: raw.len(),
            });
        }
        let mut arr = [0u8; OBJECT_ID_RAW_LEN];
        arr.copy_from_slice(raw);
        Ok(Self(arr))
    }

    /// The null object ID (all zeros). Represents "no object".
    pub const fn null() -> Self {
        Self([0u8; OBJECT_ID_RAW_LEN])
    }

    /// Returns `true` if this is the null object ID.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; OBJECT_ID_RAW_LEN]
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_RAW_LEN] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_raw(&bytes)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; OBJECT_ID_RAW_LEN]> for ObjectId {
    fn from(bytes: [u8; OBJECT_ID_RAW_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<ObjectId> for [u8; OBJECT_ID_RAW_LEN] {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

//! Shared primitive types for the Strata snapshot store.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Content-addressed identifier (BLAKE3 digest)
//! - [`TypeError`] -- Errors from parsing/constructing primitive types

pub mod error;
pub mod object_id;

pub use error::TypeError;
pub use object_id::{ObjectId, OBJECT_ID_RAW_LEN};

//! Error types for primitive type construction.

/// Errors that can occur when parsing or constructing primitive types.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// A hex string could not be decoded.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// A byte buffer had the wrong length for the target type.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

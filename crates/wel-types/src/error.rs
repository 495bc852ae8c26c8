use thiserror::Error;

use crate::value::ForeignKind;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown mutation class: {0}")]
    UnknownMutationClass(String),
}

/// Errors produced when a value cannot be canonicalized.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CanonicalError {
    /// A number that has no canonical decimal form (NaN, +Infinity, -Infinity).
    #[error("numeric value not allowed in canonicalization: {0}")]
    InvalidValue(String),

    /// A foreign container or opaque token.
    #[error("unsupported type in canonicalization: {}", .0.reason())]
    UnsupportedType(ForeignKind),

    /// An object carrying its own identity rather than a plain map.
    #[error("only plain values are allowed in canonicalized payloads (found instance of `{0}`)")]
    NotPlainValue(String),
}

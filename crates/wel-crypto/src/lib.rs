//! Cryptographic primitives for the World Event Ledger.
//!
//! Provides the canonical serializer that turns payload values into a unique
//! string form, domain-separated SHA-256 entry hashing over that form, and
//! hash chain verification for audit tooling.
//!
//! All crypto operations wrap established libraries: no custom cryptography.

pub mod canonical;
pub mod chain;
pub mod hasher;

pub use canonical::{canonical_value, canonicalize, Canonicalize};
pub use chain::{ChainError, ChainVerifier};
pub use hasher::{EntryHasher, HASH_PREFIX, HASH_VERSION};
pub use wel_types::CanonicalError;

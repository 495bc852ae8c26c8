use sha2::{Digest, Sha256};
use wel_types::{CanonicalError, EntryHash, EntryHeader, LedgerEntry};

use crate::canonical::{canonical_value, canonicalize, Canonicalize};

/// Version number written into every hashed header.
pub const HASH_VERSION: u32 = 1;

/// Domain-separation tag for version 1 of the ledger format.
pub const HASH_PREFIX: &str = "PROJECT_ISEKAI_LEDGER_V1|";

/// Domain-separated SHA-256 entry hasher.
///
/// Each hasher carries a prefix that is fed to the digest ahead of the
/// canonical bytes, and a format version that is written into the header
/// itself. Identical content hashed under two prefixes yields two unrelated
/// digests, so entries from different ledger formats can never be confused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryHasher {
    prefix: &'static str,
    version: u32,
}

impl EntryHasher {
    /// Hasher for the current ledger format.
    pub const V1: Self = Self {
        prefix: HASH_PREFIX,
        version: HASH_VERSION,
    };

    /// Create a hasher with a custom prefix and format version.
    pub const fn new(prefix: &'static str, version: u32) -> Self {
        Self { prefix, version }
    }

    /// `SHA256(prefix || data)`.
    pub fn hash(&self, data: &[u8]) -> EntryHash {
        let mut hasher = Sha256::new();
        hasher.update(self.prefix.as_bytes());
        hasher.update(data);
        EntryHash::from_bytes(hasher.finalize().into())
    }

    /// Hash the canonical form of a value.
    pub fn hash_canonical<T: Canonicalize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<EntryHash, CanonicalError> {
        let canonical = canonicalize(value)?;
        Ok(self.hash(canonical.as_bytes()))
    }

    /// Digest of an entry header. `prevHash` is one of the header fields and
    /// is never fed to the digest separately.
    pub fn hash_header(&self, header: &EntryHeader) -> EntryHash {
        let canonical = canonical_value(&header.to_value(self.version));
        self.hash(canonical.as_bytes())
    }

    /// Recompute an entry's digest and compare it with the stored one.
    pub fn verify(&self, entry: &LedgerEntry) -> bool {
        self.hash_header(entry.header()) == entry.hash()
    }

    /// Raw SHA-256 without domain separation (for low-level use).
    pub fn raw_hash(data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    /// The prefix used by this hasher.
    pub fn prefix(&self) -> &str {
        self.prefix
    }

    /// The format version written into hashed headers.
    pub fn version(&self) -> u32 {
        self.version
    }
}

impl Default for EntryHasher {
    fn default() -> Self {
        Self::V1
    }
}

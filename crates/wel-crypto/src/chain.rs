use std::borrow::Borrow;

use wel_types::LedgerEntry;

use crate::hasher::EntryHasher;

/// Hash chain integrity verifier.
///
/// Verifies that the entries of one world instance, in stored order, form a
/// valid chain:
/// 1. Every entry belongs to the same world instance
/// 2. Event indices run 1, 2, 3, ... with no gap or repeat
/// 3. The first entry has no previous hash; every later entry's previous
///    hash equals the stored hash of the entry before it
/// 4. Each stored hash equals the digest recomputed from the entry's header
/// 5. Timestamps never decrease
#[derive(Clone, Copy, Debug, Default)]
pub struct ChainVerifier {
    hasher: EntryHasher,
}

impl ChainVerifier {
    pub fn new(hasher: EntryHasher) -> Self {
        Self { hasher }
    }

    /// Verify a chain, stopping at the first violation.
    pub fn verify_chain<E: Borrow<LedgerEntry>>(&self, entries: &[E]) -> Result<(), ChainError> {
        match self.scan(entries, true).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Collect every violation in the chain.
    pub fn violations<E: Borrow<LedgerEntry>>(&self, entries: &[E]) -> Vec<ChainError> {
        self.scan(entries, false)
    }

    fn scan<E: Borrow<LedgerEntry>>(&self, entries: &[E], stop_at_first: bool) -> Vec<ChainError> {
        let mut found = Vec::new();
        let Some(first) = entries.first() else {
            return found;
        };
        let first: &LedgerEntry = first.borrow();
        let world = first.world_instance_id();
        let mut previous: Option<&LedgerEntry> = None;

        for (position, entry) in entries.iter().enumerate() {
            let entry: &LedgerEntry = entry.borrow();
            let index = entry.event_index();

            if entry.world_instance_id() != world {
                found.push(ChainError::ForeignPartition {
                    position,
                    expected: world.to_owned(),
                    found: entry.world_instance_id().to_owned(),
                });
            }

            let expected_index = position as u64 + 1;
            if index != expected_index {
                found.push(ChainError::IndexOutOfSequence {
                    position,
                    expected: expected_index,
                    found: index,
                });
            }

            match (previous, entry.prev_hash()) {
                (None, Some(_)) => found.push(ChainError::GenesisHasPrevHash),
                (Some(_), None) => found.push(ChainError::MissingPrevHash { index }),
                (Some(prev), Some(link)) if link != prev.hash() => {
                    found.push(ChainError::BrokenLink { index })
                }
                _ => {}
            }

            if !self.hasher.verify(entry) {
                found.push(ChainError::HashMismatch { index });
            }

            if let Some(prev) = previous {
                if entry.timestamp() < prev.timestamp() {
                    found.push(ChainError::TimestampRegression {
                        index,
                        previous: prev.timestamp(),
                        found: entry.timestamp(),
                    });
                }
            }

            if stop_at_first && !found.is_empty() {
                break;
            }
            previous = Some(entry);
        }

        found
    }
}

/// Errors from chain verification.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("entry at position {position} belongs to world `{found}`, expected `{expected}`")]
    ForeignPartition {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("expected event index {expected} at position {position}, found {found}")]
    IndexOutOfSequence {
        position: usize,
        expected: u64,
        found: u64,
    },

    #[error("genesis entry has a previous hash (should be empty)")]
    GenesisHasPrevHash,

    #[error("broken link at index {index}: prevHash does not match the preceding entry")]
    BrokenLink { index: u64 },

    #[error("missing prevHash at index {index} (should reference the preceding entry)")]
    MissingPrevHash { index: u64 },

    #[error("hash mismatch at index {index}: recomputed hash differs from stored")]
    HashMismatch { index: u64 },

    #[error("timestamp regression at index {index}: {found} < {previous}")]
    TimestampRegression {
        index: u64,
        previous: i64,
        found: i64,
    },
}

use std::ops::RangeInclusive;
use std::path::PathBuf;

use wel_crypto::ChainError;
use wel_types::CanonicalError;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("event.{0} is required")]
    MissingField(&'static str),

    #[error("non-monotonic timestamp for world={world}: {got} < {last}")]
    NonMonotonicTimestamp { world: String, last: i64, got: i64 },

    #[error("duplicate eventIndex detected for world={world} index={index}")]
    DuplicateIndex { world: String, index: u64 },

    #[error("event index gap detected for world={world}; missing {gaps:?}")]
    IndexGapDetected {
        world: String,
        gaps: Vec<RangeInclusive<u64>>,
    },

    #[error(transparent)]
    Canonical(#[from] CanonicalError),

    #[error("chain violation in world={world}: {source}")]
    ChainViolation { world: String, source: ChainError },

    #[error("ledger {0} lock poisoned")]
    LockPoisoned(&'static str),
}

impl LedgerError {
    /// Whether the error means the stored history itself is corrupt, as
    /// opposed to a bad append request. Callers should quarantine the
    /// world instance rather than just failing the originating action.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateIndex { .. } | Self::IndexGapDetected { .. } | Self::ChainViolation { .. }
        )
    }
}

/// Errors produced while loading ledger configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

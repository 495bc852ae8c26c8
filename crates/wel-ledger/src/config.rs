use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a ledger instance.
///
/// Read from TOML:
///
/// ```toml
/// strict_contiguity = true
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// When `true`, an append that would leave a hole in a world instance's
    /// index sequence fails with `IndexGapDetected`. When `false`, the hole
    /// is tolerated so a live world keeps running, and is reported through
    /// a warning and the ledger's tolerated-gap counter.
    pub strict_contiguity: bool,
}

impl LedgerConfig {
    /// Development setting: gaps are fatal.
    pub fn strict() -> Self {
        Self {
            strict_contiguity: true,
        }
    }

    /// Production setting: gaps are tolerated and reported.
    pub fn relaxed() -> Self {
        Self::default()
    }

    pub fn with_strict_contiguity(mut self, strict: bool) -> Self {
        self.strict_contiguity = strict;
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

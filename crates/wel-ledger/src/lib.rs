//! Append-only, hash-chained event ledger for simulated world instances.
//!
//! This crate is the heart of the ledger. It provides:
//! - `LedgerWriter` / `LedgerReader` trait boundaries
//! - `Ledger`, the in-process, per-world-instance partitioned store
//! - Deterministic replay over the replayable view
//! - Stream validation (hash chain, index contiguity, timestamps)
//! - `LedgerConfig`, loadable from TOML

pub mod config;
pub mod error;
pub mod memory;
pub mod replay;
pub mod traits;
pub mod validation;

pub use config::LedgerConfig;
pub use error::{ConfigError, LedgerError};
pub use memory::Ledger;
pub use replay::{PayloadMergeReducer, Reducer, ReplayEngine, ReplayResult};
pub use traits::{LedgerReader, LedgerWriter};
pub use validation::{ContiguityReport, StreamValidator, ValidationReport};

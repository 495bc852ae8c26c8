//! Foundation types for the World Event Ledger (WEL).
//!
//! This crate provides the value model, entry model, and digest types used
//! throughout WEL. Every other WEL crate depends on `wel-types`.
//!
//! # Key Types
//!
//! - [`RawValue`]: In-progress payload value as supplied by callers, may hold rejected shapes
//! - [`Value`]: Validated, immutable payload value (closed union of plain shapes)
//! - [`EventDraft`]: Caller-built event awaiting append
//! - [`LedgerEntry`]: Sealed, hash-chained ledger record
//! - [`MutationClass`]: Role of an entry (state change, rejection, system, narrative)
//! - [`EntryHash`]: SHA-256 entry digest

pub mod digest;
pub mod entry;
pub mod error;
pub mod temporal;
pub mod value;

pub use digest::EntryHash;
pub use entry::{EntryHeader, EventDraft, LedgerEntry, MutationClass};
pub use error::{CanonicalError, TypeError};
pub use value::{ForeignKind, Number, RawValue, Value};

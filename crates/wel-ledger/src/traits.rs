use std::sync::Arc;

use wel_types::{EventDraft, LedgerEntry};

use crate::error::LedgerError;

/// Write boundary for ledger append and history-control operations.
///
/// The simulation reducer calls `append` once per emitted domain event and
/// once per bookkeeping entry. `truncate` is an operator action.
pub trait LedgerWriter: Send + Sync {
    /// Validate, index, chain, hash, and store a draft. All-or-nothing.
    fn append(&self, draft: EventDraft) -> Result<Arc<LedgerEntry>, LedgerError>;

    /// Keep the first `keep` entries of a world instance and drop the rest.
    /// Returns how many entries were removed.
    fn truncate(&self, world_instance_id: &str, keep: usize) -> Result<usize, LedgerError>;

    /// Drop every entry of every world instance.
    fn clear(&self) -> Result<(), LedgerError>;
}

/// Read boundary for ledger query and replay operations.
pub trait LedgerReader: Send + Sync {
    /// Every entry of a world instance in index order, rejections included.
    fn entries_for(&self, world_instance_id: &str) -> Result<Vec<Arc<LedgerEntry>>, LedgerError>;

    /// The entries replay may consume: everything except `REJECTION`.
    fn replayable_entries_for(
        &self,
        world_instance_id: &str,
    ) -> Result<Vec<Arc<LedgerEntry>>, LedgerError> {
        let mut entries = self.entries_for(world_instance_id)?;
        entries.retain(|e| e.is_replayable());
        Ok(entries)
    }

    /// The most recent entry of a world instance.
    fn head(&self, world_instance_id: &str) -> Result<Option<Arc<LedgerEntry>>, LedgerError>;

    fn entry_count(&self, world_instance_id: &str) -> Result<u64, LedgerError>;

    /// Every world instance with at least one entry, sorted.
    fn world_instances(&self) -> Result<Vec<String>, LedgerError>;
}

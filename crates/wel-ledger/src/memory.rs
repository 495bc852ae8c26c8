use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};
use wel_crypto::{ChainVerifier, EntryHasher};
use wel_types::temporal::next_timestamp;
use wel_types::{EntryHeader, EventDraft, LedgerEntry, MutationClass};

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::traits::{LedgerReader, LedgerWriter};
use crate::validation::ContiguityReport;

/// In-process world event ledger, partitioned by world instance.
///
/// Every partition is an independent hash chain. All partitions share one
/// lock: appends and truncations are serialized, reads run concurrently and
/// return snapshots of shared entry pointers.
pub struct Ledger {
    config: LedgerConfig,
    hasher: EntryHasher,
    inner: RwLock<LedgerState>,
    tolerated_gaps: AtomicU64,
}

#[derive(Default)]
struct LedgerState {
    streams: HashMap<String, Vec<Arc<LedgerEntry>>>,
}

impl LedgerState {
    fn stream(&self, world_instance_id: &str) -> &[Arc<LedgerEntry>] {
        self.streams
            .get(world_instance_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            hasher: EntryHasher::V1,
            inner: RwLock::new(LedgerState::default()),
            tolerated_gaps: AtomicU64::new(0),
        }
    }

    /// A ledger that refuses any append leaving an index gap.
    pub fn strict() -> Self {
        Self::new(LedgerConfig::strict())
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn hasher(&self) -> EntryHasher {
        self.hasher
    }

    /// How many appends have gone through despite an index gap since the
    /// ledger was created or last cleared. Always zero in strict mode.
    pub fn tolerated_gap_count(&self) -> u64 {
        self.tolerated_gaps.load(Ordering::Relaxed)
    }

    /// Report the shape of a world instance's index set.
    pub fn check_contiguity(&self, world_instance_id: &str) -> Result<ContiguityReport, LedgerError> {
        let state = self.read_state()?;
        Ok(ContiguityReport::from_indices(
            world_instance_id,
            state
                .stream(world_instance_id)
                .iter()
                .map(|e| e.event_index()),
        ))
    }

    /// Recompute and check the whole chain of one world instance.
    pub fn verify(&self, world_instance_id: &str) -> Result<(), LedgerError> {
        let state = self.read_state()?;
        ChainVerifier::new(self.hasher)
            .verify_chain(state.stream(world_instance_id))
            .map_err(|source| LedgerError::ChainViolation {
                world: world_instance_id.to_owned(),
                source,
            })
    }

    /// Every entry of every world instance, grouped by world in sorted order,
    /// each group in index order.
    pub fn export(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let state = self.read_state()?;
        let mut worlds: Vec<&String> = state.streams.keys().collect();
        worlds.sort();
        Ok(worlds
            .into_iter()
            .flat_map(|world| state.stream(world).iter().map(|e| LedgerEntry::clone(e)))
            .collect())
    }

    /// Every entry of one world instance, in index order.
    pub fn export_world(&self, world_instance_id: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
        let state = self.read_state()?;
        Ok(state
            .stream(world_instance_id)
            .iter()
            .map(|e| LedgerEntry::clone(e))
            .collect())
    }

    /// Load previously exported entries.
    ///
    /// Entries are grouped by world instance and each group is verified as a
    /// complete chain before anything is stored. If any group fails, nothing
    /// changes. Otherwise each restored world instance replaces whatever the
    /// ledger held for it. Returns the number of entries restored.
    pub fn restore(&self, entries: Vec<LedgerEntry>) -> Result<usize, LedgerError> {
        let mut grouped: BTreeMap<String, Vec<Arc<LedgerEntry>>> = BTreeMap::new();
        for entry in entries {
            grouped
                .entry(entry.world_instance_id().to_owned())
                .or_default()
                .push(Arc::new(entry));
        }

        let verifier = ChainVerifier::new(self.hasher);
        for (world, stream) in &grouped {
            verifier
                .verify_chain(stream)
                .map_err(|source| LedgerError::ChainViolation {
                    world: world.clone(),
                    source,
                })?;
        }

        let mut state = self.write_state()?;
        let mut restored = 0;
        for (world, stream) in grouped {
            debug!(world = %world, entries = stream.len(), "restored world instance");
            restored += stream.len();
            state.streams.insert(world, stream);
        }
        info!(entries = restored, "ledger restored");
        Ok(restored)
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.inner
            .read()
            .map_err(|_| LedgerError::LockPoisoned("read"))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, LedgerError> {
        self.inner
            .write()
            .map_err(|_| LedgerError::LockPoisoned("write"))
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

fn require(value: &str, field: &'static str) -> Result<(), LedgerError> {
    if value.is_empty() {
        return Err(LedgerError::MissingField(field));
    }
    Ok(())
}

impl LedgerWriter for Ledger {
    fn append(&self, draft: EventDraft) -> Result<Arc<LedgerEntry>, LedgerError> {
        require(&draft.world_instance_id, "worldInstanceId")?;
        require(&draft.actor_id, "actorId")?;
        require(&draft.event_type, "type")?;

        if draft.has_ledger_fields() {
            warn!(
                world = %draft.world_instance_id,
                event_id = ?draft.id,
                "discarding caller-supplied eventIndex/prevHash/hash"
            );
        }
        let mutation_class = draft.mutation_class.unwrap_or(MutationClass::StateChange);

        let mut state = self.write_state()?;
        let world = draft.world_instance_id;
        let stream = state.stream(&world);
        let last = stream.last();

        let last_timestamp = last.map(|e| e.timestamp());
        let timestamp = match (draft.timestamp, last_timestamp) {
            (None, _) => next_timestamp(last_timestamp),
            (Some(got), Some(last)) if got < last => {
                return Err(LedgerError::NonMonotonicTimestamp { world, last, got });
            }
            (Some(got), _) => got,
        };

        let event_index = last.map_or(1, |e| e.event_index() + 1);
        let prev_hash = last.map(|e| e.hash());

        let payload = match draft.payload {
            raw if raw.is_absent() => None,
            raw => Some(raw.into_value()?),
        };

        if stream.iter().any(|e| e.event_index() == event_index) {
            return Err(LedgerError::DuplicateIndex {
                world,
                index: event_index,
            });
        }

        let contiguity = ContiguityReport::from_indices(
            &world,
            stream
                .iter()
                .map(|e| e.event_index())
                .chain(std::iter::once(event_index)),
        );
        if contiguity.has_gaps() {
            if self.config.strict_contiguity {
                return Err(LedgerError::IndexGapDetected {
                    world,
                    gaps: contiguity.gaps,
                });
            }
            self.tolerated_gaps.fetch_add(1, Ordering::Relaxed);
            warn!(
                world = %world,
                index = event_index,
                gaps = ?contiguity.gaps,
                "tolerating event index gap"
            );
        }

        let header = EntryHeader {
            id: draft.id,
            world_instance_id: world,
            actor_id: draft.actor_id,
            event_type: draft.event_type,
            payload,
            timestamp,
            template_origin: draft.template_origin,
            mutation_class,
            event_index,
            prev_hash,
        };
        let hash = self.hasher.hash_header(&header);
        let entry = Arc::new(LedgerEntry::seal(header, hash));

        debug!(
            world = %entry.world_instance_id(),
            index = event_index,
            hash = %hash.short_hex(),
            "appended entry"
        );
        state
            .streams
            .entry(entry.world_instance_id().to_owned())
            .or_default()
            .push(Arc::clone(&entry));
        Ok(entry)
    }

    fn truncate(&self, world_instance_id: &str, keep: usize) -> Result<usize, LedgerError> {
        let mut state = self.write_state()?;
        let removed = match state.streams.get_mut(world_instance_id) {
            Some(stream) => {
                let removed = stream.len().saturating_sub(keep);
                stream.truncate(keep);
                removed
            }
            None => 0,
        };
        if keep == 0 {
            state.streams.remove(world_instance_id);
        }
        debug!(world = %world_instance_id, keep, removed, "truncated world instance");
        Ok(removed)
    }

    fn clear(&self) -> Result<(), LedgerError> {
        let mut state = self.write_state()?;
        state.streams.clear();
        self.tolerated_gaps.store(0, Ordering::Relaxed);
        debug!("cleared ledger");
        Ok(())
    }
}

impl LedgerReader for Ledger {
    fn entries_for(&self, world_instance_id: &str) -> Result<Vec<Arc<LedgerEntry>>, LedgerError> {
        Ok(self.read_state()?.stream(world_instance_id).to_vec())
    }

    fn replayable_entries_for(
        &self,
        world_instance_id: &str,
    ) -> Result<Vec<Arc<LedgerEntry>>, LedgerError> {
        Ok(self
            .read_state()?
            .stream(world_instance_id)
            .iter()
            .filter(|e| e.is_replayable())
            .cloned()
            .collect())
    }

    fn head(&self, world_instance_id: &str) -> Result<Option<Arc<LedgerEntry>>, LedgerError> {
        Ok(self.read_state()?.stream(world_instance_id).last().cloned())
    }

    fn entry_count(&self, world_instance_id: &str) -> Result<u64, LedgerError> {
        Ok(self.read_state()?.stream(world_instance_id).len() as u64)
    }

    fn world_instances(&self) -> Result<Vec<String>, LedgerError> {
        let state = self.read_state()?;
        let mut worlds: Vec<String> = state.streams.keys().cloned().collect();
        worlds.sort();
        Ok(worlds)
    }
}

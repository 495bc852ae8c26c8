use std::collections::BTreeMap;

use wel_types::{LedgerEntry, MutationClass, Value};

use crate::error::LedgerError;
use crate::traits::LedgerReader;

/// A fold over a world instance's replayable history.
pub trait Reducer {
    type State: Default;

    fn apply(&mut self, state: &mut Self::State, entry: &LedgerEntry);
}

/// Result of replaying a world instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayResult<S> {
    pub world_instance_id: String,
    /// Entries fed to the reducer.
    pub applied: u64,
    /// `REJECTION` entries past the resume point left out of the fold.
    pub skipped_rejections: u64,
    /// Index of the last entry fed to the reducer.
    pub last_index: Option<u64>,
    pub state: S,
}

/// Deterministic replay driver. Reducers only ever see the replayable view.
pub struct ReplayEngine;

impl ReplayEngine {
    pub fn replay<R, F>(
        reader: &R,
        world_instance_id: &str,
        reducer: &mut F,
    ) -> Result<ReplayResult<F::State>, LedgerError>
    where
        R: LedgerReader + ?Sized,
        F: Reducer,
    {
        Self::replay_onto(reader, world_instance_id, F::State::default(), 0, reducer)
    }

    /// Resume a replay from a state already folded up to `after_index`.
    pub fn replay_onto<R, F>(
        reader: &R,
        world_instance_id: &str,
        mut state: F::State,
        after_index: u64,
        reducer: &mut F,
    ) -> Result<ReplayResult<F::State>, LedgerError>
    where
        R: LedgerReader + ?Sized,
        F: Reducer,
    {
        let entries = reader.entries_for(world_instance_id)?;

        let mut applied = 0u64;
        let mut skipped_rejections = 0u64;
        let mut last_index = None;
        for entry in entries.iter().filter(|e| e.event_index() > after_index) {
            if !entry.is_replayable() {
                skipped_rejections += 1;
                continue;
            }
            reducer.apply(&mut state, entry);
            applied += 1;
            last_index = Some(entry.event_index());
        }

        Ok(ReplayResult {
            world_instance_id: world_instance_id.to_owned(),
            applied,
            skipped_rejections,
            last_index,
            state,
        })
    }
}

/// Merges the map payloads of `STATE_CHANGE` entries key by key, later
/// entries overwriting earlier ones. `SYSTEM` and `NARRATIVE` entries are
/// seen but do not touch the state.
#[derive(Clone, Copy, Debug, Default)]
pub struct PayloadMergeReducer;

impl Reducer for PayloadMergeReducer {
    type State = BTreeMap<String, Value>;

    fn apply(&mut self, state: &mut Self::State, entry: &LedgerEntry) {
        if entry.mutation_class() != MutationClass::StateChange {
            return;
        }
        if let Some(fields) = entry.payload().and_then(Value::as_map) {
            for (key, value) in fields {
                state.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use wel_types::{EventDraft, RawValue};

    use crate::memory::Ledger;
    use crate::traits::LedgerWriter;

    use super::*;

    fn set(ledger: &Ledger, id: &str, key: &str, value: i32, class: MutationClass) {
        ledger
            .append(
                EventDraft::new(id, "w", "actor", "SET")
                    .with_payload(RawValue::map().with(key, value))
                    .class(class),
            )
            .unwrap();
    }

    #[derive(Default)]
    struct Collect;

    impl Reducer for Collect {
        type State = Vec<String>;

        fn apply(&mut self, state: &mut Self::State, entry: &LedgerEntry) {
            state.extend(entry.id().map(str::to_owned));
        }
    }

    #[test]
    fn replay_skips_rejections() {
        let ledger = Ledger::default();
        set(&ledger, "a", "hp", 10, MutationClass::StateChange);
        set(&ledger, "b", "hp", 0, MutationClass::Rejection);
        set(&ledger, "c", "mp", 5, MutationClass::StateChange);

        let result = ReplayEngine::replay(&ledger, "w", &mut PayloadMergeReducer).unwrap();
        assert_eq!(result.applied, 2);
        assert_eq!(result.skipped_rejections, 1);
        assert_eq!(result.last_index, Some(3));
        assert_eq!(result.state.get("hp"), Some(&Value::from(10)));
        assert_eq!(result.state.get("mp"), Some(&Value::from(5)));
    }

    #[test]
    fn merge_reducer_ignores_non_state_changes() {
        let ledger = Ledger::default();
        set(&ledger, "a", "hp", 10, MutationClass::StateChange);
        set(&ledger, "b", "hp", 99, MutationClass::Narrative);
        set(&ledger, "c", "hp", 98, MutationClass::System);

        let result = ReplayEngine::replay(&ledger, "w", &mut PayloadMergeReducer).unwrap();
        assert_eq!(result.applied, 3);
        assert_eq!(result.state.get("hp"), Some(&Value::from(10)));
    }

    #[test]
    fn replay_visits_entries_in_index_order() {
        let ledger = Ledger::default();
        for id in ["x", "y", "z"] {
            set(&ledger, id, "k", 1, MutationClass::StateChange);
        }
        let result = ReplayEngine::replay(&ledger, "w", &mut Collect).unwrap();
        assert_eq!(result.state, vec!["x", "y", "z"]);
    }

    #[test]
    fn replay_onto_resumes_after_index() {
        let ledger = Ledger::default();
        set(&ledger, "a", "hp", 10, MutationClass::StateChange);
        let partial = ReplayEngine::replay(&ledger, "w", &mut PayloadMergeReducer).unwrap();

        set(&ledger, "b", "hp", 7, MutationClass::StateChange);
        set(&ledger, "c", "mp", 3, MutationClass::StateChange);

        let resumed = ReplayEngine::replay_onto(
            &ledger,
            "w",
            partial.state,
            partial.last_index.unwrap_or(0),
            &mut PayloadMergeReducer,
        )
        .unwrap();
        let full = ReplayEngine::replay(&ledger, "w", &mut PayloadMergeReducer).unwrap();

        assert_eq!(resumed.applied, 2);
        assert_eq!(resumed.state, full.state);
    }

    #[test]
    fn resumed_replay_counts_only_later_rejections() {
        let ledger = Ledger::default();
        set(&ledger, "a", "hp", 10, MutationClass::StateChange);
        set(&ledger, "b", "hp", 0, MutationClass::Rejection);
        let partial = ReplayEngine::replay(&ledger, "w", &mut PayloadMergeReducer).unwrap();
        assert_eq!(partial.skipped_rejections, 1);

        set(&ledger, "c", "hp", 1, MutationClass::Rejection);
        set(&ledger, "d", "mp", 3, MutationClass::StateChange);

        let resumed = ReplayEngine::replay_onto(&ledger, "w", partial.state, 2, &mut PayloadMergeReducer)
            .unwrap();
        assert_eq!(resumed.applied, 1);
        assert_eq!(resumed.skipped_rejections, 1);
        assert_eq!(resumed.last_index, Some(4));
        assert_eq!(resumed.state.get("hp"), Some(&Value::from(10)));
    }

    #[test]
    fn replay_empty_world() {
        let ledger = Ledger::default();
        let result = ReplayEngine::replay(&ledger, "nowhere", &mut PayloadMergeReducer).unwrap();
        assert_eq!(result.applied, 0);
        assert_eq!(result.skipped_rejections, 0);
        assert_eq!(result.last_index, None);
        assert!(result.state.is_empty());
    }

    #[test]
    fn replay_is_deterministic() {
        let build = || {
            let ledger = Ledger::default();
            set(&ledger, "a", "hp", 10, MutationClass::StateChange);
            set(&ledger, "b", "hp", 4, MutationClass::Rejection);
            set(&ledger, "c", "gold", 3, MutationClass::StateChange);
            ReplayEngine::replay(&ledger, "w", &mut PayloadMergeReducer)
                .unwrap()
                .state
        };
        assert_eq!(build(), build());
    }
}

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use wel_crypto::{ChainError, ChainVerifier};
use wel_types::LedgerEntry;

use crate::error::LedgerError;
use crate::traits::LedgerReader;

/// Shape of a world instance's index set: which indices are missing from
/// `1..=max_index`, and which appear more than once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContiguityReport {
    pub world_instance_id: String,
    pub max_index: u64,
    /// Missing index runs, ascending.
    pub gaps: Vec<RangeInclusive<u64>>,
    pub duplicates: Vec<u64>,
}

impl ContiguityReport {
    pub fn from_indices(
        world_instance_id: &str,
        indices: impl IntoIterator<Item = u64>,
    ) -> Self {
        let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
        for index in indices {
            *counts.entry(index).or_default() += 1;
        }

        let mut gaps = Vec::new();
        let mut expected = 1u64;
        for &index in counts.keys() {
            if index > expected {
                gaps.push(expected..=index - 1);
            }
            expected = expected.max(index.saturating_add(1));
        }

        Self {
            world_instance_id: world_instance_id.to_owned(),
            max_index: counts.keys().next_back().copied().unwrap_or(0),
            gaps,
            duplicates: counts
                .iter()
                .filter(|(_, &n)| n > 1)
                .map(|(&index, _)| index)
                .collect(),
        }
    }

    pub fn has_gaps(&self) -> bool {
        !self.gaps.is_empty()
    }

    /// Returns `true` if the indices are exactly `1..=max_index`.
    pub fn is_contiguous(&self) -> bool {
        self.gaps.is_empty() && self.duplicates.is_empty()
    }
}

/// Result of auditing one world instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub world_instance_id: String,
    pub entry_count: u64,
    pub replayable_count: u64,
    pub contiguity: ContiguityReport,
    pub violations: Vec<ChainError>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty() && self.contiguity.is_contiguous()
    }
}

/// Audit-side integrity validator.
///
/// Re-derives every hash independently of the ledger that stored it, so it
/// can be pointed at entries loaded from any source.
pub struct StreamValidator;

impl StreamValidator {
    /// Audit a sequence of entries belonging to one world instance.
    pub fn validate_entries<E: Borrow<LedgerEntry>>(
        world_instance_id: &str,
        entries: &[E],
    ) -> ValidationReport {
        let entries: Vec<&LedgerEntry> = entries
            .iter()
            .map(Borrow::<LedgerEntry>::borrow)
            .collect();
        ValidationReport {
            world_instance_id: world_instance_id.to_owned(),
            entry_count: entries.len() as u64,
            replayable_count: entries.iter().filter(|e| e.is_replayable()).count() as u64,
            contiguity: ContiguityReport::from_indices(
                world_instance_id,
                entries.iter().map(|e| e.event_index()),
            ),
            violations: ChainVerifier::default().violations(&entries),
        }
    }

    /// Audit a single world instance held by a reader.
    pub fn validate_stream<R: LedgerReader + ?Sized>(
        reader: &R,
        world_instance_id: &str,
    ) -> Result<ValidationReport, LedgerError> {
        let entries = reader.entries_for(world_instance_id)?;
        Ok(Self::validate_entries(world_instance_id, &entries))
    }

    /// Audit every world instance held by a reader.
    pub fn validate_all<R: LedgerReader + ?Sized>(
        reader: &R,
    ) -> Result<Vec<ValidationReport>, LedgerError> {
        reader
            .world_instances()?
            .iter()
            .map(|world| Self::validate_stream(reader, world))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use wel_types::{EventDraft, MutationClass, RawValue};

    use crate::memory::Ledger;
    use crate::traits::LedgerWriter;

    use super::*;

    fn draft(id: &str, world: &str, ts: i64) -> EventDraft {
        EventDraft::new(id, world, "actor", "T")
            .with_payload(RawValue::map().with("id", id))
            .at(ts)
    }

    #[test]
    fn contiguous_indices() {
        let report = ContiguityReport::from_indices("w", [1, 2, 3]);
        assert!(report.is_contiguous());
        assert_eq!(report.max_index, 3);
    }

    #[test]
    fn empty_index_set_is_contiguous() {
        let report = ContiguityReport::from_indices("w", []);
        assert!(report.is_contiguous());
        assert_eq!(report.max_index, 0);
    }

    #[test]
    fn gaps_are_reported_as_runs() {
        let report = ContiguityReport::from_indices("w", [1, 4, 5, 8]);
        assert_eq!(report.gaps, vec![2..=3, 6..=7]);
        assert!(report.has_gaps());
        assert!(!report.is_contiguous());
    }

    #[test]
    fn missing_first_index_is_a_gap() {
        let report = ContiguityReport::from_indices("w", [2]);
        assert_eq!(report.gaps, vec![1..=1]);
    }

    #[test]
    fn duplicates_are_reported() {
        let report = ContiguityReport::from_indices("w", [1, 2, 2, 3]);
        assert_eq!(report.duplicates, vec![2]);
        assert!(!report.has_gaps());
        assert!(!report.is_contiguous());
    }

    #[test]
    fn huge_index_does_not_enumerate_the_gap() {
        let report = ContiguityReport::from_indices("w", [1, u64::MAX]);
        assert_eq!(report.gaps, vec![2..=u64::MAX - 1]);
    }

    #[test]
    fn valid_stream_passes() {
        let ledger = Ledger::default();
        ledger.append(draft("a", "w", 1)).unwrap();
        ledger
            .append(draft("b", "w", 2).class(MutationClass::Rejection))
            .unwrap();

        let report = StreamValidator::validate_stream(&ledger, "w").unwrap();
        assert!(report.is_valid());
        assert_eq!(report.entry_count, 2);
        assert_eq!(report.replayable_count, 1);
    }

    #[test]
    fn validate_all_checks_multiple_worlds() {
        let ledger = Ledger::default();
        ledger.append(draft("a", "w1", 1)).unwrap();
        ledger.append(draft("b", "w2", 1)).unwrap();

        let reports = StreamValidator::validate_all(&ledger).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(ValidationReport::is_valid));
    }

    #[test]
    fn empty_world_is_valid() {
        let ledger = Ledger::default();
        let report = StreamValidator::validate_stream(&ledger, "nowhere").unwrap();
        assert!(report.is_valid());
        assert_eq!(report.entry_count, 0);
    }

    #[test]
    fn tampered_export_is_flagged() {
        let ledger = Ledger::default();
        ledger.append(draft("a", "w", 1)).unwrap();
        ledger.append(draft("b", "w", 2)).unwrap();

        let mut json = serde_json::to_value(ledger.export().unwrap()).unwrap();
        json[1]["payload"]["id"] = serde_json::json!("forged");
        let entries: Vec<LedgerEntry> = serde_json::from_value(json).unwrap();

        let report = StreamValidator::validate_entries("w", &entries);
        assert!(!report.is_valid());
        assert_eq!(report.violations, vec![ChainError::HashMismatch { index: 2 }]);
    }
}

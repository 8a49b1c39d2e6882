// 💾 Commit Writer - apply batch totals to the collection
//
// Mode is chosen once per batch:
//   add     → quantities increment, touched cards get a fresh needs-placement mark
//   replace → quantities present in the batch overwrite, placement untouched

use crate::aggregate::AggregateEntry;
use crate::ownership::{OwnershipRecord, OwnershipStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    Add,
    Replace,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::Add => "add",
            ImportMode::Replace => "replace",
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add" => Ok(ImportMode::Add),
            "replace" => Ok(ImportMode::Replace),
            other => Err(format!("Unknown import mode: {} (expected add or replace)", other)),
        }
    }
}

/// Apply one entry to one (possibly fresh) record. Pure; `now` is injected.
pub fn apply_aggregate(
    mut record: OwnershipRecord,
    entry: &AggregateEntry,
    mode: ImportMode,
    now: DateTime<Utc>,
) -> OwnershipRecord {
    match mode {
        ImportMode::Add => {
            record.quantity = record.quantity.saturating_add(entry.regular_quantity);
            record.foil_quantity = record.foil_quantity.saturating_add(entry.foil_quantity);
            if entry.regular_quantity > 0 || entry.foil_quantity > 0 {
                record.needs_placement_at = Some(now);
            }
        }
        ImportMode::Replace => {
            if entry.has_regular {
                record.quantity = entry.regular_quantity;
            }
            if entry.has_foil {
                record.foil_quantity = entry.foil_quantity;
            }
        }
    }
    record
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitSummary {
    /// Cards whose record was saved
    pub cards_written: usize,

    /// Copies written (regular + foil)
    pub imported: u64,

    /// Foil subset of `imported`
    pub foils_imported: u64,

    pub errors: Vec<String>,
}

pub struct CommitWriter<'a> {
    store: &'a dyn OwnershipStore,
    mode: ImportMode,
}

impl<'a> CommitWriter<'a> {
    pub fn new(store: &'a dyn OwnershipStore, mode: ImportMode) -> Self {
        CommitWriter { store, mode }
    }

    pub fn mode(&self) -> ImportMode {
        self.mode
    }

    /// Write every entry; one failed card never stops the others
    pub fn commit(&self, entries: &[AggregateEntry]) -> CommitSummary {
        let now = Utc::now();
        let mut summary = CommitSummary::default();

        for entry in entries {
            match self.commit_entry(entry, now) {
                Ok(()) => {
                    summary.cards_written += 1;
                    summary.imported += entry.total();
                    summary.foils_imported += entry.foil_quantity;
                }
                Err(e) => {
                    warn!(card = %entry.card_id, error = %e, "failed to save card");
                    summary
                        .errors
                        .push(format!("Failed to save card {}: {:#}", entry.card_id, e));
                }
            }
        }

        summary
    }

    fn commit_entry(&self, entry: &AggregateEntry, now: DateTime<Utc>) -> Result<()> {
        let record = self
            .store
            .get(&entry.card_id)?
            .unwrap_or_else(|| OwnershipRecord::new(&entry.card_id));

        let updated = apply_aggregate(record, entry, self.mode, now);
        self.store.upsert(&updated)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::ownership::SqliteOwnership;
    use chrono::TimeZone;
    use rusqlite::Connection;

    fn entry(id: &str, regular: Option<u64>, foil: Option<u64>) -> AggregateEntry {
        AggregateEntry {
            card_id: id.to_string(),
            regular_quantity: regular.unwrap_or(0),
            foil_quantity: foil.unwrap_or(0),
            has_regular: regular.is_some(),
            has_foil: foil.is_some(),
        }
    }

    fn existing(quantity: u64, foil_quantity: u64) -> OwnershipRecord {
        OwnershipRecord {
            card_id: "id-1".to_string(),
            quantity,
            foil_quantity,
            needs_placement_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_add_increments_and_marks_placement() {
        let now = Utc::now();
        let record = apply_aggregate(
            existing(1, 1),
            &entry("id-1", Some(2), Some(3)),
            ImportMode::Add,
            now,
        );

        assert_eq!(record.quantity, 3);
        assert_eq!(record.foil_quantity, 4);
        assert_eq!(record.needs_placement_at, Some(now));
    }

    #[test]
    fn test_add_with_zero_copies_keeps_placement() {
        let before = existing(1, 0);
        let record = apply_aggregate(
            before.clone(),
            &entry("id-1", Some(0), None),
            ImportMode::Add,
            Utc::now(),
        );

        assert_eq!(record, before);
    }

    #[test]
    fn test_replace_overwrites_only_present_fields() {
        let before = existing(5, 10);
        let record = apply_aggregate(
            before.clone(),
            &entry("id-1", None, Some(2)),
            ImportMode::Replace,
            Utc::now(),
        );

        assert_eq!(record.quantity, 5);
        assert_eq!(record.foil_quantity, 2);
        assert_eq!(record.needs_placement_at, before.needs_placement_at);
    }

    #[test]
    fn test_replace_never_sets_placement() {
        let record = apply_aggregate(
            OwnershipRecord::new("id-1"),
            &entry("id-1", Some(4), None),
            ImportMode::Replace,
            Utc::now(),
        );

        assert_eq!(record.quantity, 4);
        assert!(record.needs_placement_at.is_none());
    }

    #[test]
    fn test_replace_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let store = SqliteOwnership::new(&conn);
        store.upsert(&existing(5, 10)).unwrap();

        let writer = CommitWriter::new(&store, ImportMode::Replace);
        let entries = vec![entry("id-1", Some(3), Some(1)), entry("id-2", Some(2), None)];

        writer.commit(&entries);
        let once = (store.get("id-1").unwrap(), store.get("id-2").unwrap());
        writer.commit(&entries);
        let twice = (store.get("id-1").unwrap(), store.get("id-2").unwrap());

        assert_eq!(once, twice);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_add_is_associative_across_batches() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let store = SqliteOwnership::new(&conn);
        let writer = CommitWriter::new(&store, ImportMode::Add);

        writer.commit(&[entry("id-1", Some(2), None)]);
        writer.commit(&[entry("id-1", Some(3), None)]);

        assert_eq!(store.get("id-1").unwrap().unwrap().quantity, 5);
    }

    struct BrokenStore;

    impl OwnershipStore for BrokenStore {
        fn get(&self, _card_id: &str) -> Result<Option<OwnershipRecord>> {
            Ok(None)
        }

        fn upsert(&self, record: &OwnershipRecord) -> Result<()> {
            if record.card_id == "bad" {
                anyhow::bail!("disk full");
            }
            Ok(())
        }
    }

    #[test]
    fn test_save_failure_is_collected_not_fatal() {
        let writer = CommitWriter::new(&BrokenStore, ImportMode::Add);
        let summary = writer.commit(&[
            entry("bad", Some(1), None),
            entry("good", Some(2), Some(1)),
        ]);

        assert_eq!(summary.cards_written, 1);
        assert_eq!(summary.imported, 3);
        assert_eq!(summary.foils_imported, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].contains("bad"));
        assert!(summary.errors[0].contains("disk full"));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("ADD".parse::<ImportMode>().unwrap(), ImportMode::Add);
        assert_eq!("replace".parse::<ImportMode>().unwrap(), ImportMode::Replace);
        assert!("merge".parse::<ImportMode>().is_err());
    }
}

// 📦 Ownership Store - how many copies of each canonical card we own

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub card_id: String,
    pub quantity: u64,
    pub foil_quantity: u64,

    /// Set when new physical copies still have to be filed into a binder
    pub needs_placement_at: Option<DateTime<Utc>>,
}

impl OwnershipRecord {
    /// Fresh, unowned record (created lazily on first import)
    pub fn new(card_id: impl Into<String>) -> Self {
        OwnershipRecord {
            card_id: card_id.into(),
            quantity: 0,
            foil_quantity: 0,
            needs_placement_at: None,
        }
    }
}

pub trait OwnershipStore {
    fn get(&self, card_id: &str) -> Result<Option<OwnershipRecord>>;

    fn upsert(&self, record: &OwnershipRecord) -> Result<()>;
}

// ============================================================================
// SQLITE IMPLEMENTATION
// ============================================================================

/// Ownership backed by the `collection_cards` table
pub struct SqliteOwnership<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteOwnership<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteOwnership { conn }
    }

    /// Number of distinct cards in the collection
    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM collection_cards", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl OwnershipStore for SqliteOwnership<'_> {
    fn get(&self, card_id: &str) -> Result<Option<OwnershipRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT card_id, quantity, foil_quantity, needs_placement_at
                 FROM collection_cards WHERE card_id = ?1",
                params![card_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("Failed to load ownership for card {}", card_id))?;

        let Some((card_id, quantity, foil_quantity, placement)) = row else {
            return Ok(None);
        };

        let needs_placement_at = placement
            .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
            .transpose()
            .with_context(|| format!("Invalid needs_placement_at for card {}", card_id))?;

        Ok(Some(OwnershipRecord {
            card_id,
            quantity: quantity.max(0) as u64,
            foil_quantity: foil_quantity.max(0) as u64,
            needs_placement_at,
        }))
    }

    fn upsert(&self, record: &OwnershipRecord) -> Result<()> {
        let quantity = i64::try_from(record.quantity).context("quantity out of range")?;
        let foil_quantity =
            i64::try_from(record.foil_quantity).context("foil quantity out of range")?;

        self.conn
            .execute(
                "INSERT INTO collection_cards (card_id, quantity, foil_quantity, needs_placement_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(card_id) DO UPDATE SET
                    quantity = excluded.quantity,
                    foil_quantity = excluded.foil_quantity,
                    needs_placement_at = excluded.needs_placement_at,
                    updated_at = CURRENT_TIMESTAMP",
                params![
                    record.card_id,
                    quantity,
                    foil_quantity,
                    record.needs_placement_at.map(|dt| dt.to_rfc3339()),
                ],
            )
            .with_context(|| format!("Failed to save card {}", record.card_id))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;

    #[test]
    fn test_upsert_then_get() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let store = SqliteOwnership::new(&conn);

        assert!(store.get("id-1").unwrap().is_none());

        let now = Utc::now();
        let mut record = OwnershipRecord::new("id-1");
        record.quantity = 2;
        record.needs_placement_at = Some(now);
        store.upsert(&record).unwrap();

        let loaded = store.get("id-1").unwrap().unwrap();
        assert_eq!(loaded.quantity, 2);
        assert_eq!(loaded.foil_quantity, 0);
        assert_eq!(
            loaded.needs_placement_at.map(|dt| dt.timestamp_micros()),
            Some(now.timestamp_micros())
        );

        record.foil_quantity = 4;
        record.needs_placement_at = None;
        store.upsert(&record).unwrap();

        let loaded = store.get("id-1").unwrap().unwrap();
        assert_eq!(loaded.foil_quantity, 4);
        assert!(loaded.needs_placement_at.is_none());
        assert_eq!(store.count().unwrap(), 1);
    }
}

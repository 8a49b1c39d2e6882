use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// Import event for the audit trail ("every committed batch is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImportEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub mode: String,
    pub files: Vec<String>,
    pub imported: u64,
    pub foils_imported: u64,
    pub skipped: u64,
    pub error_count: u64,
}

impl ImportEvent {
    pub fn new(
        mode: &str,
        files: Vec<String>,
        imported: u64,
        foils_imported: u64,
        skipped: u64,
        error_count: u64,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            mode: mode.to_string(),
            files,
            imported,
            foils_imported,
            skipped,
            error_count,
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Catalog: sets + canonical cards
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sets (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            card_count INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // rowid order doubles as the catalog's iteration order
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cards (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            set_code TEXT NOT NULL,
            collector_number TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Collection: ownership per canonical card
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS collection_cards (
            card_id TEXT PRIMARY KEY,
            quantity INTEGER NOT NULL DEFAULT 0,
            foil_quantity INTEGER NOT NULL DEFAULT 0,
            needs_placement_at TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Import events (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS import_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            mode TEXT NOT NULL,
            files TEXT NOT NULL,
            imported INTEGER NOT NULL,
            foils_imported INTEGER NOT NULL,
            skipped INTEGER NOT NULL,
            error_count INTEGER NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cards_set_number ON cards(set_code, collector_number)",
        [],
    )?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_cards_name ON cards(name)", [])?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_import_events_timestamp ON import_events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_import_event(conn: &Connection, event: &ImportEvent) -> Result<()> {
    let files_json = serde_json::to_string(&event.files)?;

    conn.execute(
        "INSERT INTO import_events (
            event_id, timestamp, mode, files, imported, foils_imported, skipped, error_count
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.mode,
            files_json,
            event.imported as i64,
            event.foils_imported as i64,
            event.skipped as i64,
            event.error_count as i64,
        ],
    )?;

    Ok(())
}

/// Get import events, most recent first
pub fn get_import_events(conn: &Connection) -> Result<Vec<ImportEvent>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, mode, files, imported, foils_imported, skipped, error_count
         FROM import_events
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map([], |row| {
            let timestamp_str: String = row.get(1)?;
            let files_json: String = row.get(3)?;

            Ok(ImportEvent {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc),
                mode: row.get(2)?,
                files: serde_json::from_str(&files_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                imported: row.get::<_, i64>(4)? as u64,
                foils_imported: row.get::<_, i64>(5)? as u64,
                skipped: row.get::<_, i64>(6)? as u64,
                error_count: row.get::<_, i64>(7)? as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// 📚 Catalog Store - canonical card entities
// The engine only ever READS cards by id/set/name and WRITES whole sets.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Separator between faces of a multi-faced card name ("Front // Back")
pub const FACE_SEPARATOR: &str = " // ";

// ============================================================================
// CORE TYPES
// ============================================================================

/// A catalog entry every import row resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalCard {
    /// Globally unique, stable identifier (Scryfall id)
    pub id: String,
    pub name: String,
    /// Always lowercase
    pub set_code: String,
    pub collector_number: String,
}

impl CanonicalCard {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        set_code: impl Into<String>,
        collector_number: impl Into<String>,
    ) -> Self {
        CanonicalCard {
            id: id.into(),
            name: name.into(),
            set_code: set_code.into().to_lowercase(),
            collector_number: collector_number.into(),
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CanonicalCard {
            id: row.get(0)?,
            name: row.get(1)?,
            set_code: row.get(2)?,
            collector_number: row.get(3)?,
        })
    }
}

/// Set metadata as stored in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSet {
    pub code: String,
    pub name: String,
    pub card_count: usize,
}

/// Front face of a possibly multi-faced name: "A // B" → "A"
pub fn front_face_of(name: &str) -> &str {
    name.split(FACE_SEPARATOR).next().unwrap_or(name).trim()
}

// ============================================================================
// STORE CONTRACT
// ============================================================================

/// CatalogStore - what the import engine needs from the local catalog
///
/// `find_by_name` is front-face aware: it matches a stored name equal to
/// `name`, or a stored name starting with `"<front face of name> // "`.
/// When several cards qualify, the first one in store iteration order wins.
pub trait CatalogStore {
    fn find_by_id(&self, id: &str) -> Result<Option<CanonicalCard>>;

    fn find_by_set_and_number(
        &self,
        set_code: &str,
        collector_number: &str,
    ) -> Result<Option<CanonicalCard>>;

    fn find_by_name(&self, name: &str, set_code: Option<&str>) -> Result<Option<CanonicalCard>>;

    fn has_set(&self, code: &str) -> Result<bool>;

    fn set_name(&self, code: &str) -> Result<Option<String>>;

    /// Register a set and its cards (upsert)
    fn insert_set(&self, set: &CatalogSet, cards: &[CanonicalCard]) -> Result<()>;
}

// ============================================================================
// SQLITE IMPLEMENTATION
// ============================================================================

/// Catalog backed by the `sets` and `cards` tables (see `db::setup_database`)
pub struct SqliteCatalog<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCatalog<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteCatalog { conn }
    }

    pub fn card_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl CatalogStore for SqliteCatalog<'_> {
    fn find_by_id(&self, id: &str) -> Result<Option<CanonicalCard>> {
        let card = self
            .conn
            .query_row(
                "SELECT id, name, set_code, collector_number FROM cards WHERE id = ?1",
                params![id],
                CanonicalCard::from_row,
            )
            .optional()
            .with_context(|| format!("Failed to look up card id {}", id))?;
        Ok(card)
    }

    fn find_by_set_and_number(
        &self,
        set_code: &str,
        collector_number: &str,
    ) -> Result<Option<CanonicalCard>> {
        let card = self
            .conn
            .query_row(
                "SELECT id, name, set_code, collector_number FROM cards
                 WHERE set_code = ?1 AND collector_number = ?2
                 ORDER BY rowid LIMIT 1",
                params![set_code.to_lowercase(), collector_number],
                CanonicalCard::from_row,
            )
            .optional()
            .with_context(|| {
                format!("Failed to look up card {} #{}", set_code, collector_number)
            })?;
        Ok(card)
    }

    fn find_by_name(&self, name: &str, set_code: Option<&str>) -> Result<Option<CanonicalCard>> {
        let prefix = format!("{}{}", front_face_of(name), FACE_SEPARATOR);

        // substr() keeps the prefix comparison case-sensitive, unlike LIKE
        let card = match set_code {
            Some(code) => self.conn.query_row(
                "SELECT id, name, set_code, collector_number FROM cards
                 WHERE (name = ?1 OR substr(name, 1, length(?2)) = ?2) AND set_code = ?3
                 ORDER BY rowid LIMIT 1",
                params![name, prefix, code.to_lowercase()],
                CanonicalCard::from_row,
            ),
            None => self.conn.query_row(
                "SELECT id, name, set_code, collector_number FROM cards
                 WHERE name = ?1 OR substr(name, 1, length(?2)) = ?2
                 ORDER BY rowid LIMIT 1",
                params![name, prefix],
                CanonicalCard::from_row,
            ),
        }
        .optional()
        .with_context(|| format!("Failed to look up card named {}", name))?;

        Ok(card)
    }

    fn has_set(&self, code: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sets WHERE code = ?1)
                 OR EXISTS(SELECT 1 FROM cards WHERE set_code = ?1)",
            params![code.to_lowercase()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn set_name(&self, code: &str) -> Result<Option<String>> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM sets WHERE code = ?1",
                params![code.to_lowercase()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    fn insert_set(&self, set: &CatalogSet, cards: &[CanonicalCard]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO sets (code, name, card_count) VALUES (?1, ?2, ?3)
             ON CONFLICT(code) DO UPDATE SET name = excluded.name, card_count = excluded.card_count",
            params![set.code.to_lowercase(), set.name, set.card_count as i64],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO cards (id, name, set_code, collector_number) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    set_code = excluded.set_code,
                    collector_number = excluded.collector_number",
            )?;
            for card in cards {
                stmt.execute(params![
                    card.id,
                    card.name,
                    card.set_code.to_lowercase(),
                    card.collector_number
                ])?;
            }
        }

        tx.commit()
            .with_context(|| format!("Failed to store set {}", set.code))?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let catalog = SqliteCatalog::new(&conn);
        catalog
            .insert_set(
                &CatalogSet {
                    code: "TST".to_string(),
                    name: "Test Set".to_string(),
                    card_count: 3,
                },
                &[
                    CanonicalCard::new("id-1", "Test Card", "TST", "1"),
                    CanonicalCard::new("id-2", "Delver of Secrets // Insectile Aberration", "tst", "2"),
                    CanonicalCard::new("id-3", "Shock", "tst", "3"),
                ],
            )
            .unwrap();
        catalog
            .insert_set(
                &CatalogSet {
                    code: "oth".to_string(),
                    name: "Other Set".to_string(),
                    card_count: 1,
                },
                &[CanonicalCard::new("id-4", "Shock", "oth", "7")],
            )
            .unwrap();
        conn
    }

    #[test]
    fn test_front_face_of() {
        assert_eq!(front_face_of("Delver of Secrets // Insectile Aberration"), "Delver of Secrets");
        assert_eq!(front_face_of("Shock"), "Shock");
        assert_eq!(front_face_of("  Shock  "), "Shock");
    }

    #[test]
    fn test_find_by_id() {
        let conn = seeded();
        let catalog = SqliteCatalog::new(&conn);

        let card = catalog.find_by_id("id-1").unwrap().unwrap();
        assert_eq!(card.name, "Test Card");
        assert_eq!(card.set_code, "tst");
        assert!(catalog.find_by_id("nope").unwrap().is_none());
    }

    #[test]
    fn test_find_by_set_and_number_is_case_insensitive_on_set() {
        let conn = seeded();
        let catalog = SqliteCatalog::new(&conn);

        let card = catalog.find_by_set_and_number("TsT", "3").unwrap().unwrap();
        assert_eq!(card.id, "id-3");
        assert!(catalog.find_by_set_and_number("tst", "99").unwrap().is_none());
    }

    #[test]
    fn test_find_by_name_front_face() {
        let conn = seeded();
        let catalog = SqliteCatalog::new(&conn);

        let card = catalog.find_by_name("Delver of Secrets", Some("tst")).unwrap().unwrap();
        assert_eq!(card.id, "id-2");

        // Full double-faced name also works
        let card = catalog
            .find_by_name("Delver of Secrets // Insectile Aberration", None)
            .unwrap()
            .unwrap();
        assert_eq!(card.id, "id-2");

        // Prefix must be an exact-case front face
        assert!(catalog.find_by_name("delver of secrets", None).unwrap().is_none());
        assert!(catalog.find_by_name("Delver", None).unwrap().is_none());
    }

    #[test]
    fn test_find_by_name_set_restriction_and_store_order() {
        let conn = seeded();
        let catalog = SqliteCatalog::new(&conn);

        let card = catalog.find_by_name("Shock", Some("OTH")).unwrap().unwrap();
        assert_eq!(card.id, "id-4");

        // No set: first match in insertion order
        let card = catalog.find_by_name("Shock", None).unwrap().unwrap();
        assert_eq!(card.id, "id-3");
    }

    #[test]
    fn test_has_set_and_set_name() {
        let conn = seeded();
        let catalog = SqliteCatalog::new(&conn);

        assert!(catalog.has_set("tst").unwrap());
        assert!(catalog.has_set("TST").unwrap());
        assert!(!catalog.has_set("new").unwrap());
        assert_eq!(catalog.set_name("tst").unwrap().as_deref(), Some("Test Set"));
        assert_eq!(catalog.set_name("new").unwrap(), None);
    }

    #[test]
    fn test_insert_set_is_upsert() {
        let conn = seeded();
        let catalog = SqliteCatalog::new(&conn);

        catalog
            .insert_set(
                &CatalogSet {
                    code: "tst".to_string(),
                    name: "Test Set (Renamed)".to_string(),
                    card_count: 1,
                },
                &[CanonicalCard::new("id-1", "Test Card", "tst", "1a")],
            )
            .unwrap();

        assert_eq!(catalog.card_count().unwrap(), 4);
        assert_eq!(catalog.find_by_id("id-1").unwrap().unwrap().collector_number, "1a");
        assert_eq!(
            catalog.set_name("tst").unwrap().as_deref(),
            Some("Test Set (Renamed)")
        );
    }
}

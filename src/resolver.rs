// 🎯 Catalog Resolver - raw export row → canonical card
// Four strategies tried in priority order, first hit wins.

use crate::catalog::{CanonicalCard, CatalogStore};
use crate::parser::RawImportRecord;
use anyhow::Result;
use serde::{Deserialize, Serialize};

// ============================================================================
// MATCH STRATEGY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStrategy {
    /// Exact lookup by the external (Scryfall) id
    ExternalId,

    /// Set code + collector number
    SetAndNumber,

    /// Front-face aware name, restricted to the row's set
    NameInSet,

    /// Front-face aware name, any set (first store match)
    NameOnly,
}

/// A matcher returns Ok(None) both when it doesn't apply to the row and
/// when it applies but finds nothing.
pub type MatcherFn = fn(&RawImportRecord, &dyn CatalogStore) -> Result<Option<CanonicalCard>>;

/// Priority order is the order of this list
pub const CASCADE: [(MatchStrategy, MatcherFn); 4] = [
    (MatchStrategy::ExternalId, match_external_id),
    (MatchStrategy::SetAndNumber, match_set_and_number),
    (MatchStrategy::NameInSet, match_name_in_set),
    (MatchStrategy::NameOnly, match_name_only),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub card: CanonicalCard,
    pub strategy: MatchStrategy,
}

// ============================================================================
// MATCHERS
// ============================================================================

fn match_external_id(
    record: &RawImportRecord,
    catalog: &dyn CatalogStore,
) -> Result<Option<CanonicalCard>> {
    let id = record.external_id.trim();
    if id.is_empty() {
        return Ok(None);
    }
    catalog.find_by_id(id)
}

fn match_set_and_number(
    record: &RawImportRecord,
    catalog: &dyn CatalogStore,
) -> Result<Option<CanonicalCard>> {
    let set_code = record.set_code_lower();
    let number = record.collector_number.trim();
    if set_code.is_empty() || number.is_empty() {
        return Ok(None);
    }
    catalog.find_by_set_and_number(&set_code, number)
}

fn match_name_in_set(
    record: &RawImportRecord,
    catalog: &dyn CatalogStore,
) -> Result<Option<CanonicalCard>> {
    let name = record.name.trim();
    let set_code = record.set_code_lower();
    if name.is_empty() || set_code.is_empty() {
        return Ok(None);
    }
    catalog.find_by_name(name, Some(&set_code))
}

fn match_name_only(
    record: &RawImportRecord,
    catalog: &dyn CatalogStore,
) -> Result<Option<CanonicalCard>> {
    let name = record.name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    // Several printings may share a name; take whatever the store yields first
    catalog.find_by_name(name, None)
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct CatalogResolver<'a> {
    catalog: &'a dyn CatalogStore,
}

impl<'a> CatalogResolver<'a> {
    pub fn new(catalog: &'a dyn CatalogStore) -> Self {
        CatalogResolver { catalog }
    }

    /// Resolve a record to a canonical card, if any strategy finds one
    pub fn resolve(&self, record: &RawImportRecord) -> Result<Option<CanonicalCard>> {
        Ok(self.resolve_with_strategy(record)?.map(|r| r.card))
    }

    /// Same as `resolve`, also reporting which strategy matched
    pub fn resolve_with_strategy(&self, record: &RawImportRecord) -> Result<Option<Resolution>> {
        self.resolve_using(record, &CASCADE)
    }

    /// Run only the given strategies, in the order given
    pub fn resolve_using(
        &self,
        record: &RawImportRecord,
        strategies: &[(MatchStrategy, MatcherFn)],
    ) -> Result<Option<Resolution>> {
        for (strategy, matcher) in strategies {
            if let Some(card) = matcher(record, self.catalog)? {
                return Ok(Some(Resolution {
                    card,
                    strategy: *strategy,
                }));
            }
        }
        Ok(None)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSet, SqliteCatalog};
    use crate::db::setup_database;
    use rusqlite::Connection;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        SqliteCatalog::new(&conn)
            .insert_set(
                &CatalogSet {
                    code: "tst".to_string(),
                    name: "Test Set".to_string(),
                    card_count: 3,
                },
                &[
                    CanonicalCard::new("id-1", "Test Card", "tst", "1"),
                    CanonicalCard::new("id-2", "Brightclimb Pathway // Grimclimb Pathway", "tst", "2"),
                    CanonicalCard::new("id-3", "Test Card", "tst", "3"),
                ],
            )
            .unwrap();
        conn
    }

    fn record(name: &str, set: &str, number: &str, id: &str) -> RawImportRecord {
        RawImportRecord {
            name: name.to_string(),
            set_code: set.to_string(),
            collector_number: number.to_string(),
            external_id: id.to_string(),
            ..RawImportRecord::default()
        }
    }

    #[test]
    fn test_external_id_wins() {
        let conn = seeded();
        let catalog = SqliteCatalog::new(&conn);
        let resolver = CatalogResolver::new(&catalog);

        // Set/number point at id-3 but the id is authoritative
        let r = resolver
            .resolve_with_strategy(&record("Test Card", "TST", "3", "id-1"))
            .unwrap()
            .unwrap();
        assert_eq!(r.card.id, "id-1");
        assert_eq!(r.strategy, MatchStrategy::ExternalId);
    }

    #[test]
    fn test_unknown_id_falls_through_to_set_and_number() {
        let conn = seeded();
        let catalog = SqliteCatalog::new(&conn);
        let resolver = CatalogResolver::new(&catalog);

        let r = resolver
            .resolve_with_strategy(&record("", "TST", "3", "missing-id"))
            .unwrap()
            .unwrap();
        assert_eq!(r.card.id, "id-3");
        assert_eq!(r.strategy, MatchStrategy::SetAndNumber);
    }

    #[test]
    fn test_name_in_set_supports_front_face() {
        let conn = seeded();
        let catalog = SqliteCatalog::new(&conn);
        let resolver = CatalogResolver::new(&catalog);

        let r = resolver
            .resolve_with_strategy(&record("Brightclimb Pathway", "tst", "", ""))
            .unwrap()
            .unwrap();
        assert_eq!(r.card.id, "id-2");
        assert_eq!(r.strategy, MatchStrategy::NameInSet);
    }

    #[test]
    fn test_name_only_takes_first_store_match() {
        let conn = seeded();
        let catalog = SqliteCatalog::new(&conn);
        let resolver = CatalogResolver::new(&catalog);

        let r = resolver
            .resolve_with_strategy(&record("Test Card", "", "", ""))
            .unwrap()
            .unwrap();
        assert_eq!(r.card.id, "id-1");
        assert_eq!(r.strategy, MatchStrategy::NameOnly);
    }

    #[test]
    fn test_name_in_unknown_set_falls_back_to_any_set() {
        let conn = seeded();
        let catalog = SqliteCatalog::new(&conn);
        let resolver = CatalogResolver::new(&catalog);

        let r = resolver
            .resolve_with_strategy(&record("Test Card", "zzz", "", ""))
            .unwrap()
            .unwrap();
        assert_eq!(r.strategy, MatchStrategy::NameOnly);
    }

    #[test]
    fn test_no_match() {
        let conn = seeded();
        let catalog = SqliteCatalog::new(&conn);
        let resolver = CatalogResolver::new(&catalog);

        assert!(resolver.resolve(&record("Nonexistent", "tst", "", "")).unwrap().is_none());
        assert!(resolver.resolve(&record("", "", "", "")).unwrap().is_none());
    }
}

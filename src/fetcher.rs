// 📥 Missing-Set Fetcher
// Before matching rows, make sure every set a batch mentions is in the catalog.
//
// Commit: download each missing set (one at a time, one failure never stops
// the rest). Preview: only report which sets WOULD be downloaded.

use crate::catalog::{CatalogSet, CatalogStore};
use crate::parser::RawImportRecord;
use crate::remote::RemoteCatalog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedSet {
    pub code: String,
    pub name: String,
    pub card_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchReport {
    /// Sets fetched and stored during this step
    pub downloaded: Vec<DownloadedSet>,

    /// Sets still absent from the catalog after this step
    pub missing: BTreeSet<String>,

    pub errors: Vec<String>,
}

/// Distinct, lowercased, non-blank set codes mentioned by a batch
pub fn distinct_set_codes(records: &[RawImportRecord]) -> BTreeSet<String> {
    records
        .iter()
        .map(|r| r.set_code_lower())
        .filter(|code| !code.is_empty())
        .collect()
}

/// Read-only variant: which of the batch's sets are absent from the catalog
///
/// Never writes and never calls the remote catalog.
pub fn check_missing_sets(catalog: &dyn CatalogStore, records: &[RawImportRecord]) -> FetchReport {
    let mut report = FetchReport::default();

    for code in distinct_set_codes(records) {
        match catalog.has_set(&code) {
            Ok(true) => {}
            Ok(false) => {
                report.missing.insert(code);
            }
            Err(e) => report
                .errors
                .push(format!("Failed to check set {}: {}", code, e)),
        }
    }

    report
}

pub struct MissingSetFetcher<'a> {
    catalog: &'a dyn CatalogStore,
    remote: &'a dyn RemoteCatalog,
}

impl<'a> MissingSetFetcher<'a> {
    pub fn new(catalog: &'a dyn CatalogStore, remote: &'a dyn RemoteCatalog) -> Self {
        MissingSetFetcher { catalog, remote }
    }

    /// Download every set the batch mentions that the catalog lacks
    pub fn fetch_missing(&self, records: &[RawImportRecord]) -> FetchReport {
        self.fetch_missing_except(records, &BTreeSet::new())
    }

    /// Same as `fetch_missing`, leaving out codes already tried in this batch.
    /// Skipped codes produce no remote call and no new error.
    pub fn fetch_missing_except(
        &self,
        records: &[RawImportRecord],
        already_failed: &BTreeSet<String>,
    ) -> FetchReport {
        let checked = check_missing_sets(self.catalog, records);

        let mut report = FetchReport {
            errors: checked.errors,
            ..FetchReport::default()
        };

        for code in checked.missing {
            if already_failed.contains(&code) {
                continue;
            }

            match self.download(&code) {
                Ok(downloaded) => {
                    info!(
                        set = %downloaded.code,
                        cards = downloaded.card_count,
                        "downloaded missing set"
                    );
                    report.downloaded.push(downloaded);
                }
                Err(e) => {
                    warn!(set = %code, error = %e, "failed to download set");
                    report
                        .errors
                        .push(format!("Failed to download set {}: {}", code, e));
                    report.missing.insert(code);
                }
            }
        }

        report
    }

    fn download(&self, code: &str) -> anyhow::Result<DownloadedSet> {
        let remote_set = self.remote.fetch_set(code)?;

        // Only this set's cards, even if the remote handed back others
        let cards: Vec<_> = remote_set
            .cards
            .into_iter()
            .filter(|c| c.set_code.eq_ignore_ascii_case(code))
            .collect();

        let set = CatalogSet {
            code: code.to_string(),
            name: remote_set.name,
            card_count: cards.len(),
        };
        self.catalog.insert_set(&set, &cards)?;

        Ok(DownloadedSet {
            code: set.code,
            name: set.name,
            card_count: set.card_count,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CanonicalCard, SqliteCatalog};
    use crate::db::setup_database;
    use crate::remote::RemoteSet;
    use rusqlite::Connection;
    use std::cell::RefCell;

    struct FakeRemote {
        calls: RefCell<Vec<String>>,
    }

    impl FakeRemote {
        fn new() -> Self {
            FakeRemote {
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl RemoteCatalog for FakeRemote {
        fn fetch_set(&self, code: &str) -> anyhow::Result<RemoteSet> {
            self.calls.borrow_mut().push(code.to_string());
            match code {
                "new" => Ok(RemoteSet {
                    code: "new".to_string(),
                    name: "New Set".to_string(),
                    cards: vec![
                        CanonicalCard::new("new-1", "Fresh Card", "new", "1"),
                        // A child-set printing that must not be stored
                        CanonicalCard::new("tnew-1", "Fresh Token", "tnew", "1"),
                    ],
                }),
                _ => anyhow::bail!("HTTP 404: set not found"),
            }
        }
    }

    fn record(set: &str) -> RawImportRecord {
        RawImportRecord {
            name: "Anything".to_string(),
            set_code: set.to_string(),
            ..RawImportRecord::default()
        }
    }

    fn catalog_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        SqliteCatalog::new(&conn)
            .insert_set(
                &CatalogSet {
                    code: "tst".to_string(),
                    name: "Test Set".to_string(),
                    card_count: 1,
                },
                &[CanonicalCard::new("id-1", "Test Card", "tst", "1")],
            )
            .unwrap();
        conn
    }

    #[test]
    fn test_distinct_set_codes() {
        let records = vec![record("TST"), record("tst"), record(""), record(" New ")];
        let codes: Vec<_> = distinct_set_codes(&records).into_iter().collect();
        assert_eq!(codes, vec!["new", "tst"]);
    }

    #[test]
    fn test_check_missing_is_read_only() {
        let conn = catalog_conn();
        let catalog = SqliteCatalog::new(&conn);

        let report = check_missing_sets(&catalog, &[record("TST"), record("new")]);

        assert_eq!(report.missing.into_iter().collect::<Vec<_>>(), vec!["new"]);
        assert!(report.downloaded.is_empty());
        assert_eq!(catalog.card_count().unwrap(), 1);
    }

    #[test]
    fn test_fetch_downloads_only_missing_sets() {
        let conn = catalog_conn();
        let catalog = SqliteCatalog::new(&conn);
        let remote = FakeRemote::new();

        let report = MissingSetFetcher::new(&catalog, &remote)
            .fetch_missing(&[record("tst"), record("NEW"), record("new")]);

        assert_eq!(*remote.calls.borrow(), vec!["new"]);
        assert_eq!(
            report.downloaded,
            vec![DownloadedSet {
                code: "new".to_string(),
                name: "New Set".to_string(),
                card_count: 1,
            }]
        );
        assert!(report.missing.is_empty());
        assert!(report.errors.is_empty());
        assert!(catalog.find_by_id("new-1").unwrap().is_some());
        assert!(catalog.find_by_id("tnew-1").unwrap().is_none());
    }

    #[test]
    fn test_fetch_failure_does_not_stop_other_sets() {
        let conn = catalog_conn();
        let catalog = SqliteCatalog::new(&conn);
        let remote = FakeRemote::new();

        let report = MissingSetFetcher::new(&catalog, &remote)
            .fetch_missing(&[record("bad"), record("new")]);

        assert_eq!(report.downloaded.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("bad"));
        assert!(report.missing.contains("bad"));
        assert!(catalog.has_set("new").unwrap());
    }

    #[test]
    fn test_codes_already_failed_are_not_retried() {
        let conn = catalog_conn();
        let catalog = SqliteCatalog::new(&conn);
        let remote = FakeRemote::new();
        let failed: BTreeSet<String> = ["bad".to_string()].into_iter().collect();

        let report = MissingSetFetcher::new(&catalog, &remote)
            .fetch_missing_except(&[record("bad"), record("new")], &failed);

        assert_eq!(*remote.calls.borrow(), vec!["new"]);
        assert!(report.errors.is_empty());
        assert_eq!(report.downloaded.len(), 1);
    }
}

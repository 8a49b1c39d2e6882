// 🚚 Batch Orchestrator - files in, ownership out
//
// Per file:   read → fetch missing sets → resolve rows
// Per batch:  aggregate all files together → commit (or render a preview)
//
// Files are processed one after another so sets downloaded for one file are
// already in the catalog when the next file resolves its rows.

use crate::aggregate::Aggregator;
use crate::catalog::CatalogStore;
use crate::commit::{CommitWriter, ImportMode};
use crate::config::ImportConfig;
use crate::db::{insert_import_event, ImportEvent};
use crate::fetcher::{check_missing_sets, DownloadedSet, MissingSetFetcher};
use crate::ownership::OwnershipStore;
use crate::parser::{file_name_of, read_file, ImportFormat, RawImportRecord};
use crate::preview::{PreviewInput, PreviewReport, PreviewReporter};
use crate::remote::RemoteCatalog;
use crate::rows::{MatchedRow, RowProcessor, SkippedRow};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Succeeded,
    /// Something was imported, but rows were skipped or errors reported
    SucceededWithWarnings,
    /// Nothing imported and at least one error
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Copies imported (regular + foil)
    pub imported: u64,
    /// Foil subset of `imported`
    pub foils_imported: u64,
    /// Rows skipped
    pub skipped: u64,
    pub errors: Vec<String>,
    pub missing_sets: BTreeSet<String>,
    pub downloaded_sets: Vec<DownloadedSet>,
    pub skipped_rows: Vec<SkippedRow>,
}

impl ImportResult {
    /// Fold another file's result into this one
    pub fn merge(&mut self, other: ImportResult) {
        self.imported += other.imported;
        self.foils_imported += other.foils_imported;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
        self.missing_sets.extend(other.missing_sets);
        self.downloaded_sets.extend(other.downloaded_sets);
        self.skipped_rows.extend(other.skipped_rows);
    }

    pub fn status(&self) -> BatchStatus {
        if self.imported == 0 && !self.errors.is_empty() {
            BatchStatus::Failed
        } else if !self.errors.is_empty() || self.skipped > 0 {
            BatchStatus::SucceededWithWarnings
        } else {
            BatchStatus::Succeeded
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() != BatchStatus::Failed
    }

    pub fn summary(&self) -> String {
        format!(
            "{} imported ({} foil), {} skipped, {} errors, {} sets downloaded",
            self.imported,
            self.foils_imported,
            self.skipped,
            self.errors.len(),
            self.downloaded_sets.len()
        )
    }
}

/// What staging does about sets the catalog doesn't have yet
enum SetFetch<'s> {
    /// Download them; codes that already failed in this batch aren't retried
    Download { failed: &'s mut BTreeSet<String> },
    /// Only report them (preview)
    ReportOnly,
}

/// One file after reading and resolving, before anything is committed
#[derive(Debug, Default)]
struct StagedFile {
    result: ImportResult,
    matched: Vec<MatchedRow>,
    unfetched_sets: BTreeSet<String>,
}

// ============================================================================
// IMPORT ENGINE
// ============================================================================

pub struct ImportEngine<'a> {
    catalog: &'a dyn CatalogStore,
    ownership: &'a dyn OwnershipStore,
    remote: &'a dyn RemoteCatalog,
    config: &'a ImportConfig,
    audit_log: Option<&'a Connection>,
}

impl<'a> ImportEngine<'a> {
    pub fn new(
        catalog: &'a dyn CatalogStore,
        ownership: &'a dyn OwnershipStore,
        remote: &'a dyn RemoteCatalog,
        config: &'a ImportConfig,
    ) -> Self {
        ImportEngine {
            catalog,
            ownership,
            remote,
            config,
            audit_log: None,
        }
    }

    /// Record one import event per committed batch in this database
    pub fn with_audit_log(mut self, conn: &'a Connection) -> Self {
        self.audit_log = Some(conn);
        self
    }

    /// Import a batch of files and write the totals to the collection
    pub fn commit(
        &self,
        paths: &[PathBuf],
        format: ImportFormat,
        mode: ImportMode,
    ) -> ImportResult {
        let mut result = ImportResult::default();
        let mut aggregator = Aggregator::new();

        let mut failed_sets = BTreeSet::new();
        let mut fetch = SetFetch::Download {
            failed: &mut failed_sets,
        };

        for path in paths {
            let staged = self.stage_file(path, format, &mut fetch);
            aggregator.extend(&staged.matched);
            result.merge(staged.result);
        }

        let summary = CommitWriter::new(self.ownership, mode).commit(&aggregator.into_entries());

        // Counts reflect what was actually saved, not just what matched
        result.imported = summary.imported;
        result.foils_imported = summary.foils_imported;
        result.errors.extend(summary.errors);

        self.record_event(paths, mode, &mut result);

        info!(
            mode = %mode,
            files = paths.len(),
            status = ?result.status(),
            "import finished: {}",
            result.summary()
        );

        result
    }

    /// Resolve a batch exactly like `commit` would, touching nothing
    pub fn preview(&self, paths: &[PathBuf], format: ImportFormat) -> PreviewReport {
        let mut matched = Vec::new();
        let mut combined = ImportResult::default();
        let mut unfetched = BTreeSet::new();

        for path in paths {
            let staged = self.stage_file(path, format, &mut SetFetch::ReportOnly);
            matched.extend(staged.matched);
            unfetched.extend(staged.unfetched_sets);
            combined.merge(staged.result);
        }

        PreviewReporter::new(self.catalog, &self.config.preview).render(PreviewInput {
            matched: &matched,
            skipped: &combined.skipped_rows,
            unfetched_sets: &unfetched,
            missing_sets: &combined.missing_sets,
            errors: &combined.errors,
        })
    }

    /// Read and resolve one file
    fn stage_file(
        &self,
        path: &Path,
        format: ImportFormat,
        fetch: &mut SetFetch<'_>,
    ) -> StagedFile {
        let file_name = file_name_of(path);

        let records = match read_file(path, format, &self.config.sqlite) {
            Ok(records) => records,
            Err(e) => {
                warn!(file = %file_name, error = %e, "skipping unreadable file");
                return StagedFile {
                    result: ImportResult {
                        errors: vec![e.for_file(&file_name)],
                        ..ImportResult::default()
                    },
                    ..StagedFile::default()
                };
            }
        };

        self.stage_records(&file_name, &records, fetch)
    }

    fn stage_records(
        &self,
        file_name: &str,
        records: &[RawImportRecord],
        fetch: &mut SetFetch<'_>,
    ) -> StagedFile {
        let mut staged = StagedFile::default();

        let (fetch_report, report_only) = match fetch {
            SetFetch::Download { failed } => {
                let report = MissingSetFetcher::new(self.catalog, self.remote)
                    .fetch_missing_except(records, &**failed);
                failed.extend(report.missing.iter().cloned());
                (report, false)
            }
            SetFetch::ReportOnly => (check_missing_sets(self.catalog, records), true),
        };

        staged.result.errors.extend(fetch_report.errors);
        staged.result.downloaded_sets = fetch_report.downloaded;

        let unfetched = if report_only {
            fetch_report.missing
        } else {
            BTreeSet::new()
        };
        let processed = RowProcessor::new(self.catalog)
            .with_pending_sets(&unfetched)
            .process_all(records);
        staged.unfetched_sets = unfetched;

        for row in &processed.matched {
            staged.result.imported += u64::from(row.quantity);
            if row.foil {
                staged.result.foils_imported += u64::from(row.quantity);
            }
        }
        staged.result.skipped = processed.skipped.len() as u64;
        staged.result.skipped_rows = processed.skipped;
        staged.result.missing_sets = processed.missing_sets;
        staged.result.errors.extend(processed.errors);
        staged.matched = processed.matched;

        info!(
            file = %file_name,
            rows = records.len(),
            matched = staged.matched.len(),
            skipped = staged.result.skipped,
            "processed file"
        );

        staged
    }

    fn record_event(&self, paths: &[PathBuf], mode: ImportMode, result: &mut ImportResult) {
        let Some(conn) = self.audit_log else {
            return;
        };

        let event = ImportEvent::new(
            mode.as_str(),
            paths.iter().map(|p| file_name_of(p)).collect(),
            result.imported,
            result.foils_imported,
            result.skipped,
            result.errors.len() as u64,
        );

        if let Err(e) = insert_import_event(conn, &event) {
            warn!(error = %e, "failed to record import event");
            result.errors.push(format!("Failed to record import event: {}", e));
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

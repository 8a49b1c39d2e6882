// 🧾 Row Processor - one raw record → matched or skipped

use crate::catalog::{CanonicalCard, CatalogStore};
use crate::parser::RawImportRecord;
use crate::quantity::{parse_foil, parse_quantity};
use crate::resolver::{CatalogResolver, Resolution, CASCADE};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

// ============================================================================
// ROW OUTCOMES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedRow {
    pub card: CanonicalCard,
    pub quantity: u32,
    pub foil: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// No catalog card matched the row
    NoMatch,

    /// No match, and the row's set isn't in the catalog at all
    UnresolvableSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub record: RawImportRecord,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Matched(MatchedRow),
    Skipped(SkippedRow),
}

/// Everything the processor learned from one file's rows
#[derive(Debug, Clone, Default)]
pub struct ProcessedRows {
    pub matched: Vec<MatchedRow>,
    pub skipped: Vec<SkippedRow>,

    /// Set codes of rows that failed to resolve (download suggestions)
    pub missing_sets: BTreeSet<String>,

    pub errors: Vec<String>,
}

// ============================================================================
// ROW PROCESSOR
// ============================================================================

pub struct RowProcessor<'a> {
    catalog: &'a dyn CatalogStore,
    resolver: CatalogResolver<'a>,
    pending_sets: Option<&'a BTreeSet<String>>,
}

impl<'a> RowProcessor<'a> {
    pub fn new(catalog: &'a dyn CatalogStore) -> Self {
        RowProcessor {
            catalog,
            resolver: CatalogResolver::new(catalog),
            pending_sets: None,
        }
    }

    /// Sets a commit would download first but that aren't in the catalog yet.
    ///
    /// Rows in these sets are matched by external id only. Falling back to
    /// number or name would find a printing from some other set, which is
    /// not the card a commit ends up writing.
    pub fn with_pending_sets(mut self, sets: &'a BTreeSet<String>) -> Self {
        self.pending_sets = Some(sets);
        self
    }

    pub fn process(&self, record: &RawImportRecord) -> Result<RowOutcome> {
        let quantity = parse_quantity(&record.quantity_raw);
        let foil = parse_foil(&record.foil_raw);

        if !record.has_identity() {
            return Ok(RowOutcome::Skipped(SkippedRow {
                record: record.clone(),
                reason: SkipReason::NoMatch,
            }));
        }

        let set_code = record.set_code_lower();
        let pending = self
            .pending_sets
            .is_some_and(|sets| sets.contains(&set_code));

        let resolution = if pending {
            self.resolver.resolve_using(record, &CASCADE[..1])?
        } else {
            self.resolver.resolve_with_strategy(record)?
        };

        match resolution {
            Some(Resolution { card, .. }) => Ok(RowOutcome::Matched(MatchedRow {
                card,
                quantity,
                foil,
            })),
            None => {
                let reason = if pending
                    || (!set_code.is_empty() && !self.catalog.has_set(&set_code)?)
                {
                    SkipReason::UnresolvableSet
                } else {
                    SkipReason::NoMatch
                };
                Ok(RowOutcome::Skipped(SkippedRow {
                    record: record.clone(),
                    reason,
                }))
            }
        }
    }

    /// Process a whole file's rows; store errors skip the row and are reported
    pub fn process_all(&self, records: &[RawImportRecord]) -> ProcessedRows {
        let mut processed = ProcessedRows::default();

        for record in records {
            match self.process(record) {
                Ok(RowOutcome::Matched(row)) => processed.matched.push(row),
                Ok(RowOutcome::Skipped(skipped)) => {
                    debug!(
                        file = %record.source_file,
                        line = record.line_number,
                        name = %record.name,
                        reason = ?skipped.reason,
                        "skipped row"
                    );
                    // Blank rows never attempted a lookup, so they suggest nothing
                    let set_code = record.set_code_lower();
                    if record.has_identity() && !set_code.is_empty() {
                        processed.missing_sets.insert(set_code);
                    }
                    processed.skipped.push(skipped);
                }
                Err(e) => {
                    processed.errors.push(format!(
                        "{} line {}: {}",
                        record.source_file, record.line_number, e
                    ));
                    processed.skipped.push(SkippedRow {
                        record: record.clone(),
                        reason: SkipReason::NoMatch,
                    });
                }
            }
        }

        processed
    }
}

// ============================================================================
// TESTS
// ============================================================================

// 🔭 Preview Reporter - what a commit WOULD do, without doing it
// Reads the catalog, never writes anything, never downloads anything.

use crate::aggregate::Aggregator;
use crate::catalog::CatalogStore;
use crate::config::PreviewConfig;
use crate::quantity::{parse_foil, parse_quantity};
use crate::rows::{MatchedRow, SkippedRow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewCard {
    pub name: String,
    pub quantity: u32,
    pub foil: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPreview {
    pub set_name: String,

    /// Not in the catalog yet; would be downloaded on commit
    pub missing: bool,

    pub sample_cards: Vec<PreviewCard>,
    pub total_cards_in_set: usize,
    pub truncated: bool,
}

impl SetPreview {
    fn new(set_name: String, missing: bool) -> Self {
        SetPreview {
            set_name,
            missing,
            sample_cards: Vec::new(),
            total_cards_in_set: 0,
            truncated: false,
        }
    }

    fn push(&mut self, card: PreviewCard, sample_limit: usize) {
        self.total_cards_in_set += 1;
        if self.sample_cards.len() < sample_limit {
            self.sample_cards.push(card);
        } else {
            self.truncated = true;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewReport {
    pub total_cards: u64,
    pub regular_cards: u64,
    pub foil_cards: u64,
    pub unique_cards: usize,
    pub skipped: usize,

    /// Keyed by lowercase set code
    pub sets: BTreeMap<String, SetPreview>,

    /// More matched rows than the preview row limit
    pub truncated: bool,

    pub missing_sets: BTreeSet<String>,
    pub errors: Vec<String>,
}

/// Everything a preview is computed from (already read and resolved)
pub struct PreviewInput<'a> {
    pub matched: &'a [MatchedRow],
    pub skipped: &'a [SkippedRow],
    /// Sets absent from the catalog (would be downloaded on commit)
    pub unfetched_sets: &'a BTreeSet<String>,
    /// Sets suggested by rows that failed to resolve
    pub missing_sets: &'a BTreeSet<String>,
    pub errors: &'a [String],
}

pub struct PreviewReporter<'a> {
    catalog: &'a dyn CatalogStore,
    limits: &'a PreviewConfig,
}

impl<'a> PreviewReporter<'a> {
    pub fn new(catalog: &'a dyn CatalogStore, limits: &'a PreviewConfig) -> Self {
        PreviewReporter { catalog, limits }
    }

    pub fn render(&self, input: PreviewInput<'_>) -> PreviewReport {
        let mut aggregator = Aggregator::new();
        aggregator.extend(input.matched);

        let (regular_cards, foil_cards) = aggregator
            .entries()
            .fold((0u64, 0u64), |(r, f), e| (r + e.regular_quantity, f + e.foil_quantity));

        let mut errors = input.errors.to_vec();
        let mut sets: BTreeMap<String, SetPreview> = BTreeMap::new();

        for row in input.matched {
            if !sets.contains_key(&row.card.set_code) {
                let set_name = match self.catalog.set_name(&row.card.set_code) {
                    Ok(name) => name.unwrap_or_else(|| row.card.set_code.to_uppercase()),
                    Err(e) => {
                        errors.push(format!("Failed to read set {}: {}", row.card.set_code, e));
                        row.card.set_code.to_uppercase()
                    }
                };
                sets.insert(row.card.set_code.clone(), SetPreview::new(set_name, false));
            }
            if let Some(set) = sets.get_mut(&row.card.set_code) {
                set.push(
                    PreviewCard {
                        name: row.card.name.clone(),
                        quantity: row.quantity,
                        foil: row.foil,
                    },
                    self.limits.sample_limit,
                );
            }
        }

        // Sets a commit would download: show the rows as the export spelled them
        for code in input.unfetched_sets {
            let set = sets
                .entry(code.clone())
                .or_insert_with(|| SetPreview::new(code.to_uppercase(), true));
            set.missing = true;

            for skipped in input.skipped {
                if skipped.record.set_code_lower() == *code && skipped.record.has_identity() {
                    set.push(
                        PreviewCard {
                            name: skipped.record.name.clone(),
                            quantity: parse_quantity(&skipped.record.quantity_raw),
                            foil: parse_foil(&skipped.record.foil_raw),
                        },
                        self.limits.sample_limit,
                    );
                }
            }
        }

        let mut missing_sets = input.missing_sets.clone();
        missing_sets.extend(input.unfetched_sets.iter().cloned());

        PreviewReport {
            total_cards: regular_cards + foil_cards,
            regular_cards,
            foil_cards,
            unique_cards: aggregator.len(),
            skipped: input.skipped.len(),
            sets,
            truncated: input.matched.len() > self.limits.row_limit,
            missing_sets,
            errors,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

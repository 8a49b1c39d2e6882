// ➕ Aggregator - fold matched rows into per-card totals
// Batch-wide: rows from every file of a batch land in the same totals.

use crate::rows::MatchedRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateEntry {
    pub card_id: String,
    pub regular_quantity: u64,
    pub foil_quantity: u64,

    /// At least one non-foil row contributed (even a zero-quantity one)
    pub has_regular: bool,

    /// At least one foil row contributed
    pub has_foil: bool,
}

impl AggregateEntry {
    fn new(card_id: &str) -> Self {
        AggregateEntry {
            card_id: card_id.to_string(),
            regular_quantity: 0,
            foil_quantity: 0,
            has_regular: false,
            has_foil: false,
        }
    }

    pub fn total(&self) -> u64 {
        self.regular_quantity.saturating_add(self.foil_quantity)
    }
}

/// Sums are commutative, so row order never changes the result
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    entries: BTreeMap<String, AggregateEntry>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, row: &MatchedRow) {
        let entry = self
            .entries
            .entry(row.card.id.clone())
            .or_insert_with(|| AggregateEntry::new(&row.card.id));

        let quantity = u64::from(row.quantity);
        if row.foil {
            entry.foil_quantity = entry.foil_quantity.saturating_add(quantity);
            entry.has_foil = true;
        } else {
            entry.regular_quantity = entry.regular_quantity.saturating_add(quantity);
            entry.has_regular = true;
        }
    }

    pub fn extend<'r>(&mut self, rows: impl IntoIterator<Item = &'r MatchedRow>) {
        for row in rows {
            self.add(row);
        }
    }

    pub fn get(&self, card_id: &str) -> Option<&AggregateEntry> {
        self.entries.get(card_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by card id
    pub fn entries(&self) -> impl Iterator<Item = &AggregateEntry> {
        self.entries.values()
    }

    pub fn into_entries(self) -> Vec<AggregateEntry> {
        self.entries.into_values().collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

// ⚙️ Import configuration - Heuristics as Data
// Loaded from TOML; every field has a default so a missing file is fine.

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// TOP-LEVEL CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// SQLite file holding the catalog and the collection
    pub database_path: PathBuf,

    pub remote: RemoteConfig,

    pub preview: PreviewConfig,

    pub sqlite: SqliteHeuristics,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            database_path: PathBuf::from("collection.db"),
            remote: RemoteConfig::default(),
            preview: PreviewConfig::default(),
            sqlite: SqliteHeuristics::default(),
        }
    }
}

impl ImportConfig {
    /// Load config from a TOML file
    ///
    /// A file that doesn't exist yields the defaults; a file that exists but
    /// doesn't parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(ImportConfig::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ImportConfig = toml::from_str(content)?;
        Ok(config)
    }
}

// ============================================================================
// REMOTE CATALOG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            base_url: "https://api.scryfall.com".to_string(),
            timeout_secs: 30,
            user_agent: format!("collection-import/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

// ============================================================================
// PREVIEW LIMITS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Sample cards shown per set
    pub sample_limit: usize,

    /// Matched rows above which the whole preview is flagged truncated
    pub row_limit: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        PreviewConfig {
            sample_limit: 50,
            row_limit: 500,
        }
    }
}

// ============================================================================
// SQLITE BACKUP HEURISTICS
// ============================================================================

/// Where to look for cards inside an app's SQLite backup
///
/// Both lists are prioritized: the first entry that exists wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteHeuristics {
    pub table_candidates: Vec<String>,
    pub columns: ColumnAliases,
}

impl Default for SqliteHeuristics {
    fn default() -> Self {
        SqliteHeuristics {
            table_candidates: vec![
                "cards".to_string(),
                "collection".to_string(),
                "collection_cards".to_string(),
                "inventory".to_string(),
            ],
            columns: ColumnAliases::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub name: Vec<String>,
    pub set_code: Vec<String>,
    pub collector_number: Vec<String>,
    pub quantity: Vec<String>,
    pub foil: Vec<String>,
    pub external_id: Vec<String>,
}

fn aliases(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for ColumnAliases {
    fn default() -> Self {
        ColumnAliases {
            name: aliases(&["name", "card_name"]),
            set_code: aliases(&["set_code", "edition", "set", "edition_code"]),
            collector_number: aliases(&["collector_number", "number", "card_number"]),
            quantity: aliases(&["quantity", "count", "qty"]),
            foil: aliases(&["foil", "is_foil", "foiled"]),
            external_id: aliases(&["scryfall_id", "scryfallid", "card_id"]),
        }
    }
}

impl ColumnAliases {
    /// Columns whose presence marks a table as holding owned cards
    pub fn quantity_markers(&self) -> &[String] {
        &self.quantity
    }
}

// ============================================================================
// TESTS
// ============================================================================

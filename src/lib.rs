// Collection Import - Core Library
// Reconciles card-collection exports against a canonical catalog.
// Exposes all modules for use in the CLI and in tests.

pub mod quantity;
pub mod error;
pub mod config;
pub mod db;
pub mod parser;
pub mod catalog;
pub mod resolver;
pub mod remote;
pub mod fetcher;
pub mod rows;
pub mod aggregate;
pub mod ownership;
pub mod commit;
pub mod preview;
pub mod engine;

// Re-export commonly used types
pub use quantity::{parse_foil, parse_quantity};
pub use error::{ImportError, ReadResult};
pub use config::{ColumnAliases, ImportConfig, PreviewConfig, RemoteConfig, SqliteHeuristics};
pub use db::{get_import_events, insert_import_event, setup_database, ImportEvent};
pub use parser::{
    get_reader, read_file, CsvReader, ImportFormat, JsonReader, RawImportRecord, RecordReader,
    SqliteBackupReader,
};
pub use catalog::{CanonicalCard, CatalogSet, CatalogStore, SqliteCatalog};
pub use resolver::{CatalogResolver, MatchStrategy, Resolution};
pub use remote::{OfflineCatalog, RemoteCatalog, RemoteSet};
#[cfg(feature = "scryfall")]
pub use remote::ScryfallClient;
pub use fetcher::{check_missing_sets, DownloadedSet, FetchReport, MissingSetFetcher};
pub use rows::{MatchedRow, RowOutcome, RowProcessor, SkipReason, SkippedRow};
pub use aggregate::{AggregateEntry, Aggregator};
pub use ownership::{OwnershipRecord, OwnershipStore, SqliteOwnership};
pub use commit::{apply_aggregate, CommitSummary, CommitWriter, ImportMode};
pub use preview::{PreviewCard, PreviewReport, PreviewReporter, SetPreview};
pub use engine::{BatchStatus, ImportEngine, ImportResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

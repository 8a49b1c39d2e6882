// 🏗️ Format Readers - CSV / SQLite backup / JSON backup → RawImportRecord
// Readers know file layouts; nothing downstream does.

use crate::config::SqliteHeuristics;
use crate::error::{ImportError, ReadResult};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// CORE TYPES
// ============================================================================

/// ImportFormat - the format the caller says a file is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportFormat {
    /// Delver Lens CSV export (Scryfall ID column required)
    DelverCsv,
    /// Any CSV/TSV with recognizable headers
    Csv,
    /// App backup stored as a SQLite database
    Sqlite,
    /// JSON backup (array of card objects)
    Json,
}

impl ImportFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ImportFormat::DelverCsv => "delver",
            ImportFormat::Csv => "csv",
            ImportFormat::Sqlite => "sqlite",
            ImportFormat::Json => "json",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ImportFormat::DelverCsv | ImportFormat::Csv => &["csv", "tsv", "txt"],
            ImportFormat::Sqlite => &["sqlite", "sqlite3", "db", "dlens"],
            ImportFormat::Json => &["json"],
        }
    }

    /// Guess a format from the file extension
    ///
    /// CSV files are assumed to be Delver exports, the most common source.
    pub fn from_path(path: &Path) -> Option<ImportFormat> {
        let ext = extension_of(path);
        [ImportFormat::DelverCsv, ImportFormat::Sqlite, ImportFormat::Json]
            .into_iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
    }

    /// Reject files whose extension doesn't belong to this format
    pub fn validate_extension(&self, path: &Path) -> ReadResult<()> {
        let ext = extension_of(path);
        if self.extensions().contains(&ext.as_str()) {
            Ok(())
        } else {
            Err(ImportError::UnsupportedExtension {
                found: ext,
                format: self.name().to_string(),
            })
        }
    }
}

impl fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ImportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "delver" | "delver_csv" => Ok(ImportFormat::DelverCsv),
            "csv" | "tsv" => Ok(ImportFormat::Csv),
            "sqlite" | "db" => Ok(ImportFormat::Sqlite),
            "json" => Ok(ImportFormat::Json),
            other => Err(format!("Unknown import format: {}", other)),
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// RawImportRecord - one row as found in the export, before any matching
///
/// Every field is kept as text; blanks are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImportRecord {
    pub name: String,
    pub set_code: String,
    pub collector_number: String,
    pub quantity_raw: String,
    pub foil_raw: String,
    pub external_id: String,

    // Provenance
    pub source_file: String,
    pub line_number: usize,
}

impl RawImportRecord {
    pub fn set_code_lower(&self) -> String {
        self.set_code.trim().to_lowercase()
    }

    /// Rows with neither a name nor an id are never looked up
    pub fn has_identity(&self) -> bool {
        !self.name.trim().is_empty() || !self.external_id.trim().is_empty()
    }
}

// ============================================================================
// READER TRAIT + FACTORY
// ============================================================================

/// RecordReader - turns one input file into raw records
///
/// A reader either returns every row of the file or a structural error;
/// it never returns half a file.
pub trait RecordReader {
    fn read(&self, path: &Path) -> ReadResult<Vec<RawImportRecord>>;

    fn format(&self) -> ImportFormat;
}

pub fn get_reader(format: ImportFormat, heuristics: &SqliteHeuristics) -> Box<dyn RecordReader> {
    match format {
        ImportFormat::DelverCsv => Box::new(CsvReader::delver()),
        ImportFormat::Csv => Box::new(CsvReader::generic()),
        ImportFormat::Sqlite => Box::new(SqliteBackupReader::new(heuristics.clone())),
        ImportFormat::Json => Box::new(JsonReader),
    }
}

/// Validate the extension, then read with the matching reader
pub fn read_file(
    path: &Path,
    format: ImportFormat,
    heuristics: &SqliteHeuristics,
) -> ReadResult<Vec<RawImportRecord>> {
    format.validate_extension(path)?;
    get_reader(format, heuristics).read(path)
}

// ============================================================================
// CSV READER
// ============================================================================

const ID_HEADERS: &[&str] = &["scryfall id", "scryfall_id"];
const NAME_HEADERS: &[&str] = &["name", "card name", "card_name"];
const SET_HEADERS: &[&str] = &["edition code", "set", "set code", "set_code"];
const NUMBER_HEADERS: &[&str] = &["collector's number", "collector number", "collector_number"];
const QUANTITY_HEADERS: &[&str] = &["quantityx", "quantity", "count", "qty"];
const FOIL_HEADERS: &[&str] = &["foil"];

/// Column positions resolved from a header row
#[derive(Debug, Default)]
struct CsvColumns {
    name: Option<usize>,
    set_code: Option<usize>,
    collector_number: Option<usize>,
    quantity: Option<usize>,
    foil: Option<usize>,
    external_id: Option<usize>,
}

impl CsvColumns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
            .collect();

        let find = |aliases: &[&str]| {
            aliases
                .iter()
                .find_map(|alias| normalized.iter().position(|h| h.as_str() == *alias))
        };

        CsvColumns {
            name: find(NAME_HEADERS),
            set_code: find(SET_HEADERS),
            collector_number: find(NUMBER_HEADERS),
            quantity: find(QUANTITY_HEADERS),
            foil: find(FOIL_HEADERS),
            external_id: find(ID_HEADERS),
        }
    }
}

pub struct CsvReader {
    require_external_id: bool,
}

impl CsvReader {
    /// Delver Lens export: refuses files exported without Scryfall IDs
    pub fn delver() -> Self {
        CsvReader {
            require_external_id: true,
        }
    }

    pub fn generic() -> Self {
        CsvReader {
            require_external_id: false,
        }
    }

    /// Parse CSV/TSV text; `file_name` is only used for provenance
    pub fn parse_str(&self, content: &str, file_name: &str) -> ReadResult<Vec<RawImportRecord>> {
        let content = content.trim_start_matches('\u{feff}');
        let header_line = content
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or(ImportError::EmptyFile)?;

        let delimiter = detect_delimiter(header_line);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(content.as_bytes());

        let columns = CsvColumns::from_headers(reader.headers()?);

        if self.require_external_id && columns.external_id.is_none() {
            return Err(ImportError::missing_scryfall_id());
        }
        if columns.name.is_none() && columns.external_id.is_none() {
            return Err(ImportError::missing_column("Name"));
        }

        let mut records = Vec::new();

        for (idx, result) in reader.records().enumerate() {
            let row = result?;

            // Ragged rows: missing trailing cells read as blank
            let cell = |col: Option<usize>| {
                col.and_then(|i| row.get(i))
                    .unwrap_or("")
                    .trim()
                    .to_string()
            };

            if row.iter().all(|v| v.trim().is_empty()) {
                continue;
            }

            let line_number = row
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 2);

            records.push(RawImportRecord {
                name: cell(columns.name),
                set_code: cell(columns.set_code),
                collector_number: cell(columns.collector_number),
                quantity_raw: cell(columns.quantity),
                foil_raw: cell(columns.foil),
                external_id: cell(columns.external_id),
                source_file: file_name.to_string(),
                line_number,
            });
        }

        Ok(records)
    }
}

/// Tab-separated if the header has more tabs than commas
fn detect_delimiter(header_line: &str) -> u8 {
    let tabs = header_line.matches('\t').count();
    let commas = header_line.matches(',').count();
    if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

impl RecordReader for CsvReader {
    fn read(&self, path: &Path) -> ReadResult<Vec<RawImportRecord>> {
        let bytes = fs::read(path)?;
        let content = String::from_utf8_lossy(&bytes);
        self.parse_str(&content, &file_name_of(path))
    }

    fn format(&self) -> ImportFormat {
        if self.require_external_id {
            ImportFormat::DelverCsv
        } else {
            ImportFormat::Csv
        }
    }
}

// ============================================================================
// SQLITE BACKUP READER
// ============================================================================

/// Reads cards out of another app's SQLite backup
///
/// The table and its columns are found heuristically, driven entirely by
/// the prioritized lists in `SqliteHeuristics`.
pub struct SqliteBackupReader {
    heuristics: SqliteHeuristics,
}

/// Column chosen for each record field (None = field absent)
#[derive(Debug, Default, PartialEq)]
struct SqliteColumns {
    name: Option<String>,
    set_code: Option<String>,
    collector_number: Option<String>,
    quantity: Option<String>,
    foil: Option<String>,
    external_id: Option<String>,
}

impl SqliteBackupReader {
    pub fn new(heuristics: SqliteHeuristics) -> Self {
        SqliteBackupReader { heuristics }
    }

    pub fn read_connection(
        &self,
        conn: &Connection,
        file_name: &str,
    ) -> ReadResult<Vec<RawImportRecord>> {
        let tables = list_tables(conn)?;
        if tables.is_empty() {
            return Err(ImportError::EmptyFile);
        }

        let table = self.locate_table(conn, &tables)?;
        let table_columns = table_columns(conn, &table)?;
        let columns = self.locate_columns(&table_columns);

        if columns.name.is_none() && columns.external_id.is_none() {
            return Err(ImportError::missing_column("name"));
        }

        let select_list = [
            &columns.name,
            &columns.set_code,
            &columns.collector_number,
            &columns.quantity,
            &columns.foil,
            &columns.external_id,
        ]
        .iter()
        .map(|c| match c {
            Some(col) => quote_ident(col),
            None => "NULL".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ");

        let sql = format!("SELECT {} FROM {}", select_list, quote_ident(&table));
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt
            .query_map([], |row| {
                let mut values = Vec::with_capacity(6);
                for i in 0..6 {
                    let value = row.get::<_, SqlValue>(i)?;
                    values.push(if i == 4 {
                        sql_foil_to_string(value)
                    } else {
                        sql_value_to_string(value)
                    });
                }
                Ok(values)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let records = rows
            .into_iter()
            .enumerate()
            .map(|(idx, mut v)| RawImportRecord {
                external_id: v.pop().unwrap_or_default(),
                foil_raw: v.pop().unwrap_or_default(),
                quantity_raw: v.pop().unwrap_or_default(),
                collector_number: v.pop().unwrap_or_default(),
                set_code: v.pop().unwrap_or_default(),
                name: v.pop().unwrap_or_default(),
                source_file: file_name.to_string(),
                line_number: idx + 1,
            })
            .collect();

        Ok(records)
    }

    /// Candidate table names first, then any table carrying a quantity column
    fn locate_table(&self, conn: &Connection, tables: &[String]) -> ReadResult<String> {
        for candidate in &self.heuristics.table_candidates {
            if let Some(t) = tables.iter().find(|t| t.eq_ignore_ascii_case(candidate)) {
                return Ok(t.clone());
            }
        }

        for table in tables {
            let columns = table_columns(conn, table)?;
            let has_quantity = self
                .heuristics
                .columns
                .quantity_markers()
                .iter()
                .any(|marker| columns.iter().any(|c| c.eq_ignore_ascii_case(marker)));
            if has_quantity {
                return Ok(table.clone());
            }
        }

        Err(ImportError::NoCardTable {
            searched: self.heuristics.table_candidates.join(", "),
        })
    }

    fn locate_columns(&self, table_columns: &[String]) -> SqliteColumns {
        let pick = |aliases: &[String]| {
            aliases.iter().find_map(|alias| {
                table_columns
                    .iter()
                    .find(|c| c.eq_ignore_ascii_case(alias))
                    .cloned()
            })
        };

        let aliases = &self.heuristics.columns;
        SqliteColumns {
            name: pick(&aliases.name),
            set_code: pick(&aliases.set_code),
            collector_number: pick(&aliases.collector_number),
            quantity: pick(&aliases.quantity),
            foil: pick(&aliases.foil),
            external_id: pick(&aliases.external_id),
        }
    }
}

impl RecordReader for SqliteBackupReader {
    fn read(&self, path: &Path) -> ReadResult<Vec<RawImportRecord>> {
        if fs::metadata(path)?.len() == 0 {
            return Err(ImportError::EmptyFile);
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        self.read_connection(&conn, &file_name_of(path))
    }

    fn format(&self) -> ImportFormat {
        ImportFormat::Sqlite
    }
}

fn list_tables(conn: &Connection) -> ReadResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tables)
}

fn table_columns(conn: &Connection, table: &str) -> ReadResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn sql_value_to_string(value: SqlValue) -> String {
    match value {
        SqlValue::Null | SqlValue::Blob(_) => String::new(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(s) => s.trim().to_string(),
    }
}

/// Backups store foil as 0/1; a numeric zero means non-foil
fn sql_foil_to_string(value: SqlValue) -> String {
    match value {
        SqlValue::Integer(0) => String::new(),
        SqlValue::Real(f) if f == 0.0 => String::new(),
        other => sql_value_to_string(other),
    }
}

// ============================================================================
// JSON READER
// ============================================================================

const JSON_NAME: &[&str] = &["name", "card_name", "cardName"];
const JSON_SET: &[&str] = &["set_code", "set", "edition", "setCode"];
const JSON_NUMBER: &[&str] = &["collector_number", "number", "collectorNumber"];
const JSON_QUANTITY: &[&str] = &["quantity", "count", "qty"];
const JSON_FOIL: &[&str] = &["foil", "is_foil", "isFoil"];
const JSON_ID: &[&str] = &["scryfall_id", "scryfallId", "scryfall id"];

/// JSON backup: `[ {...}, ... ]`, or `{ "cards": [...] }` / `{ "data": [...] }`
pub struct JsonReader;

impl JsonReader {
    pub fn parse_str(&self, content: &str, file_name: &str) -> ReadResult<Vec<RawImportRecord>> {
        if content.trim().is_empty() {
            return Err(ImportError::EmptyFile);
        }

        let json: JsonValue = serde_json::from_str(content)?;

        let items = match &json {
            JsonValue::Array(items) => items,
            JsonValue::Object(map) => ["cards", "data"]
                .iter()
                .find_map(|key| map.get(*key).and_then(|v| v.as_array()))
                .ok_or_else(|| {
                    ImportError::InvalidStructure(
                        "expected an array of cards, or an object with a \"cards\" array"
                            .to_string(),
                    )
                })?,
            _ => {
                return Err(ImportError::InvalidStructure(
                    "expected an array of cards".to_string(),
                ))
            }
        };

        let records = items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let lookup = |aliases: &[&str]| aliases.iter().find_map(|key| item.get(*key));
                let field = |aliases: &[&str]| {
                    lookup(aliases).map(json_value_to_string).unwrap_or_default()
                };

                RawImportRecord {
                    name: field(JSON_NAME),
                    set_code: field(JSON_SET),
                    collector_number: field(JSON_NUMBER),
                    quantity_raw: field(JSON_QUANTITY),
                    foil_raw: lookup(JSON_FOIL).map(json_foil_to_string).unwrap_or_default(),
                    external_id: field(JSON_ID),
                    source_file: file_name.to_string(),
                    line_number: idx + 1, // JSON array index (1-based)
                }
            })
            .collect();

        Ok(records)
    }
}

/// `"foil": 0` is a non-foil flag, not a foil marker
fn json_foil_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::Number(n) if n.as_f64() == Some(0.0) => String::new(),
        other => json_value_to_string(other),
    }
}

fn json_value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

impl RecordReader for JsonReader {
    fn read(&self, path: &Path) -> ReadResult<Vec<RawImportRecord>> {
        let content = fs::read_to_string(path)?;
        self.parse_str(&content, &file_name_of(path))
    }

    fn format(&self) -> ImportFormat {
        ImportFormat::Json
    }
}

// ============================================================================
// TESTS
// ============================================================================

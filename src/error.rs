// ❌ Structural import errors
// Anything here aborts ONE input file; the batch keeps going.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("File is empty")]
    EmptyFile,

    #[error("Unsupported file extension \"{found}\" for {format} import")]
    UnsupportedExtension { found: String, format: String },

    #[error("Missing required column \"{column}\"{hint}")]
    MissingColumn { column: String, hint: String },

    #[error("No card table found (looked for {searched})")]
    NoCardTable { searched: String },

    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ImportError {
    /// The Delver-style export can't be matched reliably without its ID column
    pub fn missing_scryfall_id() -> Self {
        ImportError::MissingColumn {
            column: "Scryfall ID".to_string(),
            hint: " (export with Scryfall IDs enabled)".to_string(),
        }
    }

    pub fn missing_column(column: &str) -> Self {
        ImportError::MissingColumn {
            column: column.to_string(),
            hint: String::new(),
        }
    }

    /// Render the error scoped to the file it came from
    pub fn for_file(&self, file_name: &str) -> String {
        format!("{}: {}", file_name, self)
    }
}

impl Serialize for ImportError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type ReadResult<T> = Result<T, ImportError>;

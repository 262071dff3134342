use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("table {table} is missing columns {missing:?} (found {found:?})")]
    SchemaMismatch {
        table: String,
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("{entity} '{value}' does not exist in {master}")]
    InvalidReference {
        entity: &'static str,
        value: String,
        master: String,
    },

    #[error("table {table} not found at {}", path.display())]
    TableNotFound { table: String, path: PathBuf },

    #[error("invalid unit '{unit}'")]
    InvalidUnit { unit: String },

    #[error("value '{value}' cannot be read as a number for unit '{unit}'")]
    InvalidValue { unit: String, value: String },

    #[error("{count} fact rows did not resolve to dimension keys")]
    UnresolvedJoins { count: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, EtlError>;

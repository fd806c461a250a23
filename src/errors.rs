use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("CLI_INVALID: {0}")]
    Cli(String),
    #[error("SCHEMA_FAILURE: {0}")]
    Schema(String),
    #[error("APPEND_FAILED: {0}")]
    Append(String),
    #[error("STORAGE_FAILURE: {0}")]
    Storage(String),
    #[error("EXPORT_FAILED: {0}")]
    Export(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("CONFIG_INVALID: {0}")]
    Config(String),
    #[error("WORKER_UNAVAILABLE: {0}")]
    Worker(String),
    #[error("BUSY: {0}")]
    Busy(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Export(value.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// A single stored row that could not be coerced into a journal entry.
#[derive(Debug, Error)]
pub enum RowDecodeError {
    #[error("column {column} has unusable type {found}")]
    BadType { column: &'static str, found: String },
    #[error("column {column} is null")]
    Null { column: &'static str },
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

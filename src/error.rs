// src/error.rs
use thiserror::Error;

/// A failed read against the message backend. Shown in place of the
/// results table; never retried.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct QueryError {
    pub message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        QueryError::new(format!("Database error: {}", err))
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        QueryError::new(format!("Request to backend failed: {}", err))
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::new(format!("Unexpected row format: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No backend configured. Set DATABASE_URL, or SUPABASE_URL and SUPABASE_ANON_KEY")]
    MissingBackend,
    #[error("Invalid table name '{0}': only letters, digits and underscores are allowed")]
    InvalidTableName(String),
    #[error("Table '{0}' has no columns")]
    NoColumns(String),
    #[error("Unknown column format '{0}'")]
    UnknownFormat(String),
    #[error("Table registry is empty")]
    NoTables,
    #[error("Failed to read table registry: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse table registry: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Failed to connect to database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

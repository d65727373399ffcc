//! Error types for the document store

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("task join error: {0}")]
    TaskJoin(String),

    /// Existing table disagrees with the collection's declared schema.
    /// Raised at collection-creation time, never at query time.
    #[error("table '{table}' column '{column}' type mismatch: expected '{expected}', found '{actual}'")]
    SchemaMismatch { table: String, column: String, expected: String, actual: String },

    /// Filter expression has a shape the query compiler does not accept.
    #[error("invalid filter expression: {0}")]
    InvalidFilter(String),

    /// `index()` received a value that is not a valid index expression.
    #[error("invalid index expression: {0}")]
    InvalidIndexExpr(String),

    /// The engine lacks the jsonb()/jsonb_extract() function pair.
    #[error("binary JSON (JSONB) is not supported by this engine: {0}")]
    JsonbUnsupported(String),

    #[error("invalid identifier: {0:?}")]
    InvalidName(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

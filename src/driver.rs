//! Storage driver contract
//!
//! The core depends only on this narrow capability interface; each backing
//! engine/client library implements it once. `SqliteDriver` in this crate is
//! the reference implementation.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::value::SqlValue;

/// One result row: a mapping from column name to value.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self { Self { columns } }

    /// Value of the named column, if present.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.iter().find(|(name, _)| name == column).map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Move the named column's value out of the row.
    pub fn take(&mut self, column: &str) -> Option<SqlValue> {
        let idx = self.columns.iter().position(|(name, _)| name == column)?;
        Some(self.columns.swap_remove(idx).1)
    }
}

/// Lazy, forward-only sequence of rows. Dropping the stream abandons the
/// underlying statement.
pub type RowStream = BoxStream<'static, Result<Row>>;

#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Engine-specific result of `execute`, carrying whatever is needed to
    /// report a generated id afterwards.
    type Exec: Send + Sync;

    /// Run a non-row-producing statement (DDL, INSERT/UPDATE).
    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<Self::Exec>;

    /// Run a row-producing statement, yielding rows one at a time.
    async fn select(&self, sql: &str, params: Vec<SqlValue>) -> Result<RowStream>;

    /// Convenience single-row fetch.
    async fn get(&self, sql: &str, params: Vec<SqlValue>) -> Result<Option<Row>>;

    /// Extract the engine-generated identifier from an `execute` result.
    async fn last_insert_rowid(&self, exec: &Self::Exec) -> Result<SqlValue>;
}

//! SQLite driver: the reference `Driver` implementation
//!
//! Wraps a bb8 pool of rusqlite connections. All statement execution happens
//! inside `spawn_blocking` since rusqlite is synchronous; `select` feeds rows
//! through a bounded channel so consumers pull them incrementally without the
//! full result set ever being buffered.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use rusqlite::params_from_iter;
use tokio::sync::mpsc;
use tracing::debug;

use crate::connection::SqliteConnectionManager;
use crate::driver::{Driver, Row, RowStream};
use crate::error::{Error, Result};
use crate::value::SqlValue;

/// Default connection pool size
pub const DEFAULT_POOL_SIZE: u32 = 10;

// Rows buffered ahead of the consumer before the producer blocks.
const ROW_CHANNEL_CAPACITY: usize = 64;

/// SQLite storage driver
pub struct SqliteDriver {
    pool: bb8::Pool<SqliteConnectionManager>,
}

impl SqliteDriver {
    /// Create a new driver with an existing pool
    pub fn new(pool: bb8::Pool<SqliteConnectionManager>) -> Self { Self { pool } }

    /// Open a file-based SQLite database
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = bb8::Pool::builder().max_size(DEFAULT_POOL_SIZE).build(manager).await?;
        Ok(Self::new(pool))
    }

    /// Open an in-memory SQLite database (for testing)
    pub async fn open_in_memory() -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory();
        // For in-memory, a single connection keeps the database alive
        let pool = bb8::Pool::builder().max_size(1).build(manager).await?;
        Ok(Self::new(pool))
    }

    /// Get a reference to the connection pool (for testing/diagnostics)
    pub fn pool(&self) -> &bb8::Pool<SqliteConnectionManager> { &self.pool }
}

/// Result of a `SqliteDriver::execute` call.
pub struct SqliteExec {
    pub rows_affected: usize,
    pub last_insert_rowid: i64,
}

fn to_rusqlite(params: Vec<SqlValue>) -> Vec<rusqlite::types::Value> { params.into_iter().map(Into::into).collect() }

fn row_from(names: &[String], r: &rusqlite::Row<'_>) -> Result<Row, rusqlite::Error> {
    let mut columns = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let value: rusqlite::types::Value = r.get(i)?;
        columns.push((name.clone(), SqlValue::from(value)));
    }
    Ok(Row::new(columns))
}

#[async_trait]
impl Driver for SqliteDriver {
    type Exec = SqliteExec;

    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<Self::Exec> {
        debug!("execute: {} ({} params)", sql, params.len());
        let conn = self.pool.get().await.map_err(|e| Error::Pool(e.to_string()))?;

        let sql = sql.to_owned();
        let values = to_rusqlite(params);
        conn.with_connection(move |c| {
            let rows_affected = c.execute(&sql, params_from_iter(values.iter()))?;
            Ok(SqliteExec { rows_affected, last_insert_rowid: c.last_insert_rowid() })
        })
        .await
    }

    async fn select(&self, sql: &str, params: Vec<SqlValue>) -> Result<RowStream> {
        debug!("select: {} ({} params)", sql, params.len());
        // Hold an owned checkout for the life of the statement
        let conn = self.pool.get_owned().await.map_err(|e| Error::Pool(e.to_string()))?;

        let sql = sql.to_owned();
        let values = to_rusqlite(params);
        let (tx, rx) = mpsc::channel::<Result<Row>>(ROW_CHANNEL_CAPACITY);

        tokio::task::spawn_blocking(move || {
            let handle = conn.handle();
            let guard = handle.blocking_lock();
            let step = || -> Result<()> {
                let mut stmt = guard.prepare(&sql)?;
                let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
                let mut rows = stmt.query(params_from_iter(values.iter()))?;
                while let Some(r) = rows.next()? {
                    let row = row_from(&names, r)?;
                    if tx.blocking_send(Ok(row)).is_err() {
                        // Receiver dropped: iteration abandoned by the caller
                        break;
                    }
                }
                Ok(())
            };
            if let Err(e) = step() {
                let _ = tx.blocking_send(Err(e));
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });
        Ok(stream.boxed())
    }

    async fn get(&self, sql: &str, params: Vec<SqlValue>) -> Result<Option<Row>> {
        debug!("get: {} ({} params)", sql, params.len());
        let conn = self.pool.get().await.map_err(|e| Error::Pool(e.to_string()))?;

        let sql = sql.to_owned();
        let values = to_rusqlite(params);
        conn.with_connection(move |c| {
            let mut stmt = c.prepare(&sql)?;
            let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
            let mut rows = stmt.query(params_from_iter(values.iter()))?;
            match rows.next()? {
                Some(r) => Ok(Some(row_from(&names, r)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn last_insert_rowid(&self, exec: &Self::Exec) -> Result<SqlValue> { Ok(SqlValue::Integer(exec.last_insert_rowid)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_and_get() -> anyhow::Result<()> {
        let driver = SqliteDriver::open_in_memory().await?;
        driver.execute(r#"CREATE TABLE t ("id" INTEGER PRIMARY KEY, "v" TEXT)"#, vec![]).await?;
        let exec = driver.execute(r#"INSERT INTO t ("v") VALUES (?)"#, vec![SqlValue::from("hello")]).await?;
        assert_eq!(exec.rows_affected, 1);
        assert_eq!(driver.last_insert_rowid(&exec).await?, SqlValue::Integer(1));

        let row = driver.get(r#"SELECT "v" FROM t WHERE "id" = ?"#, vec![SqlValue::Integer(1)]).await?.unwrap();
        assert_eq!(row.get("v"), Some(&SqlValue::Text("hello".into())));

        let missing = driver.get(r#"SELECT "v" FROM t WHERE "id" = ?"#, vec![SqlValue::Integer(99)]).await?;
        assert!(missing.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn select_streams_rows_in_order() -> anyhow::Result<()> {
        let driver = SqliteDriver::open_in_memory().await?;
        driver.execute(r#"CREATE TABLE t ("id" INTEGER PRIMARY KEY, "n" INTEGER)"#, vec![]).await?;
        for n in 1..=5 {
            driver.execute(r#"INSERT INTO t ("n") VALUES (?)"#, vec![SqlValue::Integer(n)]).await?;
        }

        let mut stream = driver.select(r#"SELECT "n" FROM t ORDER BY "n" DESC"#, vec![]).await?;
        let mut seen = Vec::new();
        while let Some(row) = stream.next().await {
            seen.push(row?.get("n").and_then(|v| v.as_integer()).unwrap());
        }
        assert_eq!(seen, vec![5, 4, 3, 2, 1]);
        Ok(())
    }

    #[tokio::test]
    async fn select_errors_surface_on_the_stream() -> anyhow::Result<()> {
        let driver = SqliteDriver::open_in_memory().await?;
        let mut stream = driver.select("SELECT * FROM missing_table", vec![]).await?;
        let first = stream.next().await.expect("stream should yield the error");
        assert!(first.is_err());
        Ok(())
    }

    /// The bundled SQLite must provide the jsonb()/jsonb_extract() pair the
    /// binary storage format relies on.
    #[tokio::test]
    async fn jsonb_functions_available() -> anyhow::Result<()> {
        let driver = SqliteDriver::open_in_memory().await?;
        let row = driver.get(r#"SELECT jsonb_extract(jsonb('{"territory": "US"}'), '$.territory') AS v"#, vec![]).await?.unwrap();
        assert_eq!(row.get("v"), Some(&SqlValue::Text("US".into())));
        Ok(())
    }
}

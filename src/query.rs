//! Query builder: statement assembly and result materialization
//!
//! Holds a base table/column/filter plus accumulated ordering and pagination,
//! and renders SELECT, SELECT COUNT, and EXPLAIN variants of the same state.
//! Terminal operations deserialize the payload column via serde.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::collection::DataFormat;
use crate::driver::{Driver, Row};
use crate::error::{Error, Result};
use crate::expr::{Dir, Expr, FieldPath};
use crate::filter::{compile_filter, field_sql, quote_ident};
use crate::value::SqlValue;

/// An ordering term: a plain column name (rendered verbatim) or a field path
/// into the JSON payload (rendered via the extraction function).
#[derive(Debug, Clone)]
pub enum OrderKey {
    Column(String),
    Path(FieldPath),
}

impl From<&str> for OrderKey {
    fn from(column: &str) -> Self { OrderKey::Column(column.to_owned()) }
}

impl From<String> for OrderKey {
    fn from(column: String) -> Self { OrderKey::Column(column) }
}

impl From<FieldPath> for OrderKey {
    fn from(path: FieldPath) -> Self { OrderKey::Path(path) }
}

#[derive(Clone, Copy)]
enum Statement {
    Select,
    Count,
    Explain { debug: bool },
}

/// Builder for one query against a collection. Created by
/// `Collection::find()`; touches storage only when a terminal operation
/// (`all`, `first`, `count`, `iterate`, `explain`) runs.
pub struct QueryBuilder<D: Driver> {
    driver: Arc<D>,
    table: String,
    data_col: String,
    format: DataFormat,
    filter: Option<Expr>,
    order: Vec<(OrderKey, Dir)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl<D: Driver> QueryBuilder<D> {
    pub(crate) fn new(driver: Arc<D>, table: String, data_col: String, format: DataFormat, filter: Option<Expr>) -> Self {
        Self { driver, table, data_col, format, filter, order: Vec::new(), limit: None, offset: None }
    }

    /// Append an ordering term.
    pub fn order(mut self, key: impl Into<OrderKey>, dir: Dir) -> Self {
        self.order.push((key.into(), dir));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    fn build(&self, statement: Statement) -> Result<(String, Vec<SqlValue>)> {
        let mut sql = String::new();
        if let Statement::Explain { debug } = statement {
            sql.push_str(if debug { "EXPLAIN " } else { "EXPLAIN QUERY PLAN " });
        }

        match statement {
            Statement::Count => sql.push_str("SELECT COUNT(*) AS count"),
            _ => {
                sql.push_str("SELECT ");
                sql.push_str(&self.format.read_expr(&self.data_col));
            }
        }
        sql.push_str(" FROM ");
        sql.push_str(&quote_ident(&self.table));

        let mut params = Vec::new();
        if let Some(filter) = &self.filter {
            let (where_sql, where_params) = compile_filter(filter, &self.data_col, self.format.extract_fn())?;
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params = where_params;
        }

        // count() reflects the filter only
        if matches!(statement, Statement::Count) {
            return Ok((sql, params));
        }

        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            for (i, (key, dir)) in self.order.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                match key {
                    OrderKey::Column(name) => sql.push_str(&quote_ident(name)),
                    OrderKey::Path(path) => sql.push_str(&field_sql(path, &self.data_col, self.format.extract_fn())),
                }
                sql.push(' ');
                sql.push_str(dir.sql());
            }
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        Ok((sql, params))
    }

    /// Render the SELECT statement and its parameters without executing it.
    pub fn to_sql(&self) -> Result<(String, Vec<SqlValue>)> { self.build(Statement::Select) }

    /// Execute the query and collect every non-null payload, in result order.
    pub async fn all<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let (sql, params) = self.build(Statement::Select)?;
        let mut stream = self.driver.select(&sql, params).await?;

        let mut results = Vec::new();
        while let Some(row) = stream.next().await {
            if let Some(value) = payload(row?, &self.data_col)? {
                results.push(serde_json::from_value(value)?);
            }
        }
        Ok(results)
    }

    /// Execute the query and return the first payload, or `None` if the
    /// result set is empty. Applies `LIMIT 1` unless an explicit limit was
    /// set.
    pub async fn first<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let (mut sql, params) = self.build(Statement::Select)?;
        if self.limit.is_none() {
            sql.push_str(" LIMIT 1");
        }

        let mut stream = self.driver.select(&sql, params).await?;
        while let Some(row) = stream.next().await {
            if let Some(value) = payload(row?, &self.data_col)? {
                return Ok(Some(serde_json::from_value(value)?));
            }
        }
        Ok(None)
    }

    /// Count matching rows. Ordering and pagination are ignored: the count
    /// reflects the filter only.
    pub async fn count(&self) -> Result<u64> {
        let (sql, params) = self.build(Statement::Count)?;
        let row = self.driver.get(&sql, params).await?;
        Ok(row.and_then(|r| r.get("count").and_then(|v| v.as_integer())).unwrap_or(0) as u64)
    }

    /// Lazy, forward-only stream of deserialized payloads backed by the same
    /// SELECT as `all()`. Rows are pulled from storage incrementally;
    /// dropping the stream abandons iteration.
    pub async fn iterate<T: DeserializeOwned + Send + 'static>(&self) -> Result<BoxStream<'static, Result<T>>> {
        let (sql, params) = self.build(Statement::Select)?;
        let stream = self.driver.select(&sql, params).await?;

        let data_col = self.data_col.clone();
        let stream = stream.filter_map(move |row| {
            let item = match row.and_then(|r| payload(r, &data_col)) {
                Ok(Some(value)) => match serde_json::from_value(value) {
                    Ok(doc) => Some(Ok(doc)),
                    Err(e) => Some(Err(Error::Json(e))),
                },
                Ok(None) => None, // null payload rows are skipped
                Err(e) => Some(Err(e)),
            };
            futures::future::ready(item)
        });
        Ok(stream.boxed())
    }

    /// Run the same SELECT prefixed with `EXPLAIN QUERY PLAN` (or `EXPLAIN`
    /// when `debug` is set, for bytecode-level inspection) and return the raw
    /// rows unmodified.
    pub async fn explain(&self, debug: bool) -> Result<Vec<Row>> {
        let (sql, params) = self.build(Statement::Explain { debug })?;
        debug!("explain: {}", sql);
        let mut stream = self.driver.select(&sql, params).await?;

        let mut rows = Vec::new();
        while let Some(row) = stream.next().await {
            rows.push(row?);
        }
        Ok(rows)
    }
}

/// Pull the JSON payload out of a result row. Absent and NULL payloads are
/// "no value", never an error; text parses as JSON, anything else surfaces
/// as its JSON equivalent.
pub(crate) fn payload(mut row: Row, data_col: &str) -> Result<Option<serde_json::Value>> {
    match row.take(data_col) {
        None | Some(SqlValue::Null) => Ok(None),
        Some(SqlValue::Text(s)) => Ok(Some(serde_json::from_str(&s)?)),
        Some(SqlValue::Blob(b)) => Ok(Some(serde_json::from_slice(&b)?)),
        Some(SqlValue::Integer(i)) => Ok(Some(serde_json::Value::from(i))),
        Some(SqlValue::Real(f)) => Ok(Some(serde_json::Value::from(f))),
    }
}

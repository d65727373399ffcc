//! Collection manager: schema ownership and typed CRUD
//!
//! A collection is one two-column table: an identifier column and a JSON (or
//! JSONB) payload column. Creation issues the DDL, then reads the actual
//! schema back and validates it against expectations; a structurally
//! incompatible table is a fatal error, never silently coerced.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::filter::quote_ident;
use crate::index::{compile_index_expr, IndexExpr, IndexOptions};
use crate::query::{payload, QueryBuilder};
use crate::value::SqlValue;

const DEFAULT_ID_COLUMN: &str = "id";
const DEFAULT_ID_TYPE: &str = "INTEGER PRIMARY KEY";
const DEFAULT_DATA_COLUMN: &str = "data";

/// Storage format of the payload column: textual JSON or SQLite's binary
/// JSONB (requires SQLite 3.45.0+).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFormat {
    #[default]
    Json,
    Jsonb,
}

impl DataFormat {
    /// Declared column type in the CREATE TABLE statement.
    pub(crate) fn column_type(self) -> &'static str {
        match self {
            DataFormat::Json => "JSON",
            DataFormat::Jsonb => "BLOB",
        }
    }

    /// Declared column types accepted when validating an existing table.
    fn accepts_column_type(self, declared: &str) -> bool {
        let declared = declared.to_uppercase();
        match self {
            DataFormat::Json => declared == "JSON" || declared == "TEXT",
            DataFormat::Jsonb => declared == "BLOB" || declared == "JSONB",
        }
    }

    /// JSON path extraction function for filters, ordering, and indexes.
    pub(crate) fn extract_fn(self) -> &'static str {
        match self {
            DataFormat::Json => "json_extract",
            DataFormat::Jsonb => "jsonb_extract",
        }
    }

    /// SELECT expression for reading the payload column back as JSON text.
    pub(crate) fn read_expr(self, column: &str) -> String {
        let quoted = quote_ident(column);
        match self {
            DataFormat::Json => quoted,
            // jsonb columns hold the binary encoding; json() converts back to text
            DataFormat::Jsonb => format!("json({}) AS {}", quoted, quoted),
        }
    }

    /// VALUES placeholder for writing the payload column.
    fn write_placeholder(self) -> &'static str {
        match self {
            DataFormat::Json => "?",
            DataFormat::Jsonb => "jsonb(?)",
        }
    }
}

/// Injectable id generator: computes a document id from the serialized
/// payload at insert time. Kept as a closure on the configuration so id
/// generation stays deterministic and testable.
pub type IdGenerator = Arc<dyn Fn(&serde_json::Value) -> SqlValue + Send + Sync>;

/// Configuration for `Collection::create`. Defaults: id column `id` of type
/// `INTEGER PRIMARY KEY`, data column `data` in textual JSON format.
#[derive(Clone, Default)]
pub struct CollectionOptions {
    pub id_column: Option<String>,
    /// Full SQL type string, e.g. "INTEGER PRIMARY KEY", "TEXT UNIQUE".
    pub id_type: Option<String>,
    pub id_generator: Option<IdGenerator>,
    pub data_column: Option<String>,
    pub data_format: DataFormat,
}

impl CollectionOptions {
    pub fn new() -> Self { Self::default() }

    pub fn id_column(mut self, name: impl Into<String>) -> Self {
        self.id_column = Some(name.into());
        self
    }

    pub fn id_type(mut self, sql_type: impl Into<String>) -> Self {
        self.id_type = Some(sql_type.into());
        self
    }

    pub fn id_generator(mut self, generator: impl Fn(&serde_json::Value) -> SqlValue + Send + Sync + 'static) -> Self {
        self.id_generator = Some(Arc::new(generator));
        self
    }

    pub fn data_column(mut self, name: impl Into<String>) -> Self {
        self.data_column = Some(name.into());
        self
    }

    pub fn data_format(mut self, format: DataFormat) -> Self {
        self.data_format = format;
        self
    }
}

struct IdColumn {
    name: String,
    sql_type: String,
    generator: Option<IdGenerator>,
}

struct DataColumn {
    name: String,
    format: DataFormat,
}

/// A schema-managed table pairing an identifier column with a JSON-valued
/// payload column. Immutable after construction.
pub struct Collection<D: Driver> {
    driver: Arc<D>,
    table: String,
    id_col: IdColumn,
    data_col: DataColumn,
}

/// Check if a table/column/index name is valid
pub fn sane_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| match c {
            c if c.is_alphanumeric() => true,
            '_' | '.' | ':' => true,
            _ => false,
        })
}

fn base_type(sql_type: &str) -> String { sql_type.split_whitespace().next().unwrap_or("").to_uppercase() }

impl<D: Driver> Collection<D> {
    /// Create the backing table if absent and validate its schema.
    ///
    /// Validation reads `PRAGMA table_info` back: the id column's base type
    /// token must match the declared type, a declared `PRIMARY KEY` must be
    /// reflected in the column's pk flag, and the data column's type must fit
    /// the storage format. Any mismatch is a fatal `SchemaMismatch`.
    pub async fn create(driver: Arc<D>, table: &str, options: CollectionOptions) -> Result<Self> {
        let id_col = IdColumn {
            name: options.id_column.unwrap_or_else(|| DEFAULT_ID_COLUMN.to_owned()),
            sql_type: options.id_type.unwrap_or_else(|| DEFAULT_ID_TYPE.to_owned()),
            generator: options.id_generator,
        };
        let data_col = DataColumn { name: options.data_column.unwrap_or_else(|| DEFAULT_DATA_COLUMN.to_owned()), format: options.data_format };

        for name in [table, &id_col.name, &data_col.name] {
            if !sane_name(name) {
                return Err(Error::InvalidName(name.to_owned()));
            }
        }

        // Binary JSON is opt-in and must not silently fall back to text
        if data_col.format == DataFormat::Jsonb {
            driver.get("SELECT jsonb('{}')", Vec::new()).await.map_err(|e| Error::JsonbUnsupported(e.to_string()))?;
        }

        let create_sql = format!(
            r#"CREATE TABLE IF NOT EXISTS {} ({} {}, {} {})"#,
            quote_ident(table),
            quote_ident(&id_col.name),
            id_col.sql_type,
            quote_ident(&data_col.name),
            data_col.format.column_type()
        );
        debug!("creating collection table: {}", create_sql);
        driver.execute(&create_sql, Vec::new()).await?;

        let collection = Self { driver, table: table.to_owned(), id_col, data_col };
        collection.validate_schema().await?;
        Ok(collection)
    }

    async fn validate_schema(&self) -> Result<()> {
        let pragma = format!("PRAGMA table_info({})", quote_ident(&self.table));
        let mut rows = self.driver.select(&pragma, Vec::new()).await?;

        // (name, declared type, pk flag)
        let mut columns: Vec<(String, String, i64)> = Vec::new();
        while let Some(row) = rows.next().await {
            let row = row?;
            let name = row.get("name").and_then(|v| v.as_text()).unwrap_or("").to_owned();
            let declared = row.get("type").and_then(|v| v.as_text()).unwrap_or("").to_owned();
            let pk = row.get("pk").and_then(|v| v.as_integer()).unwrap_or(0);
            columns.push((name, declared, pk));
        }

        let expected_id_type = base_type(&self.id_col.sql_type);
        match columns.iter().find(|(name, _, _)| *name == self.id_col.name) {
            None => {
                return Err(Error::SchemaMismatch {
                    table: self.table.clone(),
                    column: self.id_col.name.clone(),
                    expected: expected_id_type,
                    actual: "none".to_owned(),
                });
            }
            Some((_, declared, pk)) => {
                if base_type(declared) != expected_id_type {
                    return Err(Error::SchemaMismatch {
                        table: self.table.clone(),
                        column: self.id_col.name.clone(),
                        expected: expected_id_type,
                        actual: declared.clone(),
                    });
                }
                if self.id_col.sql_type.to_uppercase().contains("PRIMARY KEY") && *pk != 1 {
                    return Err(Error::SchemaMismatch {
                        table: self.table.clone(),
                        column: self.id_col.name.clone(),
                        expected: "PRIMARY KEY".to_owned(),
                        actual: "not a primary key".to_owned(),
                    });
                }
            }
        }

        match columns.iter().find(|(name, _, _)| *name == self.data_col.name) {
            Some((_, declared, _)) if self.data_col.format.accepts_column_type(declared) => Ok(()),
            found => Err(Error::SchemaMismatch {
                table: self.table.clone(),
                column: self.data_col.name.clone(),
                expected: self.data_col.format.column_type().to_owned(),
                actual: found.map(|(_, declared, _)| declared.clone()).unwrap_or_else(|| "none".to_owned()),
            }),
        }
    }

    pub fn table(&self) -> &str { &self.table }

    pub fn data_format(&self) -> DataFormat { self.data_col.format }

    /// Fetch a single document by id. An absent row and a NULL payload both
    /// yield `None`.
    pub async fn get<T: DeserializeOwned>(&self, id: impl Into<SqlValue>) -> Result<Option<T>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.data_col.format.read_expr(&self.data_col.name),
            quote_ident(&self.table),
            quote_ident(&self.id_col.name)
        );
        let row = match self.driver.get(&sql, vec![id.into()]).await? {
            Some(row) => row,
            None => return Ok(None),
        };
        match payload(row, &self.data_col.name)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Batch fetch preserving input order and cardinality: each requested id
    /// maps to its document or `None`, even when ids repeat or are missing.
    /// Empty input returns an empty vec without touching storage.
    pub async fn get_many<T, I, V>(&self, ids: I) -> Result<Vec<Option<T>>>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        let ids: Vec<SqlValue> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {}, {} FROM {} WHERE {} IN ({})",
            quote_ident(&self.id_col.name),
            self.data_col.format.read_expr(&self.data_col.name),
            quote_ident(&self.table),
            quote_ident(&self.id_col.name),
            placeholders
        );

        let mut rows = self.driver.select(&sql, ids.clone()).await?;
        let mut by_id: HashMap<SqlValue, Option<serde_json::Value>> = HashMap::new();
        while let Some(row) = rows.next().await {
            let mut row = row?;
            let Some(id) = row.take(&self.id_col.name) else { continue };
            let value = payload(row, &self.data_col.name)?;
            by_id.insert(id, value);
        }

        // Duplicate requested ids are independent lookups into the same map
        let mut results = Vec::with_capacity(ids.len());
        for id in &ids {
            match by_id.get(id) {
                Some(Some(value)) => results.push(Some(serde_json::from_value(value.clone())?)),
                _ => results.push(None),
            }
        }
        Ok(results)
    }

    /// Upsert a document by id. Storage errors (e.g. an id type conflict)
    /// propagate unchanged.
    pub async fn set<T: Serialize>(&self, id: impl Into<SqlValue>, data: &T) -> Result<()> {
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}, {}) VALUES (?, {})",
            quote_ident(&self.table),
            quote_ident(&self.id_col.name),
            quote_ident(&self.data_col.name),
            self.data_col.format.write_placeholder()
        );
        let value = serde_json::to_string(data)?;
        self.driver.execute(&sql, vec![id.into(), SqlValue::Text(value)]).await?;
        Ok(())
    }

    /// Insert a document and return its id.
    ///
    /// With a configured generator the id is computed client-side and the
    /// write is an upsert, so retries are safe. Without one, the engine
    /// assigns the id and each retry produces a new row.
    pub async fn insert<T: Serialize>(&self, data: &T) -> Result<SqlValue> {
        let value = serde_json::to_value(data)?;
        match &self.id_col.generator {
            Some(generate) => {
                let id = generate(&value);
                let sql = format!(
                    "INSERT OR REPLACE INTO {} ({}, {}) VALUES (?, {})",
                    quote_ident(&self.table),
                    quote_ident(&self.id_col.name),
                    quote_ident(&self.data_col.name),
                    self.data_col.format.write_placeholder()
                );
                self.driver.execute(&sql, vec![id.clone(), SqlValue::Text(value.to_string())]).await?;
                Ok(id)
            }
            None => {
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    quote_ident(&self.table),
                    quote_ident(&self.data_col.name),
                    self.data_col.format.write_placeholder()
                );
                let exec = self.driver.execute(&sql, vec![SqlValue::Text(value.to_string())]).await?;
                self.driver.last_insert_rowid(&exec).await
            }
        }
    }

    /// Create an index on an expression over the payload. Accepts a bare
    /// field-path string or a full expression; re-issuing with the same name
    /// is idempotent (`CREATE INDEX IF NOT EXISTS`).
    pub async fn index(&self, name: &str, expr: impl Into<IndexExpr>, options: IndexOptions) -> Result<()> {
        if !sane_name(name) {
            return Err(Error::InvalidName(name.to_owned()));
        }

        let expr = expr.into().into_expr();
        // A bare literal describes no column value; reject it up front
        if matches!(expr, Expr::Literal(_)) {
            return Err(Error::InvalidIndexExpr("a bare literal cannot be indexed".to_owned()));
        }
        let expr_sql = compile_index_expr(&expr, &self.data_col.name, self.data_col.format.extract_fn())?;

        let mut sql = format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({}{})",
            if options.unique { "UNIQUE " } else { "" },
            quote_ident(name),
            quote_ident(&self.table),
            expr_sql,
            options.order.map(|dir| format!(" {}", dir.sql())).unwrap_or_default()
        );
        if let Some(method) = &options.using {
            sql.push_str(&format!(" USING {}", method));
        }

        debug!("creating index: {}", sql);
        self.driver.execute(&sql, Vec::new()).await?;
        Ok(())
    }

    /// Start a query scoped to this collection. Storage is not touched until
    /// a terminal operation on the returned builder runs.
    pub fn find(&self, filter: impl Into<Option<Expr>>) -> QueryBuilder<D> {
        QueryBuilder::new(self.driver.clone(), self.table.clone(), self.data_col.name.clone(), self.data_col.format, filter.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sane_name() {
        assert!(sane_name("test_collection"));
        assert!(sane_name("test.collection"));
        assert!(sane_name("test:collection"));
        assert!(!sane_name("test;collection"));
        assert!(!sane_name("test'collection"));
        assert!(!sane_name(""));
    }

    #[test]
    fn test_base_type() {
        assert_eq!(base_type("INTEGER PRIMARY KEY"), "INTEGER");
        assert_eq!(base_type("text unique"), "TEXT");
        assert_eq!(base_type("BLOB"), "BLOB");
    }

    #[test]
    fn data_format_column_types() {
        assert!(DataFormat::Json.accepts_column_type("JSON"));
        assert!(DataFormat::Json.accepts_column_type("text"));
        assert!(!DataFormat::Json.accepts_column_type("BLOB"));
        assert!(DataFormat::Jsonb.accepts_column_type("BLOB"));
        assert!(DataFormat::Jsonb.accepts_column_type("JSONB"));
        assert!(!DataFormat::Jsonb.accepts_column_type("JSON"));
    }

    #[test]
    fn read_expr_unwraps_jsonb() {
        assert_eq!(DataFormat::Json.read_expr("data"), r#""data""#);
        assert_eq!(DataFormat::Jsonb.read_expr("data"), r#"json("data") AS "data""#);
    }
}

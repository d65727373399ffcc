//! Document collections over SQLite's JSON functions
//!
//! Each logical collection is a two-column table: an identifier column and a
//! JSON (or JSONB) payload column. Documents are addressed, filtered,
//! ordered, and indexed through a small structured expression language; no
//! caller-supplied SQL text is ever interpolated into a statement.
//!
//! # SQLite Version Requirements
//!
//! Binary JSON (JSONB) storage requires SQLite 3.45.0 or later for the
//! `jsonb()`/`jsonb_extract()` function pair. The `rusqlite` crate with the
//! "bundled" feature includes a compatible version. Collections created with
//! `DataFormat::Jsonb` fail creation on engines without that support rather
//! than silently falling back to textual JSON.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docstore::{Collection, CollectionOptions, SqliteDriver};
//! use docstore::expr::{eq, field};
//!
//! let driver = Arc::new(SqliteDriver::open("myapp.db").await?);
//! let users = Collection::create(driver, "users", CollectionOptions::new()).await?;
//!
//! let id = users.insert(&serde_json::json!({ "name": "Alice", "value": 1 })).await?;
//! let alice: Option<serde_json::Value> = users.get(id).await?;
//! let matching: Vec<serde_json::Value> = users.find(eq(field("name"), "Alice")).all().await?;
//! ```

mod collection;
mod connection;
mod driver;
mod error;
pub mod expr;
mod filter;
mod index;
mod query;
mod sqlite;
mod value;

pub use collection::{sane_name, Collection, CollectionOptions, DataFormat, IdGenerator};
pub use connection::{PooledConnection, SqliteConfig, SqliteConnectionManager};
pub use driver::{Driver, Row, RowStream};
pub use error::{Error, Result};
pub use expr::{Dir, Expr, FieldPath};
pub use filter::compile_filter;
pub use index::{compile_index_expr, IndexExpr, IndexOptions};
pub use query::{OrderKey, QueryBuilder};
pub use sqlite::{SqliteDriver, SqliteExec, DEFAULT_POOL_SIZE};
pub use value::SqlValue;

//! Driver value type and conversions

use std::hash::{Hash, Hasher};

/// A SQL-level value crossing the driver boundary: bound parameters going in,
/// row cells coming out. Ids are `SqlValue`s too.
#[derive(Debug, Clone)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Map a JSON value to its SQL binding, the same way `json_extract`
    /// surfaces JSON scalars as SQL values: strings unquoted, booleans as
    /// 0/1, null as SQL NULL. Arrays and objects bind as JSON text.
    pub fn from_json(value: &serde_json::Value) -> SqlValue {
        match value {
            serde_json::Value::Null => SqlValue::Null,
            serde_json::Value::Bool(b) => SqlValue::Integer(if *b { 1 } else { 0 }),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    SqlValue::Real(f)
                } else {
                    SqlValue::Text(n.to_string())
                }
            }
            serde_json::Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, SqlValue::Null) }
}

// Batch get resolves rows through an id -> value map, so SqlValue must be a
// usable map key. Reals compare and hash by bit pattern.
impl PartialEq for SqlValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SqlValue::Null, SqlValue::Null) => true,
            (SqlValue::Integer(a), SqlValue::Integer(b)) => a == b,
            (SqlValue::Real(a), SqlValue::Real(b)) => a.to_bits() == b.to_bits(),
            (SqlValue::Text(a), SqlValue::Text(b)) => a == b,
            (SqlValue::Blob(a), SqlValue::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for SqlValue {}

impl Hash for SqlValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            SqlValue::Null => {}
            SqlValue::Integer(i) => i.hash(state),
            SqlValue::Real(f) => f.to_bits().hash(state),
            SqlValue::Text(s) => s.hash(state),
            SqlValue::Blob(b) => b.hash(state),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self { SqlValue::Integer(v) }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self { SqlValue::Integer(v as i64) }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self { SqlValue::Real(v) }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self { SqlValue::Integer(if v { 1 } else { 0 }) }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self { SqlValue::Text(v.to_owned()) }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self { SqlValue::Text(v) }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self { SqlValue::Blob(v) }
}

impl From<SqlValue> for rusqlite::types::Value {
    fn from(v: SqlValue) -> Self {
        match v {
            SqlValue::Null => rusqlite::types::Value::Null,
            SqlValue::Integer(i) => rusqlite::types::Value::Integer(i),
            SqlValue::Real(f) => rusqlite::types::Value::Real(f),
            SqlValue::Text(s) => rusqlite::types::Value::Text(s),
            SqlValue::Blob(b) => rusqlite::types::Value::Blob(b),
        }
    }
}

impl From<rusqlite::types::Value> for SqlValue {
    fn from(v: rusqlite::types::Value) -> Self {
        match v {
            rusqlite::types::Value::Null => SqlValue::Null,
            rusqlite::types::Value::Integer(i) => SqlValue::Integer(i),
            rusqlite::types::Value::Real(f) => SqlValue::Real(f),
            rusqlite::types::Value::Text(s) => SqlValue::Text(s),
            rusqlite::types::Value::Blob(b) => SqlValue::Blob(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_scalars_map_to_sql_values() {
        assert_eq!(SqlValue::from_json(&serde_json::json!(5)), SqlValue::Integer(5));
        assert_eq!(SqlValue::from_json(&serde_json::json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(SqlValue::from_json(&serde_json::json!("US")), SqlValue::Text("US".into()));
        assert_eq!(SqlValue::from_json(&serde_json::json!(true)), SqlValue::Integer(1));
        assert_eq!(SqlValue::from_json(&serde_json::json!(null)), SqlValue::Null);
    }

    #[test]
    fn json_compounds_bind_as_text() {
        assert_eq!(SqlValue::from_json(&serde_json::json!([1, 2])), SqlValue::Text("[1,2]".into()));
    }

    #[test]
    fn usable_as_map_key() {
        let mut map = std::collections::HashMap::new();
        map.insert(SqlValue::Integer(1), "a");
        map.insert(SqlValue::Text("x".into()), "b");
        assert_eq!(map.get(&SqlValue::Integer(1)), Some(&"a"));
        assert_eq!(map.get(&SqlValue::Text("x".into())), Some(&"b"));
        assert_eq!(map.get(&SqlValue::Integer(2)), None);
    }
}

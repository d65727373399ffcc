//! Index compiler: expressions to literal SQL for CREATE INDEX
//!
//! Index expressions cannot be parameterized, so every operand compiles to
//! literal SQL text. Unlike filters, function calls, casts, and arithmetic
//! are allowed; comparisons and boolean combinators are not, because an
//! index expression describes a value, not a predicate.

use crate::error::{Error, Result};
use crate::expr::{Dir, Expr, FieldPath};
use crate::filter::field_sql;

/// Options for `Collection::index()`.
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    pub unique: bool,
    /// Index method, appended as `USING <method>`. Stock SQLite has none;
    /// if the engine rejects it, the storage error surfaces verbatim.
    pub using: Option<String>,
    pub order: Option<Dir>,
}

/// Input to `Collection::index()`: a bare field-path string or a full
/// expression.
#[derive(Debug, Clone)]
pub enum IndexExpr {
    Field(FieldPath),
    Expr(Expr),
}

impl From<&str> for IndexExpr {
    fn from(path: &str) -> Self { IndexExpr::Field(FieldPath(path.to_owned())) }
}

impl From<String> for IndexExpr {
    fn from(path: String) -> Self { IndexExpr::Field(FieldPath(path)) }
}

impl From<FieldPath> for IndexExpr {
    fn from(path: FieldPath) -> Self { IndexExpr::Field(path) }
}

impl From<Expr> for IndexExpr {
    fn from(expr: Expr) -> Self { IndexExpr::Expr(expr) }
}

impl IndexExpr {
    pub(crate) fn into_expr(self) -> Expr {
        match self {
            IndexExpr::Field(path) => Expr::Path(path),
            IndexExpr::Expr(expr) => expr,
        }
    }
}

/// Compile an expression into a single SQL expression string suitable for a
/// `CREATE INDEX` column list.
pub fn compile_index_expr(expr: &Expr, data_col: &str, extract_fn: &str) -> Result<String> {
    match expr {
        Expr::Path(path) => Ok(field_sql(path, data_col, extract_fn)),
        Expr::Literal(value) => Ok(sql_literal(value)),
        Expr::FnCall { name, args } => {
            let args = args.iter().map(|a| compile_index_expr(a, data_col, extract_fn)).collect::<Result<Vec<_>>>()?;
            Ok(format!("{}({})", name, args.join(", ")))
        }
        Expr::Cast { expr, sql_type } => {
            Ok(format!("CAST({} AS {})", compile_index_expr(expr, data_col, extract_fn)?, sql_type))
        }
        Expr::Arith { op, left, right } => Ok(format!(
            "({} {} {})",
            compile_index_expr(left, data_col, extract_fn)?,
            op.sql(),
            compile_index_expr(right, data_col, extract_fn)?
        )),
        other => Err(Error::InvalidIndexExpr(format!("{} cannot appear in an index expression", other.shape()))),
    }
}

// Strings single-quoted with embedded quotes doubled, booleans as 1/0, null
// as NULL, numbers verbatim. Arrays and objects render as quoted JSON text.
fn sql_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_owned(),
        serde_json::Value::Bool(b) => (if *b { "1" } else { "0" }).to_owned(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{add, cast, eq, field, func, lit};

    #[test]
    fn field_path() {
        let sql = compile_index_expr(&Expr::Path(field("foo.bar")), "data", "json_extract").unwrap();
        assert_eq!(sql, r#"json_extract("data", '$.foo.bar')"#);
    }

    #[test]
    fn function_call() {
        let expr = func("lower", [Expr::Path(field("foo"))]);
        let sql = compile_index_expr(&expr, "data", "json_extract").unwrap();
        assert_eq!(sql, r#"lower(json_extract("data", '$.foo'))"#);
    }

    #[test]
    fn type_cast() {
        let expr = cast(field("foo"), "TEXT");
        let sql = compile_index_expr(&expr, "data", "json_extract").unwrap();
        assert_eq!(sql, r#"CAST(json_extract("data", '$.foo') AS TEXT)"#);
    }

    #[test]
    fn arithmetic() {
        let expr = add(field("score"), 10);
        let sql = compile_index_expr(&expr, "data", "json_extract").unwrap();
        assert_eq!(sql, r#"(json_extract("data", '$.score') + 10)"#);
    }

    #[test]
    fn literals_render_as_sql_text_never_parameters() {
        assert_eq!(compile_index_expr(&lit("o'brien"), "data", "json_extract").unwrap(), "'o''brien'");
        assert_eq!(compile_index_expr(&lit(true), "data", "json_extract").unwrap(), "1");
        assert_eq!(compile_index_expr(&lit(false), "data", "json_extract").unwrap(), "0");
        assert_eq!(compile_index_expr(&lit(serde_json::Value::Null), "data", "json_extract").unwrap(), "NULL");
        assert_eq!(compile_index_expr(&lit(42), "data", "json_extract").unwrap(), "42");
    }

    #[test]
    fn comparison_is_rejected() {
        let err = compile_index_expr(&eq(field("n"), 5), "data", "json_extract").unwrap_err();
        assert!(matches!(err, Error::InvalidIndexExpr(_)));
    }

    #[test]
    fn jsonb_extraction_function() {
        let sql = compile_index_expr(&Expr::Path(field("foo")), "data", "jsonb_extract").unwrap();
        assert_eq!(sql, r#"jsonb_extract("data", '$.foo')"#);
    }

    #[test]
    fn nested_arithmetic_with_cast() {
        let expr = add(cast(field("a"), "INTEGER"), cast(field("b"), "INTEGER"));
        let sql = compile_index_expr(&expr, "data", "json_extract").unwrap();
        assert_eq!(sql, r#"(CAST(json_extract("data", '$.a') AS INTEGER) + CAST(json_extract("data", '$.b') AS INTEGER))"#);
    }
}

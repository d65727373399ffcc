//! Query compiler: filter expressions to parameterized WHERE clauses
//!
//! Filters are restricted to comparison and boolean shapes. Field paths
//! render as JSON-extraction calls against the data column; every other
//! operand renders as a `?` placeholder with its value appended to the
//! parameter list in left-to-right order.

use crate::error::{Error, Result};
use crate::expr::{Expr, FieldPath};
use crate::value::SqlValue;

/// Double-quote an identifier for use in generated SQL.
pub(crate) fn quote_ident(name: &str) -> String { format!(r#""{}""#, name.replace('"', "\"\"")) }

/// Render a field path as a JSON-extraction call, e.g.
/// `json_extract("data", '$.user.name')`. The extraction function depends on
/// the collection's storage format.
pub(crate) fn field_sql(path: &FieldPath, data_col: &str, extract_fn: &str) -> String {
    let json_path = format!("$.{}", path.as_str().replace('\'', "''"));
    format!("{}({}, '{}')", extract_fn, quote_ident(data_col), json_path)
}

/// Compile a filter expression into a SQL boolean expression plus the bound
/// parameter values, in placeholder order.
pub fn compile_filter(expr: &Expr, data_col: &str, extract_fn: &str) -> Result<(String, Vec<SqlValue>)> {
    let mut sql = String::new();
    let mut params = Vec::new();
    predicate(expr, data_col, extract_fn, &mut sql, &mut params)?;
    Ok((sql, params))
}

fn predicate(expr: &Expr, data_col: &str, extract_fn: &str, sql: &mut String, params: &mut Vec<SqlValue>) -> Result<()> {
    match expr {
        Expr::Compare { op, left, right } => {
            operand(left, data_col, extract_fn, sql, params)?;
            sql.push(' ');
            sql.push_str(op.sql());
            sql.push(' ');
            operand(right, data_col, extract_fn, sql, params)?;
        }
        Expr::And(operands) => combine(operands, " AND ", data_col, extract_fn, sql, params)?,
        Expr::Or(operands) => combine(operands, " OR ", data_col, extract_fn, sql, params)?,
        Expr::Not(inner) => {
            sql.push_str("NOT (");
            predicate(inner, data_col, extract_fn, sql, params)?;
            sql.push(')');
        }
        other => {
            return Err(Error::InvalidFilter(format!("{} is not a predicate", other.shape())));
        }
    }
    Ok(())
}

fn combine(operands: &[Expr], keyword: &str, data_col: &str, extract_fn: &str, sql: &mut String, params: &mut Vec<SqlValue>) -> Result<()> {
    if operands.is_empty() {
        return Err(Error::InvalidFilter(format!("{} requires at least one operand", keyword.trim())));
    }
    for (i, part) in operands.iter().enumerate() {
        if i > 0 {
            sql.push_str(keyword);
        }
        sql.push('(');
        predicate(part, data_col, extract_fn, sql, params)?;
        sql.push(')');
    }
    Ok(())
}

fn operand(expr: &Expr, data_col: &str, extract_fn: &str, sql: &mut String, params: &mut Vec<SqlValue>) -> Result<()> {
    match expr {
        Expr::Path(path) => sql.push_str(&field_sql(path, data_col, extract_fn)),
        Expr::Literal(value) => {
            sql.push('?');
            params.push(SqlValue::from_json(value));
        }
        other => {
            return Err(Error::InvalidFilter(format!("comparison operands must be field paths or literals, got {}", other.shape())));
        }
    }
    Ok(())
}

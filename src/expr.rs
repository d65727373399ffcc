//! Expression model for filters and index definitions.
//!
//! Expressions are plain values: a field path into the JSON payload, a
//! literal, a comparison, a boolean combinator, or (for index definitions
//! only) a function call, type cast, or arithmetic operation. The free
//! functions at the bottom are the DSL surface; they carry no hidden state.

use serde::{Deserialize, Serialize};

/// A dot-delimited path into the JSON payload, e.g. `user.address.city`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPath(pub String);

impl FieldPath {
    pub fn as_str(&self) -> &str { &self.0 }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Field reference, compiled to a JSON-extraction call.
    Path(FieldPath),
    /// Literal value: bound as a parameter in filters, rendered as a SQL
    /// literal in index expressions.
    Literal(serde_json::Value),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// Function call, valid in index definitions only.
    FnCall {
        name: String,
        args: Vec<Expr>,
    },
    /// Type cast, valid in index definitions only.
    Cast {
        expr: Box<Expr>,
        sql_type: String,
    },
    /// Arithmetic, valid in index definitions only.
    Arith {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Human-readable name of the variant, used in validation errors.
    pub(crate) fn shape(&self) -> &'static str {
        match self {
            Expr::Path(_) => "field path",
            Expr::Literal(_) => "literal",
            Expr::Compare { .. } => "comparison",
            Expr::And(_) => "AND",
            Expr::Or(_) => "OR",
            Expr::Not(_) => "NOT",
            Expr::FnCall { .. } => "function call",
            Expr::Cast { .. } => "cast",
            Expr::Arith { .. } => "arithmetic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

/// Ordering direction for `order()` terms and index definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dir {
    Asc,
    Desc,
}

impl Dir {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Dir::Asc => "ASC",
            Dir::Desc => "DESC",
        }
    }
}

impl From<FieldPath> for Expr {
    fn from(path: FieldPath) -> Self { Expr::Path(path) }
}

impl From<serde_json::Value> for Expr {
    fn from(value: serde_json::Value) -> Self { Expr::Literal(value) }
}

// Any plain JSON-convertible value in an Expr position is a literal.
macro_rules! literal_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Expr {
            fn from(value: $t) -> Self { Expr::Literal(value.into()) }
        })*
    };
}

literal_from!(bool, i32, i64, u32, f64, &str, String);

/// Field path selector: `field("user.name")`.
pub fn field(path: impl Into<String>) -> FieldPath { FieldPath(path.into()) }

/// Explicit literal, for values without an `Into<Expr>` impl.
pub fn lit(value: impl Into<serde_json::Value>) -> Expr { Expr::Literal(value.into()) }

fn compare(op: CompareOp, left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
    Expr::Compare { op, left: Box::new(left.into()), right: Box::new(right.into()) }
}

pub fn eq(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr { compare(CompareOp::Eq, left, right) }
pub fn ne(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr { compare(CompareOp::Ne, left, right) }
pub fn gt(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr { compare(CompareOp::Gt, left, right) }
pub fn gte(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr { compare(CompareOp::Gte, left, right) }
pub fn lt(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr { compare(CompareOp::Lt, left, right) }
pub fn lte(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr { compare(CompareOp::Lte, left, right) }

pub fn and(operands: impl IntoIterator<Item = Expr>) -> Expr { Expr::And(operands.into_iter().collect()) }
pub fn or(operands: impl IntoIterator<Item = Expr>) -> Expr { Expr::Or(operands.into_iter().collect()) }
pub fn not(operand: impl Into<Expr>) -> Expr { Expr::Not(Box::new(operand.into())) }

/// Function call for index expressions: `func("lower", [field("email").into()])`.
pub fn func(name: impl Into<String>, args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::FnCall { name: name.into(), args: args.into_iter().collect() }
}

/// Type cast for index expressions: `cast(field("age"), "INTEGER")`.
pub fn cast(expr: impl Into<Expr>, sql_type: impl Into<String>) -> Expr {
    Expr::Cast { expr: Box::new(expr.into()), sql_type: sql_type.into() }
}

fn arith(op: ArithOp, left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
    Expr::Arith { op, left: Box::new(left.into()), right: Box::new(right.into()) }
}

pub fn add(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr { arith(ArithOp::Add, left, right) }
pub fn sub(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr { arith(ArithOp::Sub, left, right) }
pub fn mul(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr { arith(ArithOp::Mul, left, right) }
pub fn div(left: impl Into<Expr>, right: impl Into<Expr>) -> Expr { arith(ArithOp::Div, left, right) }

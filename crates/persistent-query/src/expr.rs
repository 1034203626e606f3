//! Filter expressions.
//!
//! Expressions name columns by property name or by column name. When a query
//! carries an alias map, names found in it are replaced by their mapped column
//! expression; everything else is quoted for the target dialect.
//!
//! # Example
//!
//! ```
//! use persistent_query::{AliasMap, Dialect, Expr};
//!
//! let aliases = AliasMap::from([("name".to_string(), "\"person\".\"full_name\"".to_string())]);
//! let expr = Expr::col("name").eq("Ann").and(Expr::col("age").gt(18));
//!
//! let mut params = Vec::new();
//! let sql = expr.build(Dialect::Sqlite, &aliases, &mut params);
//! assert_eq!(sql, "((\"person\".\"full_name\" = ?1) AND (\"age\" > ?2))");
//! assert_eq!(params.len(), 2);
//! ```

use persistent_core::{Dialect, Value};

use crate::builder::AliasMap;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `LIKE`
    Like,
    /// `AND`
    And,
    /// `OR`
    Or,
}

impl BinaryOp {
    /// SQL spelling of the operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Like => "LIKE",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }
}

/// A SQL expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A property or column name, optionally `qualifier.name`.
    Column(String),
    /// A bound parameter.
    Value(Value),
    /// Literal SQL, emitted as is.
    Raw(String),
    /// `left op right`
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// `expr IS NULL`
    IsNull(Box<Expr>),
    /// `expr IS NOT NULL`
    IsNotNull(Box<Expr>),
    /// `expr IN (values)`
    In { expr: Box<Expr>, values: Vec<Value> },
    /// `NOT expr`
    Not(Box<Expr>),
}

impl Expr {
    /// Reference a property or column.
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    /// A bound value.
    pub fn value(value: impl Into<Value>) -> Self {
        Expr::Value(value.into())
    }

    /// Literal SQL.
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    fn binary(self, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    /// `self = value`
    pub fn eq(self, value: impl Into<Value>) -> Self {
        self.binary(BinaryOp::Eq, Expr::value(value))
    }

    /// `self <> value`
    pub fn ne(self, value: impl Into<Value>) -> Self {
        self.binary(BinaryOp::Ne, Expr::value(value))
    }

    /// `self < value`
    pub fn lt(self, value: impl Into<Value>) -> Self {
        self.binary(BinaryOp::Lt, Expr::value(value))
    }

    /// `self <= value`
    pub fn le(self, value: impl Into<Value>) -> Self {
        self.binary(BinaryOp::Le, Expr::value(value))
    }

    /// `self > value`
    pub fn gt(self, value: impl Into<Value>) -> Self {
        self.binary(BinaryOp::Gt, Expr::value(value))
    }

    /// `self >= value`
    pub fn ge(self, value: impl Into<Value>) -> Self {
        self.binary(BinaryOp::Ge, Expr::value(value))
    }

    /// `self LIKE pattern`
    pub fn like(self, pattern: impl Into<String>) -> Self {
        self.binary(BinaryOp::Like, Expr::Value(Value::Text(pattern.into())))
    }

    /// `self = other` where `other` is another column.
    pub fn eq_col(self, other: impl Into<String>) -> Self {
        self.binary(BinaryOp::Eq, Expr::col(other))
    }

    /// `self IS NULL`
    pub fn is_null(self) -> Self {
        Expr::IsNull(Box::new(self))
    }

    /// `self IS NOT NULL`
    pub fn is_not_null(self) -> Self {
        Expr::IsNotNull(Box::new(self))
    }

    /// `self IN (values...)`; an empty list never matches.
    pub fn in_list<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `self AND other`
    pub fn and(self, other: Expr) -> Self {
        self.binary(BinaryOp::And, other)
    }

    /// `self OR other`
    pub fn or(self, other: Expr) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    /// `NOT self`
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// AND together all expressions; `None` if there are none.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Option<Self> {
        exprs.into_iter().reduce(Expr::and)
    }

    /// Render as SQL, appending bound values to `params`.
    ///
    /// Placeholders are numbered after the values already in `params`.
    pub fn build(&self, dialect: Dialect, aliases: &AliasMap, params: &mut Vec<Value>) -> String {
        match self {
            Expr::Column(name) => resolve_column(name, dialect, aliases),
            Expr::Value(value) => {
                params.push(value.clone());
                dialect.placeholder(params.len())
            }
            Expr::Raw(sql) => sql.clone(),
            Expr::Binary { left, op, right } => {
                let left = left.build(dialect, aliases, params);
                let right = right.build(dialect, aliases, params);
                format!("({left} {} {right})", op.as_str())
            }
            Expr::IsNull(expr) => format!("{} IS NULL", expr.build(dialect, aliases, params)),
            Expr::IsNotNull(expr) => {
                format!("{} IS NOT NULL", expr.build(dialect, aliases, params))
            }
            Expr::In { expr, values } => {
                let target = expr.build(dialect, aliases, params);
                if values.is_empty() {
                    return "1 = 0".to_string();
                }
                let placeholders: Vec<_> = values
                    .iter()
                    .map(|v| {
                        params.push(v.clone());
                        dialect.placeholder(params.len())
                    })
                    .collect();
                format!("{target} IN ({})", placeholders.join(", "))
            }
            Expr::Not(expr) => format!("NOT ({})", expr.build(dialect, aliases, params)),
        }
    }
}

/// Resolve a property or column name to SQL.
///
/// Alias hits are emitted verbatim. A dotted name whose qualifier is an alias (a
/// class name mapped to its table) keeps the mapped qualifier. Anything else is
/// quoted part by part.
pub fn resolve_column(name: &str, dialect: Dialect, aliases: &AliasMap) -> String {
    if let Some(mapped) = aliases.get(name) {
        return mapped.clone();
    }
    match name.split_once('.') {
        Some((qualifier, column)) => {
            let qualifier = aliases
                .get(qualifier)
                .cloned()
                .unwrap_or_else(|| dialect.quote_identifier(qualifier));
            format!("{qualifier}.{}", dialect.quote_identifier(column))
        }
        None => dialect.quote_identifier(name),
    }
}

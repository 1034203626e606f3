//! Driver contract: transactions, identifier quoting and the prepared-statement
//! protocol.
//!
//! The session never talks SQL to a driver directly; it prepares a built statement,
//! executes it, inspects the error code and then either fetches rows or reads the
//! affected-row count. Drivers implement the two traits below.

use crate::identifiers::{quote_ident, quote_ident_mysql};
use crate::row::Row;
use crate::value::Value;

/// SQL dialect spoken by a driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL: `$1` placeholders, `"ident"` quoting, sequences.
    #[default]
    Postgres,
    /// SQLite: `?1` placeholders, `"ident"` quoting.
    Sqlite,
    /// MySQL: `?` placeholders, `` `ident` `` quoting.
    Mysql,
}

impl Dialect {
    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Quote a single identifier.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => quote_ident(name),
            Dialect::Mysql => quote_ident_mysql(name),
        }
    }

    /// Whether the dialect has native sequences (`nextval`).
    pub const fn supports_sequences(self) -> bool {
        matches!(self, Dialect::Postgres)
    }
}

/// A failure reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    /// Driver-specific error code; never zero.
    pub code: i32,
    /// Human readable message.
    pub message: String,
}

impl DriverError {
    /// Create a driver error.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for DriverError {}

/// A prepared statement bound to its parameters.
pub trait Statement {
    /// Execute the statement.
    fn execute(&mut self) -> Result<(), DriverError>;

    /// Error code of the last execution; `0` means success.
    fn error_code(&self) -> i32;

    /// Advance the cursor by one row. Returns `Ok(None)` once exhausted.
    fn fetch(&mut self) -> Result<Option<Row>, DriverError>;

    /// Rows changed by an INSERT/UPDATE/DELETE.
    fn rows_affected(&self) -> u64;
}

/// A database connection.
///
/// Methods take `&self`: a connection is used from a single thread of control and
/// drivers use interior mutability where they need it.
pub trait Database {
    /// Statement type; may borrow the connection.
    type Statement<'conn>: Statement
    where
        Self: 'conn;

    /// Dialect used to build SQL for this connection.
    fn dialect(&self) -> Dialect;

    /// Start a transaction.
    fn begin_transaction(&self) -> Result<(), DriverError>;

    /// Commit the current transaction.
    fn commit(&self) -> Result<(), DriverError>;

    /// Roll back the current transaction.
    fn rollback(&self) -> Result<(), DriverError>;

    /// Quote an identifier for this connection.
    fn quote_identifier(&self, name: &str) -> String {
        self.dialect().quote_identifier(name)
    }

    /// Prepare `sql` with bound `params`.
    fn prepare(&self, sql: &str, params: &[Value]) -> Result<Self::Statement<'_>, DriverError>;

    /// Identifier generated by the last INSERT, optionally for a named sequence.
    fn last_insert_id(&self, sequence: Option<&str>) -> Result<Value, DriverError>;
}

//! SQLite driver for Persistent Rust.
//!
//! `persistent-sqlite` implements the `Database`/`Statement` contract over a
//! `rusqlite` connection. It is the reference driver used by the facade crate's
//! integration tests and works well for embedded applications.
//!
//! Statements run eagerly: [`Statement::execute`] buffers the full result set, and
//! [`Statement::fetch`] hands rows out one at a time. Transactions are plain
//! `BEGIN`/`COMMIT`/`ROLLBACK` statements; nesting is handled by the session.
//!
//! ```no_run
//! use persistent_sqlite::SqliteDatabase;
//!
//! let db = SqliteDatabase::open_memory()?;
//! db.execute_batch("CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT)")?;
//! # Ok::<(), persistent_core::DriverError>(())
//! ```

mod value;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use persistent_core::{Database, Dialect, DriverError, Row, Statement, Value};
use rusqlite::Connection;

use crate::value::SqlParam;

/// Convert a rusqlite error, keeping SQLite's extended result code.
fn driver_error(err: &rusqlite::Error) -> DriverError {
    let code = match err {
        rusqlite::Error::SqliteFailure(failure, _) => failure.extended_code,
        _ => rusqlite::ffi::SQLITE_ERROR,
    };
    DriverError::new(code, err.to_string())
}

/// A SQLite connection.
#[derive(Debug)]
pub struct SqliteDatabase {
    connection: Connection,
}

impl SqliteDatabase {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|e| driver_error(&e))?;
        tracing::debug!(path = %path.display(), "Opened SQLite database");
        Ok(Self { connection })
    }

    /// Open a private in-memory database.
    pub fn open_memory() -> Result<Self, DriverError> {
        let connection = Connection::open_in_memory().map_err(|e| driver_error(&e))?;
        tracing::debug!("Opened in-memory SQLite database");
        Ok(Self { connection })
    }

    /// Wrap an existing connection.
    pub fn from_connection(connection: Connection) -> Self {
        Self { connection }
    }

    /// Run one or more `;`-separated statements without parameters, e.g. DDL.
    pub fn execute_batch(&self, sql: &str) -> Result<(), DriverError> {
        self.connection.execute_batch(sql).map_err(|e| driver_error(&e))
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn command(&self, sql: &str) -> Result<(), DriverError> {
        tracing::trace!(sql = %sql, "SQLite transaction command");
        self.execute_batch(sql)
    }
}

impl Database for SqliteDatabase {
    type Statement<'conn> = SqliteStatement<'conn>;

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn begin_transaction(&self) -> Result<(), DriverError> {
        self.command("BEGIN")
    }

    fn commit(&self) -> Result<(), DriverError> {
        self.command("COMMIT")
    }

    fn rollback(&self) -> Result<(), DriverError> {
        self.command("ROLLBACK")
    }

    fn prepare(&self, sql: &str, params: &[Value]) -> Result<SqliteStatement<'_>, DriverError> {
        let statement = self.connection.prepare(sql).map_err(|e| driver_error(&e))?;
        Ok(SqliteStatement {
            statement,
            params: params.to_vec(),
            rows: VecDeque::new(),
            rows_affected: 0,
            error_code: 0,
        })
    }

    /// SQLite has no sequences; the sequence name is ignored.
    fn last_insert_id(&self, _sequence: Option<&str>) -> Result<Value, DriverError> {
        Ok(Value::BigInt(self.connection.last_insert_rowid()))
    }
}

/// A prepared SQLite statement with its bound parameters.
#[derive(Debug)]
pub struct SqliteStatement<'c> {
    statement: rusqlite::Statement<'c>,
    params: Vec<Value>,
    rows: VecDeque<Row>,
    rows_affected: u64,
    error_code: i32,
}

impl SqliteStatement<'_> {
    fn run(&mut self) -> rusqlite::Result<()> {
        let params = rusqlite::params_from_iter(self.params.iter().map(SqlParam));
        if self.statement.column_count() == 0 {
            let changed = self.statement.execute(params)?;
            self.rows_affected = u64::try_from(changed).unwrap_or(u64::MAX);
            return Ok(());
        }

        let columns: Arc<Vec<String>> = Arc::new(
            self.statement
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        );
        let width = columns.len();
        let mut buffered = VecDeque::new();
        let mut rows = self.statement.query(params)?;
        while let Some(row) = rows.next()? {
            let values = (0..width)
                .map(|index| row.get_ref(index).map(value::from_sql))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            buffered.push_back(Row::new(Arc::clone(&columns), values));
        }
        self.rows = buffered;
        Ok(())
    }
}

impl Statement for SqliteStatement<'_> {
    fn execute(&mut self) -> Result<(), DriverError> {
        self.rows.clear();
        self.rows_affected = 0;
        match self.run() {
            Ok(()) => {
                self.error_code = 0;
                tracing::trace!(rows = self.rows.len(), changed = self.rows_affected, "Executed SQLite statement");
                Ok(())
            }
            Err(err) => {
                let err = driver_error(&err);
                self.error_code = err.code;
                Err(err)
            }
        }
    }

    fn error_code(&self) -> i32 {
        self.error_code
    }

    fn fetch(&mut self) -> Result<Option<Row>, DriverError> {
        Ok(self.rows.pop_front())
    }

    fn rows_affected(&self) -> u64 {
        self.rows_affected
    }
}

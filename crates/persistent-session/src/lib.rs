//! Persistent session for Persistent Rust.
//!
//! The [`Session`] is the single entry point for moving persistent objects in and
//! out of a database. It owns a connection and a definition source, and it routes
//! every generated statement through one transactional choke point,
//! [`Session::perform_query`].
//!
//! # Design Philosophy
//!
//! - **Definitions drive everything**: tables, columns and relations come from the
//!   [`DefinitionManager`], looked up by the object's class name.
//! - **One choke point**: every statement runs inside a transaction scope; a
//!   failing statement rolls back and surfaces as [`Error::QueryExecution`].
//! - **Nested scopes**: multi-statement operations (insert + id read-back, cascading
//!   deletes) run in one enclosing scope and commit or roll back as a unit.
//! - **Explicit cursors**: a [`FindIterator`] owns the connection's read position
//!   until it is drained, flushed or dropped; other queries fail meanwhile.
//!
//! # Example
//!
//! ```ignore
//! let session = Session::new(database, definitions);
//!
//! let mut person = Person { name: "Ann".into(), ..Default::default() };
//! session.save(&mut person)?;
//!
//! let query = session
//!     .create_find_query("Person")?
//!     .filter(Expr::col("name").like("A%"));
//! let people: Vec<Person> = session.find(&query)?;
//!
//! session.delete(&mut person)?;
//! ```

mod config;
mod delete;
pub mod iterator;
mod load;
mod save;
mod transaction;
mod translator;

#[cfg(test)]
mod fake;

pub use config::SessionConfig;
pub use iterator::FindIterator;

use std::cell::Cell;
use std::sync::Arc;

use persistent_core::{
    Database, DefinitionManager, DriverError, Error, ObjectDefinition, Result, Statement, Value,
};
use persistent_query::BuildQuery;

use crate::transaction::TransactionState;

// ============================================================================
// Session
// ============================================================================

/// Mediates all CRUD and relation traffic between persistent objects and a
/// database.
///
/// A session is used from one thread of control; it is neither `Send` nor `Sync`.
pub struct Session<D: Database> {
    /// The database connection.
    database: D,
    /// Where definitions come from.
    definitions: Box<dyn DefinitionManager>,
    /// Configuration.
    config: SessionConfig,
    /// Nesting depth and failure flag of the current transaction.
    transaction: TransactionState,
    /// Whether a find iterator currently owns the read position.
    cursor_open: Cell<bool>,
}

impl<D: Database> Session<D> {
    /// Create a session with the default configuration.
    pub fn new(database: D, definitions: impl DefinitionManager + 'static) -> Self {
        Self::with_config(database, definitions, SessionConfig::default())
    }

    /// Create a session with a custom configuration.
    pub fn with_config(
        database: D,
        definitions: impl DefinitionManager + 'static,
        config: SessionConfig,
    ) -> Self {
        Self {
            database,
            definitions: Box::new(definitions),
            config,
            transaction: TransactionState::default(),
            cursor_open: Cell::new(false),
        }
    }

    /// The underlying connection.
    pub fn database(&self) -> &D {
        &self.database
    }

    /// The definition source.
    pub fn definition_manager(&self) -> &dyn DefinitionManager {
        self.definitions.as_ref()
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Definition of `class`.
    pub fn fetch_definition(&self, class: &str) -> Result<Arc<ObjectDefinition>> {
        self.definitions.fetch_definition(class)
    }

    /// Whether a find iterator is still open.
    pub fn has_open_cursor(&self) -> bool {
        self.cursor_open.get()
    }

    fn ensure_no_cursor(&self) -> Result<()> {
        if self.cursor_open.get() {
            return Err(Error::CursorOutstanding);
        }
        Ok(())
    }

    // ========================================================================
    // Query Execution
    // ========================================================================

    /// Execute `query` inside a transaction scope and return the executed
    /// statement.
    ///
    /// Prepares, executes and inspects the driver's error code. A driver failure
    /// or a non-zero error code rolls the scope back and yields
    /// [`Error::QueryExecution`] carrying the SQL; otherwise the scope commits
    /// (or, when nested, leaves the decision to the enclosing scope).
    #[tracing::instrument(level = "debug", skip(self, query))]
    pub fn perform_query<Q: BuildQuery + ?Sized>(&self, query: &Q) -> Result<D::Statement<'_>> {
        self.ensure_no_cursor()?;
        let (sql, params) = query.build_with_dialect(self.database.dialect());
        tracing::debug!(sql = %sql, params = params.len(), "Performing query");

        self.begin_scope()?;
        match self.execute_statement(&sql, &params) {
            Ok(statement) => {
                self.commit_scope()?;
                Ok(statement)
            }
            Err(err) => {
                tracing::warn!(sql = %sql, error = %err, "Query failed");
                self.abort_scope();
                Err(err)
            }
        }
    }

    fn execute_statement(&self, sql: &str, params: &[Value]) -> Result<D::Statement<'_>> {
        let mut statement = self
            .database
            .prepare(sql, params)
            .map_err(|e| query_error(e, sql))?;
        statement.execute().map_err(|e| query_error(e, sql))?;

        let code = statement.error_code();
        if code != 0 {
            return Err(Error::QueryExecution {
                message: format!("The query returned error code {code}."),
                code,
                sql: sql.to_string(),
            });
        }
        Ok(statement)
    }

    /// SQL text of `query` for this connection, for diagnostics.
    pub(crate) fn sql_of<Q: BuildQuery + ?Sized>(&self, query: &Q) -> String {
        query.build_with_dialect(self.database.dialect()).0
    }
}

impl<D: Database> std::fmt::Debug for Session<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dialect", &self.database.dialect())
            .field("config", &self.config)
            .field("transaction_depth", &self.transaction_depth())
            .field("cursor_open", &self.cursor_open.get())
            .finish_non_exhaustive()
    }
}

/// Translate a driver failure into the runtime's error type.
pub(crate) fn query_error(err: DriverError, sql: &str) -> Error {
    Error::QueryExecution {
        message: err.message,
        code: err.code,
        sql: sql.to_string(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeDatabase, definitions};
    use persistent_query::{Expr, RawQuery};

    #[test]
    fn test_perform_query_commits_own_transaction() {
        let session = Session::new(FakeDatabase::default(), definitions());
        session.perform_query(&RawQuery::new("SELECT 1")).unwrap();
        assert_eq!(
            session.database().log(),
            vec!["BEGIN", "SELECT 1", "COMMIT"]
        );
    }

    #[test]
    fn test_perform_query_rolls_back_on_error_code() {
        let db = FakeDatabase::default();
        db.fail_with_code("DELETE", 19);
        let session = Session::new(db, definitions());

        let query = session
            .create_delete_query("Person")
            .unwrap()
            .filter(Expr::col("id").eq(1_i64));
        let err = session.delete_from_query(&query).unwrap_err();

        match err {
            Error::QueryExecution { message, code, sql } => {
                assert_eq!(message, "The query returned error code 19.");
                assert_eq!(code, 19);
                assert_eq!(sql, "DELETE FROM \"person\" WHERE (\"id\" = ?1)");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(session.database().log().last().map(String::as_str), Some("ROLLBACK"));
    }

    #[test]
    fn test_perform_query_translates_driver_failure() {
        let db = FakeDatabase::default();
        db.fail_with_error("bogus", "syntax error");
        let session = Session::new(db, definitions());

        let err = session.perform_query(&RawQuery::new("bogus sql")).unwrap_err();
        assert!(err.is_query_error());
        assert!(err.to_string().contains("syntax error"));
        assert!(err.to_string().contains("bogus sql"));
        assert_eq!(session.database().log(), vec!["BEGIN", "bogus sql", "ROLLBACK"]);
    }

    #[test]
    fn test_unknown_class_is_definition_not_found() {
        let session = Session::new(FakeDatabase::default(), definitions());
        assert!(matches!(
            session.create_find_query("Nope"),
            Err(Error::DefinitionNotFound { .. })
        ));
        assert!(session.database().log().is_empty());
    }
}

//! Nested transaction scopes.
//!
//! Only the outermost scope talks to the database: it issues BEGIN on entry and
//! COMMIT or ROLLBACK on exit. Inner scopes only count nesting. A failing inner
//! scope dooms the whole transaction, so the outermost scope rolls back even if
//! the caller recovered from the inner error.

use std::cell::Cell;

use persistent_core::{Database, Error, Result};

use crate::{Session, query_error};

#[derive(Debug, Default)]
pub(crate) struct TransactionState {
    depth: Cell<usize>,
    doomed: Cell<bool>,
}

impl<D: Database> Session<D> {
    /// Run `f` inside one transaction.
    ///
    /// Every session call made from `f` joins the transaction. It commits when `f`
    /// returns `Ok` and no statement inside failed; otherwise it rolls back. If a
    /// statement failed but `f` still returned `Ok`, the result is
    /// [`Error::TransactionAborted`].
    ///
    /// ```ignore
    /// session.transaction(|s| {
    ///     s.save(&mut person)?;
    ///     s.save(&mut address)
    /// })?;
    /// ```
    #[tracing::instrument(level = "debug", skip(self, f))]
    pub fn transaction<R>(&self, f: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
        self.in_transaction(|| f(self))
    }

    /// Current nesting depth; zero outside any transaction.
    pub fn transaction_depth(&self) -> usize {
        self.transaction.depth.get()
    }

    /// Fails with [`Error::CursorOutstanding`] before touching the database
    /// while a find iterator is open.
    pub(crate) fn in_transaction<R>(&self, f: impl FnOnce() -> Result<R>) -> Result<R> {
        self.ensure_no_cursor()?;
        self.begin_scope()?;
        match f() {
            Ok(value) => {
                self.commit_scope()?;
                Ok(value)
            }
            Err(err) => {
                self.abort_scope();
                Err(err)
            }
        }
    }

    pub(crate) fn begin_scope(&self) -> Result<()> {
        let depth = self.transaction.depth.get();
        if depth == 0 {
            self.database
                .begin_transaction()
                .map_err(|e| query_error(e, "BEGIN"))?;
            self.transaction.doomed.set(false);
        }
        self.transaction.depth.set(depth + 1);
        Ok(())
    }

    pub(crate) fn commit_scope(&self) -> Result<()> {
        let depth = self.transaction.depth.get().saturating_sub(1);
        self.transaction.depth.set(depth);
        if depth > 0 {
            return Ok(());
        }
        if self.transaction.doomed.replace(false) {
            self.rollback_quietly();
            return Err(Error::TransactionAborted);
        }
        if let Err(err) = self.database.commit() {
            self.rollback_quietly();
            return Err(query_error(err, "COMMIT"));
        }
        Ok(())
    }

    pub(crate) fn abort_scope(&self) {
        let depth = self.transaction.depth.get().saturating_sub(1);
        self.transaction.depth.set(depth);
        if depth > 0 {
            self.transaction.doomed.set(true);
            return;
        }
        self.transaction.doomed.set(false);
        self.rollback_quietly();
    }

    fn rollback_quietly(&self) {
        match self.database.rollback() {
            Ok(()) => tracing::warn!("Rolled back transaction"),
            Err(err) => tracing::warn!(error = %err, "Rollback failed"),
        }
    }
}

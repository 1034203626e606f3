//! Streaming find results.

use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

use persistent_core::{Database, ObjectDefinition, PersistentObject, Result, Statement};

use crate::translator::{materialize, state_from_row};
use crate::{Session, query_error};

/// A cursor over the rows of a find query, materializing one object per step.
///
/// While the iterator is alive it owns the session's read position: every other
/// query on the session fails with
/// [`Error::CursorOutstanding`](persistent_core::Error::CursorOutstanding). The
/// cursor is released when the rows are exhausted, when [`flush`](Self::flush) is
/// called, or when the iterator is dropped. It cannot be restarted.
pub struct FindIterator<'s, D: Database + 's, T> {
    session: &'s Session<D>,
    statement: Option<D::Statement<'s>>,
    definition: Arc<ObjectDefinition>,
    sql: String,
    _marker: PhantomData<fn() -> T>,
}

impl<'s, D: Database + 's, T: PersistentObject> FindIterator<'s, D, T> {
    pub(crate) fn new(
        session: &'s Session<D>,
        statement: D::Statement<'s>,
        definition: Arc<ObjectDefinition>,
        sql: String,
    ) -> Self {
        session.cursor_open.set(true);
        Self {
            session,
            statement: Some(statement),
            definition,
            sql,
            _marker: PhantomData,
        }
    }

    /// Release the cursor without reading the remaining rows.
    pub fn flush(&mut self) {
        if self.statement.take().is_some() {
            self.session.cursor_open.set(false);
            tracing::debug!(class = %self.definition.class, "Released find cursor");
        }
    }

    /// Whether the cursor is still open.
    pub fn is_open(&self) -> bool {
        self.statement.is_some()
    }
}

impl<'s, D: Database + 's, T: PersistentObject> Iterator for FindIterator<'s, D, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let statement = self.statement.as_mut()?;
        match statement.fetch() {
            Ok(Some(row)) => Some(state_from_row(&self.definition, row).and_then(|state| materialize(&state))),
            Ok(None) => {
                self.flush();
                None
            }
            Err(err) => {
                self.flush();
                Some(Err(query_error(err, &self.sql)))
            }
        }
    }
}

impl<'s, D: Database + 's, T: PersistentObject> FusedIterator for FindIterator<'s, D, T> {}

impl<'s, D: Database + 's, T> Drop for FindIterator<'s, D, T> {
    fn drop(&mut self) {
        if self.statement.take().is_some() {
            self.session.cursor_open.set(false);
        }
    }
}

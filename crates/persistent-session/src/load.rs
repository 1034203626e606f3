//! Loading objects: by id, through find queries and through relations.

use std::sync::Arc;

use persistent_core::{
    Database, Error, ObjectDefinition, PersistentObject, RelationKind, RelationLookup, Result,
    State, Statement, Value,
};
use persistent_query::{Expr, SelectQuery};

use crate::iterator::FindIterator;
use crate::translator::{column_value, id_of, materialize, property_for, relation_to, state_from_row};
use crate::{Session, query_error};

impl<D: Database> Session<D> {
    // ========================================================================
    // By Id
    // ========================================================================

    /// Load the object of type `T` with the given id.
    ///
    /// Fails with [`Error::ObjectNotFound`] if no row matches.
    #[tracing::instrument(level = "debug", skip(self, id))]
    pub fn load<T: PersistentObject>(&self, id: impl Into<Value>) -> Result<T> {
        let id = id.into();
        self.load_if_exists(id.clone())?
            .ok_or_else(|| Error::ObjectNotFound {
                class: T::CLASS.to_string(),
                id,
            })
    }

    /// Like [`load`](Self::load), but returns `None` when no row matches.
    #[tracing::instrument(level = "debug", skip(self, id))]
    pub fn load_if_exists<T: PersistentObject>(&self, id: impl Into<Value>) -> Result<Option<T>> {
        let definition = self.fetch_definition(T::CLASS)?;
        self.load_state(&definition, id.into())?
            .map(|state| materialize(&state))
            .transpose()
    }

    /// Overwrite the properties of `object` with the row identified by `id`.
    #[tracing::instrument(level = "debug", skip(self, object, id))]
    pub fn load_into_object<T: PersistentObject>(&self, object: &mut T, id: impl Into<Value>) -> Result<()> {
        let definition = self.fetch_definition(T::CLASS)?;
        let id = id.into();
        match self.load_state(&definition, id.clone())? {
            Some(state) => object.set_state(&state),
            None => Err(Error::ObjectNotFound {
                class: definition.class.clone(),
                id,
            }),
        }
    }

    /// Reload `object` from its current row.
    #[tracing::instrument(level = "debug", skip(self, object))]
    pub fn refresh<T: PersistentObject>(&self, object: &mut T) -> Result<()> {
        let definition = self.fetch_definition(T::CLASS)?;
        let id = id_of(&definition, &self.object_state(&definition, object)?);
        if id.is_null() {
            return Err(Error::ObjectNotPersistent {
                class: definition.class.clone(),
            });
        }
        self.load_into_object(object, id)
    }

    pub(crate) fn load_state(&self, definition: &ObjectDefinition, id: Value) -> Result<Option<State>> {
        let query = self
            .find_query_for(definition, self.config.prefix_table_names)
            .filter(Expr::col(&definition.id_property.property_name).eq(id))
            .limit(1);
        Ok(self.find_states(definition, &query)?.into_iter().next())
    }

    // ========================================================================
    // Find Queries
    // ========================================================================

    /// A SELECT over `class`'s table with every mapped column and the full alias
    /// map, ready for conditions written in property names.
    pub fn create_find_query(&self, class: &str) -> Result<SelectQuery> {
        let definition = self.fetch_definition(class)?;
        Ok(self.find_query_for(&definition, self.config.prefix_table_names))
    }

    pub(crate) fn find_query_for(&self, definition: &ObjectDefinition, prefix: bool) -> SelectQuery {
        SelectQuery::new()
            .columns(self.columns_from_definition(definition, prefix))
            .from(definition.table.clone())
            .set_aliases(self.generate_alias_map(definition, prefix))
    }

    /// Execute `query` and materialize every row as a `T`, in result order.
    #[tracing::instrument(level = "debug", skip(self, query))]
    pub fn find<T: PersistentObject>(&self, query: &SelectQuery) -> Result<Vec<T>> {
        let definition = self.fetch_definition(T::CLASS)?;
        self.find_states(&definition, query)?
            .iter()
            .map(materialize)
            .collect()
    }

    /// Execute `query` and return a cursor materializing one `T` per step.
    ///
    /// Until the iterator is drained, flushed or dropped, every other query on
    /// this session fails with [`Error::CursorOutstanding`].
    #[tracing::instrument(level = "debug", skip(self, query))]
    pub fn find_iterator<T: PersistentObject>(&self, query: &SelectQuery) -> Result<FindIterator<'_, D, T>> {
        let definition = self.fetch_definition(T::CLASS)?;
        let statement = self.perform_query(query)?;
        Ok(FindIterator::new(self, statement, definition, self.sql_of(query)))
    }

    pub(crate) fn find_states(&self, definition: &ObjectDefinition, query: &SelectQuery) -> Result<Vec<State>> {
        let mut statement = self.perform_query(query)?;
        let mut states = Vec::new();
        while let Some(row) = statement
            .fetch()
            .map_err(|e| query_error(e, &self.sql_of(query)))?
        {
            states.push(state_from_row(definition, row)?);
        }
        tracing::debug!(class = %definition.class, rows = states.len(), "Fetched rows");
        Ok(states)
    }

    // ========================================================================
    // Relations
    // ========================================================================

    /// All objects of type `R` related to `object`.
    ///
    /// Always a collection, even for many-to-one and one-to-one relations.
    #[tracing::instrument(level = "debug", skip(self, object))]
    pub fn get_related_objects<R: PersistentObject, T: PersistentObject>(&self, object: &T) -> Result<Vec<R>> {
        let definition = self.fetch_definition(T::CLASS)?;
        let state = self.object_state(&definition, object)?;
        let (_, states) = self.related_states(&definition, &state, R::CLASS)?;
        states.iter().map(materialize).collect()
    }

    /// The single object of type `R` related to `object`.
    ///
    /// Fails with [`Error::RelationNotFound`] when nothing matches, or when a
    /// many-to-one or one-to-one relation matches more than one row. For
    /// collection relations the first match is returned.
    #[tracing::instrument(level = "debug", skip(self, object))]
    pub fn get_related_object<R: PersistentObject, T: PersistentObject>(&self, object: &T) -> Result<R> {
        let definition = self.fetch_definition(T::CLASS)?;
        let kind = relation_to(&definition, R::CLASS)?.kind;
        let state = self.object_state(&definition, object)?;
        let (_, states) = self.related_states(&definition, &state, R::CLASS)?;

        let lookup_error = |detail| Error::relation_not_found(T::CLASS, R::CLASS, detail);
        if kind.is_singular() && states.len() > 1 {
            return Err(lookup_error(RelationLookup::Ambiguous(states.len())));
        }
        match states.first() {
            Some(state) => materialize(state),
            None => Err(lookup_error(RelationLookup::NoRelatedObject)),
        }
    }

    /// The query [`get_related_objects`](Self::get_related_objects) runs, for
    /// callers who want to add conditions before passing it to
    /// [`find`](Self::find).
    pub fn create_relation_find_query<T: PersistentObject>(&self, object: &T, related_class: &str) -> Result<SelectQuery> {
        let definition = self.fetch_definition(T::CLASS)?;
        let state = self.object_state(&definition, object)?;
        Ok(self.relation_query(&definition, &state, related_class)?.1)
    }

    pub(crate) fn related_states(
        &self,
        definition: &ObjectDefinition,
        state: &State,
        related_class: &str,
    ) -> Result<(Arc<ObjectDefinition>, Vec<State>)> {
        let (related, query) = self.relation_query(definition, state, related_class)?;
        let states = self.find_states(&related, &query)?;
        Ok((related, states))
    }

    /// Related-object query for a source state.
    ///
    /// Single-table relations filter the destination table by the source's key
    /// values; many-to-many relations join the join table and filter on its
    /// source column. Columns are always table-qualified here.
    pub(crate) fn relation_query(
        &self,
        definition: &ObjectDefinition,
        state: &State,
        related_class: &str,
    ) -> Result<(Arc<ObjectDefinition>, SelectQuery)> {
        let relation = relation_to(definition, related_class)?;
        let related = self.fetch_definition(related_class)?;
        let mut query = self.find_query_for(&related, true);

        match (relation.kind, &relation.join_table) {
            (RelationKind::ManyToMany, Some(join)) => {
                let columns = relation.columns.first().ok_or_else(|| {
                    Error::invalid_definition(&definition.class, "many-to-many relation links no columns")
                })?;
                let source_key = column_value(definition, state, &columns.source_column)?;
                let related_key = property_for(&related, &columns.destination_column)?;
                query = query
                    .inner_join(
                        join.table.clone(),
                        Expr::col(format!("{}.{}", join.table, join.destination_column))
                            .eq_col(related_key),
                    )
                    .filter(Expr::col(format!("{}.{}", join.table, join.source_column)).eq(source_key));
            }
            (RelationKind::ManyToMany, None) => {
                return Err(Error::invalid_definition(
                    &definition.class,
                    format!("many-to-many relation to '{related_class}' has no join table"),
                ));
            }
            _ => {
                for columns in &relation.columns {
                    let value = column_value(definition, state, &columns.source_column)?;
                    let related_property = property_for(&related, &columns.destination_column)?;
                    query = query.filter(Expr::col(related_property).eq(value));
                }
            }
        }
        Ok((related, query))
    }
}

#[cfg(test)]
mod tests {
    use persistent_core::{Error, RelationLookup, Value};
    use persistent_query::BuildQuery;

    use crate::Session;
    use crate::fake::{Address, FakeDatabase, Person, Tag, definitions};

    fn ann() -> Person {
        Person {
            id: Some(1),
            name: "Ann".into(),
            nickname: None,
        }
    }

    #[test]
    fn test_load_by_id() {
        let db = FakeDatabase::default();
        db.push_rows("FROM \"person\"", &["id", "name"], vec![vec![Value::BigInt(1), "Ann".into()]]);
        let session = Session::new(db, definitions());

        let person: Person = session.load(1_i64).unwrap();
        assert_eq!(person, ann());
        assert_eq!(
            session.database().log()[1],
            "SELECT \"person\".\"id\", \"person\".\"name\" FROM \"person\" WHERE (\"person\".\"id\" = ?1) LIMIT 1"
        );
    }

    #[test]
    fn test_load_missing_object() {
        let session = Session::new(FakeDatabase::default(), definitions());
        let err = session.load::<Person>(9_i64).unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound { ref class, id: Value::BigInt(9) } if class == "Person"));
        assert!(session.load_if_exists::<Person>(9_i64).unwrap().is_none());
    }

    #[test]
    fn test_refresh_requires_persistent_object() {
        let session = Session::new(FakeDatabase::default(), definitions());
        let mut person = Person::default();
        assert!(matches!(
            session.refresh(&mut person),
            Err(Error::ObjectNotPersistent { .. })
        ));
    }

    #[test]
    fn test_one_to_many_relation_query() {
        let session = Session::new(FakeDatabase::default(), definitions());
        let (sql, params) = session
            .create_relation_find_query(&ann(), "Address")
            .unwrap()
            .build_with_dialect(persistent_core::Dialect::Sqlite);
        assert_eq!(
            sql,
            "SELECT \"address\".\"id\", \"address\".\"person_id\", \"address\".\"city\" FROM \"address\" \
             WHERE (\"address\".\"person_id\" = ?1)"
        );
        assert_eq!(params, vec![Value::BigInt(1)]);
    }

    #[test]
    fn test_many_to_many_relation_query_joins_through_join_table() {
        let session = Session::new(FakeDatabase::default(), definitions());
        let (sql, params) = session
            .create_relation_find_query(&ann(), "Tag")
            .unwrap()
            .build_with_dialect(persistent_core::Dialect::Sqlite);
        assert_eq!(
            sql,
            "SELECT \"tag\".\"id\", \"tag\".\"label\" FROM \"tag\" \
             INNER JOIN \"person_tag\" ON (\"person_tag\".\"tag_id\" = \"tag\".\"id\") \
             WHERE (\"person_tag\".\"person_id\" = ?1)"
        );
        assert_eq!(params, vec![Value::BigInt(1)]);
    }

    #[test]
    fn test_undeclared_relation() {
        let session = Session::new(FakeDatabase::default(), definitions());
        let address = Address::default();
        let err = session.get_related_objects::<Tag, _>(&address).unwrap_err();
        assert!(matches!(
            err,
            Error::RelationNotFound { detail: RelationLookup::Undeclared, .. }
        ));
    }

    #[test]
    fn test_get_related_object_singular_ambiguity() {
        let db = FakeDatabase::default();
        db.push_rows(
            "FROM \"person\"",
            &["id", "name"],
            vec![vec![Value::BigInt(1), "Ann".into()], vec![Value::BigInt(1), "Ann".into()]],
        );
        let session = Session::new(db, definitions());
        let address = Address {
            id: Some(4),
            person_id: Some(1),
            city: "Oslo".into(),
        };
        let err = session.get_related_object::<Person, _>(&address).unwrap_err();
        assert!(matches!(
            err,
            Error::RelationNotFound { detail: RelationLookup::Ambiguous(2), .. }
        ));
    }

    #[test]
    fn test_get_related_object_none_found() {
        let session = Session::new(FakeDatabase::default(), definitions());
        let err = session.get_related_object::<Address, _>(&ann()).unwrap_err();
        assert!(matches!(
            err,
            Error::RelationNotFound { detail: RelationLookup::NoRelatedObject, .. }
        ));
    }
}

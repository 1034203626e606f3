//! Saving objects and attaching related objects.

use persistent_core::{
    Database, Error, IdGenerator, ObjectDefinition, PersistentObject, RelationKind, Result, State,
    Statement, Value,
};
use persistent_query::{Expr, InsertQuery, RawQuery, UpdateQuery};

use crate::translator::{cleared_id, column_value, id_of, property_for, relation_to};
use crate::{Session, query_error};

impl<D: Database> Session<D> {
    // ========================================================================
    // Insert / Update
    // ========================================================================

    /// Insert `object` as a new row and assign its generated id.
    ///
    /// Fails with [`Error::ObjectAlreadyPersistent`] if the object already has an
    /// id (or, for manually assigned ids, if its row exists). The id property of
    /// `T` must accept null, so it is normally an `Option`. The id is assigned
    /// inside the insert's transaction; if it does not fit `T` the row is rolled
    /// back.
    #[tracing::instrument(level = "debug", skip(self, object))]
    pub fn save<T: PersistentObject>(&self, object: &mut T) -> Result<()> {
        let definition = self.fetch_definition(T::CLASS)?;
        cleared_id::<T>(&definition)?;
        let state = self.object_state(&definition, object)?;
        let manual = definition.id_property.generator == IdGenerator::Manual;
        if !manual && !id_of(&definition, &state).is_null() {
            return Err(Error::ObjectAlreadyPersistent {
                class: definition.class.clone(),
            });
        }
        self.in_transaction(|| {
            if manual {
                self.ensure_manual_id_free(&definition, &state)?;
            }
            let id = self.insert_state(&definition, &state)?;
            object.set_state(&State::from([(
                definition.id_property.property_name.clone(),
                id,
            )]))
        })
    }

    /// Write every mapped property of `object` to its row.
    ///
    /// Fails with [`Error::ObjectNotPersistent`] if the object has no id.
    #[tracing::instrument(level = "debug", skip(self, object))]
    pub fn update<T: PersistentObject>(&self, object: &T) -> Result<()> {
        let definition = self.fetch_definition(T::CLASS)?;
        let state = self.object_state(&definition, object)?;
        let id = id_of(&definition, &state);
        if id.is_null() {
            return Err(Error::ObjectNotPersistent {
                class: definition.class.clone(),
            });
        }
        self.update_state(&definition, &state, id)
    }

    /// [`save`](Self::save) a transient object, [`update`](Self::update) a
    /// persistent one.
    #[tracing::instrument(level = "debug", skip(self, object))]
    pub fn save_or_update<T: PersistentObject>(&self, object: &mut T) -> Result<()> {
        let definition = self.fetch_definition(T::CLASS)?;
        let state = self.object_state(&definition, object)?;
        let id = id_of(&definition, &state);
        let persistent = match definition.id_property.generator {
            IdGenerator::Manual => !id.is_null() && self.load_state(&definition, id)?.is_some(),
            _ => !id.is_null(),
        };
        if persistent {
            self.update(object)
        } else {
            self.save(object)
        }
    }

    fn ensure_manual_id_free(&self, definition: &ObjectDefinition, state: &State) -> Result<()> {
        let id = id_of(definition, state);
        if id.is_null() {
            return Err(Error::IdentifierGeneration {
                class: definition.class.clone(),
                reason: "the id is assigned manually but was not set".to_string(),
            });
        }
        if self.load_state(definition, id)?.is_some() {
            return Err(Error::ObjectAlreadyPersistent {
                class: definition.class.clone(),
            });
        }
        Ok(())
    }

    /// INSERT the row for `state`; returns the id the row received.
    fn insert_state(&self, definition: &ObjectDefinition, state: &State) -> Result<Value> {
        let id_column = &definition.id_property.column_name;
        let mut query = InsertQuery::new(definition.table.clone());
        let preassigned = match &definition.id_property.generator {
            IdGenerator::Manual => Some(id_of(definition, state)),
            IdGenerator::Sequence { sequence } if self.database.dialect().supports_sequences() => {
                Some(self.next_sequence_value(definition, sequence)?)
            }
            IdGenerator::Sequence { .. } | IdGenerator::Native => None,
        };
        if let Some(id) = &preassigned {
            query = query.value(id_column.clone(), id.clone());
        }
        for property in &definition.properties {
            let value = state.get(&property.property_name).cloned().unwrap_or_default();
            query = query.value(property.column_name.clone(), value);
        }
        self.perform_query(&query)?;

        let id = match preassigned {
            Some(id) => id,
            None => {
                let sequence = match &definition.id_property.generator {
                    IdGenerator::Sequence { sequence } => Some(sequence.as_str()),
                    _ => None,
                };
                self.database
                    .last_insert_id(sequence)
                    .map_err(|e| Error::IdentifierGeneration {
                        class: definition.class.clone(),
                        reason: e.to_string(),
                    })?
            }
        };
        if id.is_null() {
            return Err(Error::IdentifierGeneration {
                class: definition.class.clone(),
                reason: "the database reported no id for the new row".to_string(),
            });
        }
        tracing::info!(class = %definition.class, table = %definition.table, id = %id, "Inserted object");
        Ok(id)
    }

    fn next_sequence_value(&self, definition: &ObjectDefinition, sequence: &str) -> Result<Value> {
        let placeholder = self.database.dialect().placeholder(1);
        let query = RawQuery::new(format!("SELECT nextval({placeholder})")).bind(sequence);
        let mut statement = self.perform_query(&query)?;
        let row = statement
            .fetch()
            .map_err(|e| query_error(e, &self.sql_of(&query)))?;
        row.and_then(|row| row.get(0).cloned())
            .ok_or_else(|| Error::IdentifierGeneration {
                class: definition.class.clone(),
                reason: format!("sequence '{sequence}' returned no value"),
            })
    }

    fn update_state(&self, definition: &ObjectDefinition, state: &State, id: Value) -> Result<()> {
        let mut query = UpdateQuery::new(definition.table.clone());
        for property in &definition.properties {
            let value = state.get(&property.property_name).cloned().unwrap_or_default();
            query = query.set(property.column_name.clone(), value);
        }
        if query.is_empty() {
            return Ok(());
        }
        let query = query.filter(Expr::col(definition.id_property.column_name.clone()).eq(id.clone()));
        let statement = self.perform_query(&query)?;
        tracing::info!(
            class = %definition.class,
            id = %id,
            rows = statement.rows_affected(),
            "Updated object"
        );
        Ok(())
    }

    // ========================================================================
    // Bulk Updates
    // ========================================================================

    /// An UPDATE on `class`'s table whose SET targets and conditions may use
    /// property names.
    pub fn create_update_query(&self, class: &str) -> Result<UpdateQuery> {
        let definition = self.fetch_definition(class)?;
        Ok(UpdateQuery::new(definition.table.clone()).set_aliases(self.generate_alias_map(&definition, false)))
    }

    /// Execute an update built with [`create_update_query`](Self::create_update_query);
    /// returns the number of rows changed.
    #[tracing::instrument(level = "debug", skip(self, query))]
    pub fn update_from_query(&self, query: &UpdateQuery) -> Result<u64> {
        if query.is_empty() {
            return Ok(0);
        }
        Ok(self.perform_query(query)?.rows_affected())
    }

    // ========================================================================
    // Relations
    // ========================================================================

    /// Relate `related` to `object`.
    ///
    /// For many-to-one relations the key properties of `object` are set from
    /// `related`; for one-to-one and one-to-many relations the key properties of
    /// `related` are set from `object`. Neither object is saved. For many-to-many
    /// relations a join row is inserted right away, so both objects must be
    /// persistent.
    #[tracing::instrument(level = "debug", skip(self, object, related))]
    pub fn add_related_object<T: PersistentObject, R: PersistentObject>(
        &self,
        object: &mut T,
        related: &mut R,
    ) -> Result<()> {
        let definition = self.fetch_definition(T::CLASS)?;
        let relation = relation_to(&definition, R::CLASS)?;
        if relation.reverse {
            return Err(Error::RelationOperationNotSupported {
                class: definition.class.clone(),
                related_class: R::CLASS.to_string(),
                operation: "add_related_object",
                reason: "the relation is the reverse side".to_string(),
            });
        }
        let related_definition = self.fetch_definition(R::CLASS)?;
        let state = self.object_state(&definition, object)?;
        let related_state = self.object_state(&related_definition, related)?;

        if relation.kind == RelationKind::ManyToMany {
            let join = relation.join_table.as_ref().ok_or_else(|| {
                Error::invalid_definition(&definition.class, "many-to-many relation has no join table")
            })?;
            let (source_key, related_key) =
                join_keys(&definition, &state, &related_definition, &related_state, relation)?;
            let query = InsertQuery::new(join.table.clone())
                .value(join.source_column.clone(), source_key)
                .value(join.destination_column.clone(), related_key);
            self.perform_query(&query)?;
            tracing::info!(class = %definition.class, related = R::CLASS, table = %join.table, "Inserted join row");
        } else if relation.kind.source_holds_key() {
            let keys = copy_keys(&related_definition, &related_state, &definition, relation, true)?;
            object.set_state(&keys)?;
        } else {
            let keys = copy_keys(&definition, &state, &related_definition, relation, false)?;
            related.set_state(&keys)?;
        }
        Ok(())
    }
}

/// Key values to copy across a single-table relation.
///
/// `from_destination` says which end of each column pair the values are read
/// from: the destination end when the source row holds the key, the source end
/// otherwise. The provider must hold non-null keys.
fn copy_keys(
    provider: &ObjectDefinition,
    provider_state: &State,
    receiver: &ObjectDefinition,
    relation: &persistent_core::RelationDefinition,
    from_destination: bool,
) -> Result<State> {
    let mut keys = State::new();
    for columns in &relation.columns {
        let (provider_column, receiver_column) = if from_destination {
            (&columns.destination_column, &columns.source_column)
        } else {
            (&columns.source_column, &columns.destination_column)
        };
        let value = column_value(provider, provider_state, provider_column)?;
        if value.is_null() {
            return Err(Error::ObjectNotPersistent {
                class: provider.class.clone(),
            });
        }
        keys.insert(property_for(receiver, receiver_column)?.to_string(), value);
    }
    Ok(keys)
}

/// Source and destination key values of a many-to-many join row; both objects
/// must be persistent.
pub(crate) fn join_keys(
    definition: &ObjectDefinition,
    state: &State,
    related_definition: &ObjectDefinition,
    related_state: &State,
    relation: &persistent_core::RelationDefinition,
) -> Result<(Value, Value)> {
    let columns = relation.columns.first().ok_or_else(|| {
        Error::invalid_definition(&definition.class, "many-to-many relation links no columns")
    })?;
    let source_key = column_value(definition, state, &columns.source_column)?;
    if source_key.is_null() {
        return Err(Error::ObjectNotPersistent {
            class: definition.class.clone(),
        });
    }
    let related_key = column_value(related_definition, related_state, &columns.destination_column)?;
    if related_key.is_null() {
        return Err(Error::ObjectNotPersistent {
            class: related_definition.class.clone(),
        });
    }
    Ok((source_key, related_key))
}

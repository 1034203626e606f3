//! Deleting objects, cascading through relations, and detaching related objects.

use std::collections::HashSet;

use persistent_core::{
    Database, Error, ObjectDefinition, PersistentObject, RelationKind, Result, State, Statement,
    Value,
};
use persistent_query::{DeleteQuery, Expr};

use crate::Session;
use crate::save::join_keys;
use crate::translator::{cleared_id, column_value, id_of, property_for, relation_to};

/// `(class, id)` pairs already reached by one cascading delete.
type Visited = HashSet<(String, String)>;

impl<D: Database> Session<D> {
    /// Delete `object`'s row, cascading to related objects first.
    ///
    /// Relations marked `cascade` are followed recursively: related one-to-many
    /// and one-to-one objects are deleted, many-to-many join rows are removed.
    /// Reverse relations cascade the same way. Everything runs in one
    /// transaction, which also resets the object's id so it can be saved again
    /// as a new row. The id property of `T` must accept null.
    #[tracing::instrument(level = "debug", skip(self, object))]
    pub fn delete<T: PersistentObject>(&self, object: &mut T) -> Result<()> {
        let definition = self.fetch_definition(T::CLASS)?;
        let cleared = cleared_id::<T>(&definition)?;
        let state = self.object_state(&definition, object)?;
        if id_of(&definition, &state).is_null() {
            return Err(Error::ObjectNotPersistent {
                class: definition.class.clone(),
            });
        }

        self.in_transaction(|| {
            self.delete_state(&definition, &state, &mut Visited::new())?;
            object.set_state(&cleared)
        })
    }

    fn delete_state(&self, definition: &ObjectDefinition, state: &State, visited: &mut Visited) -> Result<()> {
        let id = id_of(definition, state);
        if !visited.insert((definition.class.clone(), id.identity_key())) {
            if self.config.detect_cascade_cycles {
                return Err(Error::CascadeCycle {
                    class: definition.class.clone(),
                    id,
                });
            }
            tracing::debug!(class = %definition.class, id = %id, "Already deleted in this cascade");
            return Ok(());
        }

        for relation in definition.relations.values().filter(|r| r.cascade) {
            let related_class = &relation.destination_class;
            if relation.kind.source_holds_key() {
                return Err(Error::RelationOperationNotSupported {
                    class: definition.class.clone(),
                    related_class: related_class.clone(),
                    operation: "cascade",
                    reason: format!("cannot cascade through a {} relation", relation.kind),
                });
            }
            match (relation.kind, &relation.join_table) {
                (RelationKind::ManyToMany, Some(join)) => {
                    let columns = relation.columns.first().ok_or_else(|| {
                        Error::invalid_definition(&definition.class, "many-to-many relation links no columns")
                    })?;
                    let key = column_value(definition, state, &columns.source_column)?;
                    let query = DeleteQuery::new(join.table.clone())
                        .filter(Expr::col(join.source_column.clone()).eq(key));
                    let removed = self.perform_query(&query)?.rows_affected();
                    tracing::info!(class = %definition.class, table = %join.table, rows = removed, "Cascaded to join rows");
                }
                _ => {
                    let (related, states) = self.related_states(definition, state, related_class)?;
                    tracing::info!(
                        class = %definition.class,
                        related = %related_class,
                        count = states.len(),
                        "Cascading delete"
                    );
                    for related_state in &states {
                        self.delete_state(&related, related_state, visited)?;
                    }
                }
            }
        }

        let query = DeleteQuery::new(definition.table.clone())
            .filter(Expr::col(definition.id_property.column_name.clone()).eq(id.clone()));
        self.perform_query(&query)?;
        tracing::info!(class = %definition.class, table = %definition.table, id = %id, "Deleted object");
        Ok(())
    }

    // ========================================================================
    // Bulk Deletes
    // ========================================================================

    /// A DELETE on `class`'s table whose conditions may use property names.
    pub fn create_delete_query(&self, class: &str) -> Result<DeleteQuery> {
        let definition = self.fetch_definition(class)?;
        Ok(DeleteQuery::new(definition.table.clone()).set_aliases(self.generate_alias_map(&definition, false)))
    }

    /// Execute a delete built with [`create_delete_query`](Self::create_delete_query);
    /// returns the number of rows removed. No cascading takes place.
    #[tracing::instrument(level = "debug", skip(self, query))]
    pub fn delete_from_query(&self, query: &DeleteQuery) -> Result<u64> {
        Ok(self.perform_query(query)?.rows_affected())
    }

    // ========================================================================
    // Relations
    // ========================================================================

    /// Undo [`add_related_object`](Self::add_related_object).
    ///
    /// For many-to-many relations the join row is deleted. Otherwise the key
    /// properties on the side holding the key are set to null; no row is deleted
    /// and neither object is saved.
    #[tracing::instrument(level = "debug", skip(self, object, related))]
    pub fn remove_related_object<T: PersistentObject, R: PersistentObject>(
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
                operation: "remove_related_object",
                reason: "the relation is the reverse side".to_string(),
            });
        }
        let related_definition = self.fetch_definition(R::CLASS)?;

        if relation.kind == RelationKind::ManyToMany {
            let join = relation.join_table.as_ref().ok_or_else(|| {
                Error::invalid_definition(&definition.class, "many-to-many relation has no join table")
            })?;
            let state = self.object_state(&definition, object)?;
            let related_state = self.object_state(&related_definition, related)?;
            let (source_key, related_key) =
                join_keys(&definition, &state, &related_definition, &related_state, relation)?;
            let query = DeleteQuery::new(join.table.clone()).filter(
                Expr::col(join.source_column.clone())
                    .eq(source_key)
                    .and(Expr::col(join.destination_column.clone()).eq(related_key)),
            );
            let removed = self.perform_query(&query)?.rows_affected();
            tracing::info!(class = %definition.class, related = R::CLASS, rows = removed, "Deleted join row");
        } else if relation.kind.source_holds_key() {
            let cleared = cleared_keys(&definition, relation.columns.iter().map(|c| c.source_column.as_str()))?;
            object.set_state(&cleared)?;
        } else {
            let cleared = cleared_keys(
                &related_definition,
                relation.columns.iter().map(|c| c.destination_column.as_str()),
            )?;
            related.set_state(&cleared)?;
        }
        Ok(())
    }
}

/// A state setting the properties mapped to `columns` to null.
fn cleared_keys<'c>(definition: &ObjectDefinition, columns: impl Iterator<Item = &'c str>) -> Result<State> {
    columns
        .map(|column| Ok((property_for(definition, column)?.to_string(), Value::Null)))
        .collect()
}

#[cfg(test)]
mod tests {
    use persistent_core::object::property_from_value;
    use persistent_core::{
        Error, IdGenerator, IdProperty, ObjectDefinition, PersistentObject, PropertyType,
        RelationDefinition, Result, State, StaticManager, Value,
    };

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
    fn test_delete_requires_persistent_object() {
        let session = Session::new(FakeDatabase::default(), definitions());
        assert!(matches!(
            session.delete(&mut Person::default()),
            Err(Error::ObjectNotPersistent { .. })
        ));
    }

    #[test]
    fn test_delete_cascades_in_one_transaction() {
        let db = FakeDatabase::default();
        db.push_rows(
            "FROM \"address\"",
            &["id", "person_id", "city"],
            vec![
                vec![Value::BigInt(10), Value::BigInt(1), "Oslo".into()],
                vec![Value::BigInt(11), Value::BigInt(1), "Bergen".into()],
            ],
        );
        let session = Session::new(db, definitions());

        let mut person = ann();
        session.delete(&mut person).unwrap();
        assert_eq!(person.id, None);

        let log = session.database().log();
        assert_eq!(log.first().map(String::as_str), Some("BEGIN"));
        assert_eq!(log.last().map(String::as_str), Some("COMMIT"));
        assert_eq!(log.iter().filter(|s| *s == "BEGIN").count(), 1);
        let deletes: Vec<_> = log.iter().filter(|s| s.starts_with("DELETE")).collect();
        assert_eq!(
            deletes,
            vec![
                "DELETE FROM \"address\" WHERE (\"id\" = ?1)",
                "DELETE FROM \"address\" WHERE (\"id\" = ?1)",
                "DELETE FROM \"person\" WHERE (\"id\" = ?1)",
            ]
        );
    }

    #[test]
    fn test_failed_cascade_rolls_back_everything() {
        let db = FakeDatabase::default();
        db.push_rows(
            "FROM \"address\"",
            &["id", "person_id", "city"],
            vec![vec![Value::BigInt(10), Value::BigInt(1), "Oslo".into()]],
        );
        db.fail_with_code("DELETE FROM \"person\"", 19);
        let session = Session::new(db, definitions());

        let mut person = ann();
        assert!(session.delete(&mut person).unwrap_err().is_query_error());
        assert_eq!(person.id, Some(1));
        let log = session.database().log();
        assert_eq!(log.last().map(String::as_str), Some("ROLLBACK"));
        assert!(!log.contains(&"COMMIT".to_string()));
    }

    #[test]
    fn test_delete_cascades_through_reverse_relation() {
        let db = FakeDatabase::default();
        db.push_rows(
            "FROM \"address\"",
            &["id", "person_id", "city"],
            vec![vec![Value::BigInt(10), Value::BigInt(1), "Oslo".into()]],
        );
        let mut manager = definitions();
        manager
            .register(
                ObjectDefinition::new("Person", "person", IdProperty::new("id", "id"))
                    .property("name", "name", PropertyType::String)
                    .relation(
                        RelationDefinition::one_to_many("Person", "Address")
                            .column("id", "person_id")
                            .reverse(true)
                            .cascade(true),
                    ),
            )
            .unwrap();
        let session = Session::new(db, manager);

        let mut person = ann();
        session.delete(&mut person).unwrap();
        assert_eq!(person.id, None);
        let log = session.database().log();
        let deletes: Vec<_> = log.iter().filter(|s| s.starts_with("DELETE")).collect();
        assert_eq!(
            deletes,
            vec![
                "DELETE FROM \"address\" WHERE (\"id\" = ?1)",
                "DELETE FROM \"person\" WHERE (\"id\" = ?1)",
            ]
        );
        assert_eq!(log.last().map(String::as_str), Some("COMMIT"));
    }

    #[derive(Debug, Default)]
    struct Code {
        code: i64,
    }

    impl PersistentObject for Code {
        const CLASS: &'static str = "Code";

        fn state(&self) -> State {
            State::from([("code".to_string(), Value::from(self.code))])
        }

        fn set_state(&mut self, state: &State) -> Result<()> {
            if let Some(v) = state.get("code") {
                self.code = property_from_value(Self::CLASS, "code", v)?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_id_that_cannot_be_cleared_fails_before_deleting() {
        let codes = StaticManager::new()
            .with(ObjectDefinition::new(
                "Code",
                "code",
                IdProperty::new("code", "code").generator(IdGenerator::Manual),
            ))
            .unwrap();
        let session = Session::new(FakeDatabase::default(), codes);

        let mut code = Code { code: 7 };
        assert!(matches!(
            session.delete(&mut code),
            Err(Error::PropertyConversion { .. })
        ));
        assert_eq!(code.code, 7);
        assert!(session.database().log().is_empty());
    }

    #[test]
    fn test_remove_related_many_to_many_deletes_join_row() {
        let session = Session::new(FakeDatabase::default(), definitions());
        let mut tag = Tag {
            id: Some(9),
            label: "x".into(),
        };
        session.remove_related_object(&mut ann(), &mut tag).unwrap();
        assert_eq!(
            session.database().log()[1],
            "DELETE FROM \"person_tag\" WHERE ((\"person_id\" = ?1) AND (\"tag_id\" = ?2))"
        );
    }

    #[test]
    fn test_remove_related_clears_foreign_keys() {
        let session = Session::new(FakeDatabase::default(), definitions());
        let mut address = Address {
            id: Some(10),
            person_id: Some(1),
            city: "Oslo".into(),
        };
        session.remove_related_object(&mut ann(), &mut address).unwrap();
        assert_eq!(address.person_id, None);

        address.person_id = Some(1);
        session.remove_related_object(&mut address, &mut ann()).unwrap();
        assert_eq!(address.person_id, None);
        assert!(session.database().log().is_empty());
    }

    #[test]
    fn test_remove_related_reverse_side_fails() {
        let session = Session::new(FakeDatabase::default(), definitions());
        let mut tag = Tag {
            id: Some(9),
            label: "x".into(),
        };
        assert!(matches!(
            session.remove_related_object(&mut tag, &mut ann()),
            Err(Error::RelationOperationNotSupported { .. })
        ));
    }
}

//! Translation between definitions, queries and object states.
//!
//! Alias maps and column lists are derived from a definition alone and built
//! fresh for every query. Rows coming back are mapped to states through the same
//! definition; columns it does not map are ignored.

use persistent_core::{
    Database, Error, ObjectDefinition, PersistentObject, RelationDefinition, RelationLookup,
    Result, Row, State, Value,
};
use persistent_query::AliasMap;

use crate::Session;

impl<D: Database> Session<D> {
    /// Map every property (the id included) to its quoted column, qualified with
    /// the quoted table name when `prefix_table_name` is set. The class name maps
    /// to the quoted table.
    pub fn generate_alias_map(&self, definition: &ObjectDefinition, prefix_table_name: bool) -> AliasMap {
        let mut aliases = AliasMap::with_capacity(definition.properties.len() + 2);
        aliases.insert(
            definition.id_property.property_name.clone(),
            self.column_expr(definition, &definition.id_property.column_name, prefix_table_name),
        );
        for property in &definition.properties {
            aliases.insert(
                property.property_name.clone(),
                self.column_expr(definition, &property.column_name, prefix_table_name),
            );
        }
        aliases.insert(
            definition.class.clone(),
            self.database.quote_identifier(&definition.table),
        );
        aliases
    }

    /// Quoted columns of `definition`, id first, then properties in definition
    /// order.
    pub fn columns_from_definition(&self, definition: &ObjectDefinition, prefix_table_name: bool) -> Vec<String> {
        std::iter::once(&definition.id_property.column_name)
            .chain(definition.properties.iter().map(|p| &p.column_name))
            .map(|column| self.column_expr(definition, column, prefix_table_name))
            .collect()
    }

    fn column_expr(&self, definition: &ObjectDefinition, column: &str, prefix_table_name: bool) -> String {
        let column = self.database.quote_identifier(column);
        if prefix_table_name {
            format!("{}.{column}", self.database.quote_identifier(&definition.table))
        } else {
            column
        }
    }

    /// The state of `object`, checked against its definition when
    /// [`strict_state`](crate::SessionConfig::strict_state) is on.
    pub fn get_object_state<T: PersistentObject>(&self, object: &T) -> Result<State> {
        let definition = self.fetch_definition(T::CLASS)?;
        self.object_state(&definition, object)
    }

    pub(crate) fn object_state<T: PersistentObject>(&self, definition: &ObjectDefinition, object: &T) -> Result<State> {
        let state = object.state();
        if self.config.strict_state {
            if let Some(property) = state.keys().find(|p| !definition.is_mapped(p)) {
                return Err(Error::InvalidObjectState {
                    class: definition.class.clone(),
                    property: property.clone(),
                });
            }
        }
        Ok(state)
    }
}

/// The state that clears `T`'s id.
///
/// Fails with [`Error::PropertyConversion`] when the id property of `T` cannot
/// hold null. Transient and deleted objects carry no id.
pub(crate) fn cleared_id<T: PersistentObject>(definition: &ObjectDefinition) -> Result<State> {
    let cleared = State::from([(definition.id_property.property_name.clone(), Value::Null)]);
    T::default().set_state(&cleared)?;
    Ok(cleared)
}

/// Map a result row to a state, coercing values to the declared property types.
pub(crate) fn state_from_row(definition: &ObjectDefinition, row: Row) -> Result<State> {
    let mut state = State::with_capacity(row.len());
    for (column, value) in row.into_pairs() {
        let Some(property) = definition.property_for_column(&column) else {
            continue;
        };
        let property_type = definition.property_type(property).unwrap_or_default();
        let found = value.type_name();
        let value = property_type
            .coerce(value)
            .ok_or_else(|| Error::PropertyConversion {
                class: definition.class.clone(),
                property: property.to_string(),
                expected: property_type.name(),
                found,
            })?;
        state.insert(property.to_string(), value);
    }
    Ok(state)
}

/// Build an object of type `T` from a state.
pub(crate) fn materialize<T: PersistentObject>(state: &State) -> Result<T> {
    let mut object = T::default();
    object.set_state(state)?;
    Ok(object)
}

/// The id value held by `state`; `Null` when unset.
pub(crate) fn id_of(definition: &ObjectDefinition, state: &State) -> Value {
    state
        .get(&definition.id_property.property_name)
        .cloned()
        .unwrap_or_default()
}

/// Property mapped to `column`, or an error naming the relation's misconfiguration.
pub(crate) fn property_for<'d>(definition: &'d ObjectDefinition, column: &str) -> Result<&'d str> {
    definition.property_for_column(column).ok_or_else(|| {
        Error::invalid_definition(
            &definition.class,
            format!("relation column '{column}' is not mapped"),
        )
    })
}

/// Value held by `state` for the property mapped to `column`.
pub(crate) fn column_value(definition: &ObjectDefinition, state: &State, column: &str) -> Result<Value> {
    let property = property_for(definition, column)?;
    Ok(state.get(property).cloned().unwrap_or_default())
}

/// The relation `definition` declares to `related_class`.
pub(crate) fn relation_to<'d>(definition: &'d ObjectDefinition, related_class: &str) -> Result<&'d RelationDefinition> {
    definition.relation_to(related_class).ok_or_else(|| {
        Error::relation_not_found(&definition.class, related_class, RelationLookup::Undeclared)
    })
}

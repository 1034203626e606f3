//! Persistent object definitions.
//!
//! An [`ObjectDefinition`] describes one persistent class: the table it lives in,
//! its identity property, its ordinary properties and the relations it declares.
//! Definitions are produced by a [`DefinitionManager`](crate::DefinitionManager),
//! shared as `Arc<ObjectDefinition>` and never mutated by the runtime.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identifiers::is_valid_identifier;
use crate::relation::{RelationDefinition, RelationKind};
use crate::value::Value;

/// Declared type of a property; row values are coerced to it on load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// Integer.
    Int,
    /// Floating point.
    Float,
    /// Text.
    String,
    /// Boolean (stored as 0/1 by several databases).
    Bool,
    /// JSON document (stored as text by several databases).
    Json,
    /// Binary data.
    Bytes,
    /// Passed through untouched.
    #[default]
    Any,
}

impl PropertyType {
    /// Name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            PropertyType::Int => "an integer",
            PropertyType::Float => "a float",
            PropertyType::String => "a string",
            PropertyType::Bool => "a boolean",
            PropertyType::Json => "a JSON document",
            PropertyType::Bytes => "binary data",
            PropertyType::Any => "any value",
        }
    }

    /// Coerce a raw column value to this type. `None` if it cannot be represented.
    pub fn coerce(self, value: Value) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        match self {
            PropertyType::Any => Some(value),
            PropertyType::Int => match value {
                Value::Double(d) if d.fract() == 0.0 => Some(Value::BigInt(d as i64)),
                Value::Text(s) => s.trim().parse::<i64>().ok().map(Value::BigInt),
                other => other.as_i64().map(Value::BigInt),
            },
            PropertyType::Float => match value {
                Value::Text(s) => s.trim().parse::<f64>().ok().map(Value::Double),
                other => other.as_f64().map(Value::Double),
            },
            PropertyType::String => match value {
                Value::Text(_) => Some(value),
                Value::Int(_) | Value::BigInt(_) | Value::Double(_) | Value::Bool(_) => {
                    Some(Value::Text(value.to_string()))
                }
                Value::Bytes(b) => String::from_utf8(b).ok().map(Value::Text),
                Value::Json(j) => Some(Value::Text(j.to_string())),
                Value::Null => Some(Value::Null),
            },
            PropertyType::Bool => match value {
                Value::Text(s) => match s.as_str() {
                    "1" | "true" | "t" => Some(Value::Bool(true)),
                    "0" | "false" | "f" => Some(Value::Bool(false)),
                    _ => None,
                },
                other => other.as_bool().map(Value::Bool),
            },
            PropertyType::Json => match value {
                Value::Json(_) => Some(value),
                Value::Text(s) => serde_json::from_str(&s).ok().map(Value::Json),
                _ => None,
            },
            PropertyType::Bytes => match value {
                Value::Bytes(_) => Some(value),
                Value::Text(s) => Some(Value::Bytes(s.into_bytes())),
                _ => None,
            },
        }
    }
}

/// How identifiers are generated for new objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum IdGenerator {
    /// The database assigns the id (auto-increment); it is read back after INSERT.
    #[default]
    Native,
    /// Ids come from a named sequence where the dialect has sequences, otherwise
    /// the database assigns them like [`IdGenerator::Native`].
    Sequence { sequence: String },
    /// The application assigns ids itself.
    Manual,
}

/// The identity property of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdProperty {
    /// Property name on the object.
    pub property_name: String,
    /// Column name in the table.
    pub column_name: String,
    /// Declared type.
    #[serde(default = "default_id_type")]
    pub property_type: PropertyType,
    /// Generation strategy.
    #[serde(default)]
    pub generator: IdGenerator,
}

fn default_id_type() -> PropertyType {
    PropertyType::Int
}

impl IdProperty {
    /// An integer id generated by the database.
    pub fn new(property_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            column_name: column_name.into(),
            property_type: PropertyType::Int,
            generator: IdGenerator::Native,
        }
    }

    /// Set the generation strategy.
    #[must_use]
    pub fn generator(mut self, generator: IdGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Set the declared type.
    #[must_use]
    pub fn property_type(mut self, property_type: PropertyType) -> Self {
        self.property_type = property_type;
        self
    }
}

/// An ordinary mapped property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Property name on the object.
    pub property_name: String,
    /// Column name in the table.
    pub column_name: String,
    /// Declared type.
    #[serde(default)]
    pub property_type: PropertyType,
}

impl PropertyDefinition {
    /// Create a property mapping.
    pub fn new(
        property_name: impl Into<String>,
        column_name: impl Into<String>,
        property_type: PropertyType,
    ) -> Self {
        Self {
            property_name: property_name.into(),
            column_name: column_name.into(),
            property_type,
        }
    }
}

/// Metadata describing how one persistent class maps onto a table.
///
/// # Example
///
/// ```
/// use persistent_core::{IdProperty, ObjectDefinition, PropertyType, RelationDefinition};
///
/// let person = ObjectDefinition::new("Person", "person", IdProperty::new("id", "id"))
///     .property("name", "name", PropertyType::String)
///     .relation(RelationDefinition::one_to_many("Person", "Address").column("id", "person_id"));
///
/// assert_eq!(person.column_for_property("name"), Some("name"));
/// assert!(person.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDefinition {
    /// Class identifier.
    pub class: String,
    /// Table name.
    pub table: String,
    /// Identity property.
    pub id_property: IdProperty,
    /// Ordinary properties, in column order.
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
    /// Relations keyed by destination class name.
    #[serde(default)]
    pub relations: BTreeMap<String, RelationDefinition>,
}

impl ObjectDefinition {
    /// Create a definition with no properties and no relations.
    pub fn new(class: impl Into<String>, table: impl Into<String>, id_property: IdProperty) -> Self {
        Self {
            class: class.into(),
            table: table.into(),
            id_property,
            properties: Vec::new(),
            relations: BTreeMap::new(),
        }
    }

    /// Add a property mapping.
    #[must_use]
    pub fn property(mut self, property_name: &str, column_name: &str, property_type: PropertyType) -> Self {
        self.properties
            .push(PropertyDefinition::new(property_name, column_name, property_type));
        self
    }

    /// Declare a relation, keyed by its destination class.
    #[must_use]
    pub fn relation(mut self, relation: RelationDefinition) -> Self {
        self.relations
            .insert(relation.destination_class.clone(), relation);
        self
    }

    /// Relation to `class`, if declared.
    pub fn relation_to(&self, class: &str) -> Option<&RelationDefinition> {
        self.relations.get(class)
    }

    /// Mapping of an ordinary property.
    pub fn property_definition(&self, property_name: &str) -> Option<&PropertyDefinition> {
        self.properties
            .iter()
            .find(|p| p.property_name == property_name)
    }

    /// Column for a property name (the id included).
    pub fn column_for_property(&self, property_name: &str) -> Option<&str> {
        if self.id_property.property_name == property_name {
            return Some(&self.id_property.column_name);
        }
        self.property_definition(property_name)
            .map(|p| p.column_name.as_str())
    }

    /// Property name for a column (the id included).
    pub fn property_for_column(&self, column_name: &str) -> Option<&str> {
        if self.id_property.column_name == column_name {
            return Some(&self.id_property.property_name);
        }
        self.properties
            .iter()
            .find(|p| p.column_name == column_name)
            .map(|p| p.property_name.as_str())
    }

    /// Declared type of a property (the id included).
    pub fn property_type(&self, property_name: &str) -> Option<PropertyType> {
        if self.id_property.property_name == property_name {
            return Some(self.id_property.property_type);
        }
        self.property_definition(property_name)
            .map(|p| p.property_type)
    }

    /// Whether `property_name` is the id or a mapped property.
    pub fn is_mapped(&self, property_name: &str) -> bool {
        self.column_for_property(property_name).is_some()
    }

    /// Check the definition's invariants.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(Error::invalid_definition(&self.class, reason));

        for (what, name) in [
            ("class", &self.class),
            ("table", &self.table),
            ("id property", &self.id_property.property_name),
            ("id column", &self.id_property.column_name),
        ] {
            if !is_valid_identifier(name) {
                return invalid(format!("{what} name '{name}' is not a valid identifier"));
            }
        }
        if let IdGenerator::Sequence { sequence } = &self.id_property.generator {
            if !is_valid_identifier(sequence) {
                return invalid(format!("sequence name '{sequence}' is not a valid identifier"));
            }
        }

        let mut names = HashSet::from([self.id_property.property_name.as_str()]);
        let mut columns = HashSet::from([self.id_property.column_name.as_str()]);
        for property in &self.properties {
            if !is_valid_identifier(&property.property_name) || !is_valid_identifier(&property.column_name) {
                return invalid(format!(
                    "property '{}' -> column '{}' is not a valid mapping",
                    property.property_name, property.column_name
                ));
            }
            if !names.insert(&property.property_name) {
                return invalid(format!("property '{}' is mapped twice", property.property_name));
            }
            if !columns.insert(&property.column_name) {
                return invalid(format!("column '{}' is mapped twice", property.column_name));
            }
        }

        for (destination, relation) in &self.relations {
            if destination != &relation.destination_class {
                return invalid(format!(
                    "relation keyed '{destination}' points to '{}'",
                    relation.destination_class
                ));
            }
            if relation.source_class != self.class {
                return invalid(format!(
                    "relation to '{destination}' is declared for source '{}'",
                    relation.source_class
                ));
            }
            if relation.columns.is_empty() {
                return invalid(format!("relation to '{destination}' links no columns"));
            }
            if let Some(column) = relation
                .columns
                .iter()
                .find(|c| self.property_for_column(&c.source_column).is_none())
            {
                return invalid(format!(
                    "relation to '{destination}' uses unmapped column '{}'",
                    column.source_column
                ));
            }
            match relation.kind {
                RelationKind::ManyToMany => {
                    if relation.join_table.is_none() {
                        return invalid(format!("many-to-many relation to '{destination}' has no join table"));
                    }
                    if relation.columns.len() != 1 {
                        return invalid(format!(
                            "many-to-many relation to '{destination}' must link exactly one column pair"
                        ));
                    }
                }
                kind => {
                    if relation.join_table.is_some() {
                        return invalid(format!("{kind} relation to '{destination}' cannot have a join table"));
                    }
                    if kind == RelationKind::ManyToOne && relation.cascade {
                        return invalid(format!("many-to-one relation to '{destination}' cannot cascade"));
                    }
                }
            }
        }

        Ok(())
    }
}

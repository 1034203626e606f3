//! Relation metadata.
//!
//! A relation is declared on its source class and keyed there by the destination
//! class name. It carries the column pairs that link the two tables and, for
//! many-to-many relations, the join table between them. Two flags control what the
//! runtime may do through it:
//!
//! - `cascade`: deleting a source object deletes (one-to-many, one-to-one) or
//!   detaches (many-to-many) its related objects.
//! - `reverse`: the relation is the non-owning side; attaching, detaching and
//!   cascading through it is refused.

use serde::{Deserialize, Serialize};

/// The kind of relation between two classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Many sources point at one destination; the source row holds the key.
    ManyToOne,
    /// One source owns one destination; the destination row holds the key.
    OneToOne,
    /// One source owns many destinations; the destination rows hold the key.
    OneToMany,
    /// Sources and destinations are linked through rows of a join table.
    ManyToMany,
}

impl RelationKind {
    /// Whether the key columns live on the source row.
    pub const fn source_holds_key(self) -> bool {
        matches!(self, RelationKind::ManyToOne)
    }

    /// Whether at most one related object exists per source object.
    pub const fn is_singular(self) -> bool {
        matches!(self, RelationKind::ManyToOne | RelationKind::OneToOne)
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RelationKind::ManyToOne => "many-to-one",
            RelationKind::OneToOne => "one-to-one",
            RelationKind::OneToMany => "one-to-many",
            RelationKind::ManyToMany => "many-to-many",
        })
    }
}

/// A column on the source table paired with a column on the destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    /// Column of the source class's table.
    pub source_column: String,
    /// Column of the destination class's table.
    pub destination_column: String,
}

impl ColumnMap {
    /// Create a column pair.
    pub fn new(source_column: impl Into<String>, destination_column: impl Into<String>) -> Self {
        Self {
            source_column: source_column.into(),
            destination_column: destination_column.into(),
        }
    }
}

/// Join table of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTable {
    /// Join table name (e.g. `"person_tag"`).
    pub table: String,
    /// Join column referencing the source row (e.g. `"person_id"`).
    pub source_column: String,
    /// Join column referencing the destination row (e.g. `"tag_id"`).
    pub destination_column: String,
}

impl JoinTable {
    /// Create a join table descriptor.
    pub fn new(
        table: impl Into<String>,
        source_column: impl Into<String>,
        destination_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            source_column: source_column.into(),
            destination_column: destination_column.into(),
        }
    }
}

/// Metadata about a relation from one persistent class to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDefinition {
    /// Class declaring the relation.
    pub source_class: String,
    /// Class the relation points to.
    pub destination_class: String,
    /// Cardinality.
    pub kind: RelationKind,
    /// Linked column pairs. Many-to-many relations carry exactly one pair: the
    /// source key column and the destination key column the join table references.
    #[serde(default)]
    pub columns: Vec<ColumnMap>,
    /// Join table, present only for many-to-many relations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_table: Option<JoinTable>,
    /// Propagate deletes of the source to the related objects.
    #[serde(default)]
    pub cascade: bool,
    /// Non-owning side; may not attach, detach or cascade.
    #[serde(default)]
    pub reverse: bool,
}

impl RelationDefinition {
    /// Create a relation with no columns and both flags off.
    pub fn new(
        source_class: impl Into<String>,
        destination_class: impl Into<String>,
        kind: RelationKind,
    ) -> Self {
        Self {
            source_class: source_class.into(),
            destination_class: destination_class.into(),
            kind,
            columns: Vec::new(),
            join_table: None,
            cascade: false,
            reverse: false,
        }
    }

    /// A many-to-one relation.
    pub fn many_to_one(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::new(source, destination, RelationKind::ManyToOne)
    }

    /// A one-to-one relation.
    pub fn one_to_one(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::new(source, destination, RelationKind::OneToOne)
    }

    /// A one-to-many relation.
    pub fn one_to_many(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::new(source, destination, RelationKind::OneToMany)
    }

    /// A many-to-many relation through `join_table`.
    pub fn many_to_many(
        source: impl Into<String>,
        destination: impl Into<String>,
        join_table: JoinTable,
    ) -> Self {
        let mut relation = Self::new(source, destination, RelationKind::ManyToMany);
        relation.join_table = Some(join_table);
        relation
    }

    /// Add a linked column pair.
    #[must_use]
    pub fn column(mut self, source_column: &str, destination_column: &str) -> Self {
        self.columns.push(ColumnMap::new(source_column, destination_column));
        self
    }

    /// Enable/disable cascading deletes.
    #[must_use]
    pub fn cascade(mut self, value: bool) -> Self {
        self.cascade = value;
        self
    }

    /// Mark this side as the non-owning one.
    #[must_use]
    pub fn reverse(mut self, value: bool) -> Self {
        self.reverse = value;
        self
    }
}

//! Core types and traits for Persistent Rust.
//!
//! `persistent-core` is the **foundation layer** of the workspace. It defines the
//! metadata model, the object contract and the driver contract that every other
//! crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Metadata model**: `ObjectDefinition` and `RelationDefinition` describe how a
//!   persistent class maps onto a table and how it relates to other classes.
//! - **Definition sources**: `DefinitionManager` and its implementations hand out
//!   immutable definitions by class name.
//! - **Contract layer**: `PersistentObject` is implemented by application types (usually
//!   via `#[derive(PersistentObject)]`), `Database`/`Statement` by drivers.
//! - **Data model**: `Value`, `Row` and `State` move data between rows and objects.
//!
//! # Who Uses This Crate
//!
//! - `persistent-query` builds SQL from `Value`s and quotes through `Dialect`.
//! - `persistent-session` drives handlers over `Database` using definitions.
//! - `persistent-sqlite` implements `Database`/`Statement`.
//! - `persistent-macros` generates `PersistentObject` implementations.

pub mod database;
pub mod definition;
pub mod error;
pub mod identifiers;
pub mod manager;
pub mod object;
pub mod relation;
pub mod row;
pub mod value;

pub use database::{Database, Dialect, DriverError, Statement};
pub use definition::{IdGenerator, IdProperty, ObjectDefinition, PropertyDefinition, PropertyType};
pub use error::{Error, RelationLookup, Result};
pub use identifiers::{is_valid_identifier, quote_ident, quote_ident_mysql, sanitize_identifier};
pub use manager::{CacheManager, DefinitionManager, JsonDirectoryManager, MultiManager, StaticManager};
pub use object::{FromValue, PersistentObject, State, ValueTypeError};
pub use relation::{ColumnMap, JoinTable, RelationDefinition, RelationKind};
pub use row::Row;
pub use value::Value;

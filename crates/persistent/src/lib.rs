//! Persistent Rust: store plain structs as table rows, driven by class definitions.
//!
//! Persistent Rust maps application types ("persistent classes") onto tables using
//! definitions held outside the code, and gives them a small CRUD surface:
//!
//! - Definitions (`ObjectDefinition`, `RelationDefinition`) built in code or read
//!   from JSON files
//! - A derive macro implementing the object contract
//! - A `Session` with load, find, save, update and delete operations
//! - Relations (many-to-one, one-to-one, one-to-many, many-to-many) with cascading
//!   deletes
//! - Alias-aware query builders where conditions use property names
//!
//! # Quick Start
//!
//! ```ignore
//! use persistent::prelude::*;
//!
//! #[derive(Debug, Default, PersistentObject)]
//! struct Person {
//!     id: Option<i64>,
//!     name: String,
//! }
//!
//! let definitions = StaticManager::new().with(
//!     ObjectDefinition::new("Person", "person", IdProperty::new("id", "id"))
//!         .property("name", "name", PropertyType::String),
//! )?;
//! let session = Session::new(SqliteDatabase::open_memory()?, definitions);
//!
//! let mut ann = Person { name: "Ann".into(), ..Default::default() };
//! session.save(&mut ann)?;
//!
//! let query = session.create_find_query("Person")?.filter(col("name").like("A%"));
//! let people: Vec<Person> = session.find(&query)?;
//! ```
//!
//! The derive macro expands to paths under `persistent_core`, so crates deriving
//! `PersistentObject` depend on `persistent-core` as well.
//!
//! # Features
//!
//! - `sqlite`: re-export the SQLite driver as [`SqliteDatabase`].

pub use persistent_core::{
    ColumnMap, Database, DefinitionManager, Dialect, DriverError, Error, FromValue, IdGenerator,
    IdProperty, JoinTable, ObjectDefinition, PropertyDefinition, PropertyType, RelationDefinition,
    RelationKind, RelationLookup, Result, Row, State, Statement, Value, ValueTypeError,
};
pub use persistent_core::{
    CacheManager, JsonDirectoryManager, MultiManager, PersistentObject, StaticManager,
};

pub use persistent_macros::PersistentObject;

pub use persistent_query::{
    AliasMap, BinaryOp, BuildQuery, DeleteQuery, Expr, InsertQuery, Order, RawQuery, SelectQuery,
    UpdateQuery, col,
};

pub use persistent_session::{FindIterator, Session, SessionConfig};

#[cfg(feature = "sqlite")]
pub use persistent_sqlite::SqliteDatabase;

/// Everything needed to define classes and work with a session.
pub mod prelude {
    pub use crate::{
        BuildQuery, DefinitionManager, Error, Expr, IdGenerator, IdProperty, JoinTable,
        ObjectDefinition, Order, PersistentObject, PropertyType, RelationDefinition, Result,
        Session, SessionConfig, StaticManager, Value, col,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::SqliteDatabase;
}

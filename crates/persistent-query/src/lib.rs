//! Alias-aware SQL query builders for Persistent Rust.
//!
//! `persistent-query` turns incrementally assembled queries into SQL plus bound
//! parameters for a [`Dialect`]. It knows nothing about persistent classes: the
//! session hands it table names, pre-quoted column fragments and an [`AliasMap`]
//! translating property names into columns.
//!
//! # Role In The Architecture
//!
//! - **Find queries**: [`SelectQuery`] is what `Session::create_find_query` returns
//!   and what `Session::find` executes.
//! - **Mutations**: [`InsertQuery`], [`UpdateQuery`] and [`DeleteQuery`] are built by
//!   the save and delete handlers, or by callers for bulk operations.
//! - **Escape hatch**: [`RawQuery`] carries hand-written SQL through the same
//!   transactional choke point.

pub mod builder;
pub mod expr;

pub use builder::{
    AliasMap, BuildQuery, DeleteQuery, InsertQuery, Order, RawQuery, SelectQuery, UpdateQuery,
};
pub use expr::{BinaryOp, Expr, resolve_column};
pub use persistent_core::Dialect;

/// Shorthand for [`Expr::col`].
pub fn col(name: impl Into<String>) -> Expr {
    Expr::col(name)
}

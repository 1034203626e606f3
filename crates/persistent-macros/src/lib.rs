//! Procedural macros for Persistent Rust.
//!
//! - `#[derive(PersistentObject)]` implements `persistent_core::PersistentObject`
//!   by moving each named field in and out of the object state.
//!
//! ```ignore
//! #[derive(Debug, Default, PersistentObject)]
//! #[persistent(class = "Person")]
//! struct Person {
//!     id: Option<i64>,
//!     #[persistent(rename = "fullName")]
//!     full_name: String,
//!     #[persistent(skip)]
//!     cached_display: String,
//! }
//! ```
//!
//! Field types must convert into `Value` and back through `FromValue`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod object_derive;

/// Derive the `PersistentObject` trait.
///
/// # Attributes
///
/// - `#[persistent(class = "...")]` on the struct: class name used to find the
///   definition (defaults to the struct name).
/// - `#[persistent(rename = "...")]` on a field: property name (defaults to the
///   field name).
/// - `#[persistent(skip)]` on a field: leave it out of the state. The field keeps
///   its `Default` value on loaded objects.
#[proc_macro_derive(PersistentObject, attributes(persistent))]
pub fn derive_persistent_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match object_derive::parse_object(&input) {
        Ok(def) => object_derive::generate_object_impl(&def).into(),
        Err(err) => err.to_compile_error().into(),
    }
}

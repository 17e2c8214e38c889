//! Procedural macros for tinyorm.
//!
//! - `#[derive(Entity)]` generates the `Entity` implementation: table name,
//!   identifier field and one get/set accessor pair per persistent field.
//!
//! # Attributes
//!
//! ```ignore
//! #[derive(Debug, Default, Entity)]
//! #[tinyorm(table = "persons")]
//! struct Person {
//!     id: Option<i64>,                      // identifier by name
//!     #[tinyorm(column = "first_name")]
//!     first_name: Option<String>,
//!     email: Option<String>,                // column "email"
//!     #[tinyorm(skip)]
//!     display_cache: String,                // not persisted
//! }
//! ```
//!
//! `#[tinyorm(id)]` marks a differently named identifier field. Table and
//! column overrides must be plain SQL identifiers and are checked at compile
//! time. Generated code refers to the `tinyorm` facade crate.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod entity_derive;

/// Derive the `Entity` trait for a struct with named fields.
#[proc_macro_derive(Entity, attributes(tinyorm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match entity_derive::parse_entity(&input) {
        Ok(def) => entity_derive::generate_entity_impl(&def).into(),
        Err(e) => e.to_compile_error().into(),
    }
}

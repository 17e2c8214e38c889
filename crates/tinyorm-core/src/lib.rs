//! Core types and traits for tinyorm.
//!
//! `tinyorm-core` is the foundation layer of the workspace. It defines the
//! contracts every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: `Entity` is implemented by user record types (usually via
//!   `#[derive(Entity)]`), `Connection`/`ConnectionProvider` by storage drivers.
//! - **Data model**: `Value` and `Row` carry statement parameters and fetched rows.
//! - **Metadata**: `EntityMetadata` is the resolved table/column layout of an entity
//!   type, cached per type in a `MetadataRegistry`.
//! - **Mapping**: `map_row` turns a fetched `Row` into a fresh entity.
//!
//! # Who Uses This Crate
//!
//! - `tinyorm-macros` generates `Entity` implementations defined here.
//! - `tinyorm-query` renders statements from `EntityMetadata`.
//! - `tinyorm-session` drives `Connection`s and `map_row` for its identity map.
//!
//! Most applications should use the `tinyorm` facade.

pub mod connection;
pub mod entity;
pub mod error;
pub mod identifiers;
pub mod mapper;
pub mod metadata;
pub mod row;
pub mod value;

pub use connection::{Connection, ConnectionProvider};
pub use entity::{Entity, EntityDescriptor, FieldDescriptor, Getter, Setter};
pub use error::{
    BoxError, ConnectionError, ConnectionErrorKind, Error, MappingError, MetadataError,
    QueryError, QueryErrorKind, Result,
};
pub use identifiers::is_valid_identifier;
pub use mapper::map_row;
pub use metadata::{ColumnMeta, EntityMetadata, MetadataRegistry, column_name, table_name};
pub use row::Row;
pub use value::{FromValue, TypeMismatch, Value};

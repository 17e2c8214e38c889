//! Declarative entity descriptors.
//!
//! An [`EntityDescriptor`] is the static description of one entity type: its
//! simple name, an optional table override, the identifier field and every
//! persistent field with an optional column override and a get/set accessor
//! pair. `#[derive(Entity)]` writes it; hand-written impls are fine too.
//!
//! ```
//! use tinyorm_core::entity::{Entity, EntityDescriptor, FieldDescriptor};
//! use tinyorm_core::value::{FromValue, Value};
//!
//! #[derive(Debug, Default)]
//! struct Team {
//!     id: Option<i64>,
//!     name: String,
//! }
//!
//! impl Entity for Team {
//!     fn descriptor() -> EntityDescriptor<Self> {
//!         EntityDescriptor::new(
//!             "Team",
//!             FieldDescriptor::new(
//!                 "id",
//!                 |t: &Team| Value::from(t.id),
//!                 |t: &mut Team, v: Value| {
//!                     t.id = FromValue::from_value(v)?;
//!                     Ok(())
//!                 },
//!             ),
//!         )
//!         .table("teams")
//!         .field(FieldDescriptor::new(
//!             "name",
//!             |t: &Team| Value::from(t.name.clone()),
//!             |t: &mut Team, v: Value| {
//!                 t.name = FromValue::from_value(v)?;
//!                 Ok(())
//!             },
//!         ))
//!     }
//! }
//!
//! let descriptor = Team::descriptor();
//! assert_eq!(descriptor.table, Some("teams"));
//! assert_eq!(descriptor.fields.len(), 1);
//! ```

use crate::value::{TypeMismatch, Value};

/// Reads a field as a [`Value`].
pub type Getter<E> = fn(&E) -> Value;

/// Assigns a [`Value`] into a field.
pub type Setter<E> = fn(&mut E, Value) -> Result<(), TypeMismatch>;

/// One persistent field of an entity.
pub struct FieldDescriptor<E> {
    /// Field name as declared on the type.
    pub name: &'static str,
    /// Explicit column name, if declared.
    pub column: Option<&'static str>,
    /// Accessor reading the current value.
    pub get: Getter<E>,
    /// Accessor assigning a fetched value.
    pub set: Setter<E>,
}

impl<E> FieldDescriptor<E> {
    /// Describe a field with no column override.
    pub const fn new(name: &'static str, get: Getter<E>, set: Setter<E>) -> Self {
        Self {
            name,
            column: None,
            get,
            set,
        }
    }

    /// Declare an explicit column name.
    pub const fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }
}

impl<E> Clone for FieldDescriptor<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for FieldDescriptor<E> {}

impl<E> std::fmt::Debug for FieldDescriptor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

/// Static description of an entity type.
pub struct EntityDescriptor<E> {
    /// Simple type name, the default table name.
    pub type_name: &'static str,
    /// Explicit table name, if declared.
    pub table: Option<&'static str>,
    /// The single identifier field.
    pub id: FieldDescriptor<E>,
    /// Persistent non-identifier fields, in declaration order.
    pub fields: Vec<FieldDescriptor<E>>,
}

impl<E> EntityDescriptor<E> {
    /// Start a descriptor with its identifier field.
    pub fn new(type_name: &'static str, id: FieldDescriptor<E>) -> Self {
        Self {
            type_name,
            table: None,
            id,
            fields: Vec::new(),
        }
    }

    /// Declare an explicit table name.
    pub fn table(mut self, table: &'static str) -> Self {
        self.table = Some(table);
        self
    }

    /// Add a persistent field.
    pub fn field(mut self, field: FieldDescriptor<E>) -> Self {
        self.fields.push(field);
        self
    }
}

impl<E> Clone for EntityDescriptor<E> {
    fn clone(&self) -> Self {
        Self {
            type_name: self.type_name,
            table: self.table,
            id: self.id,
            fields: self.fields.clone(),
        }
    }
}

impl<E> std::fmt::Debug for EntityDescriptor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("type_name", &self.type_name)
            .field("table", &self.table)
            .field("id", &self.id)
            .field("fields", &self.fields)
            .finish()
    }
}

/// A persistable record type with a single-column primary key.
///
/// `Default` supplies the blank instance the row mapper fills in.
pub trait Entity: Default + 'static {
    /// Describe this type's table, identifier and fields.
    fn descriptor() -> EntityDescriptor<Self>;
}

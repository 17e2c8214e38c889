//! Metadata resolution.
//!
//! [`table_name`] and [`column_name`] are the raw resolution rules: an explicit
//! override wins, otherwise the table is the type's simple name and the column
//! is absent (callers fall back to the field name).
//!
//! [`EntityMetadata`] is the resolved, validated layout of one entity type.
//! Its column list is sorted by field name and is the only ordering used for
//! snapshots, dirty checks, UPDATE SET clauses and parameter binding, so a
//! column's position always lines up with the value bound at that index.
//!
//! [`MetadataRegistry`] caches resolved metadata per type so resolution runs
//! once per type rather than once per statement.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use crate::entity::{Entity, EntityDescriptor, FieldDescriptor, Getter, Setter};
use crate::error::{MetadataError, Result};
use crate::identifiers::is_valid_identifier;
use crate::value::Value;

/// Table name for an entity type: the declared override, else the simple type name.
pub fn table_name<E>(descriptor: &EntityDescriptor<E>) -> &'static str {
    descriptor.table.unwrap_or(descriptor.type_name)
}

/// Declared column override for a field, if any.
pub fn column_name<E>(field: &FieldDescriptor<E>) -> Option<&'static str> {
    field.column
}

/// A field bound to its resolved column.
pub struct ColumnMeta<E> {
    /// Field name.
    pub field: &'static str,
    /// Resolved column name.
    pub column: &'static str,
    get: Getter<E>,
    set: Setter<E>,
}

impl<E> ColumnMeta<E> {
    fn resolve(field: &FieldDescriptor<E>) -> Self {
        Self {
            field: field.name,
            column: column_name(field).unwrap_or(field.name),
            get: field.get,
            set: field.set,
        }
    }

    /// Read this field's current value.
    pub fn read(&self, entity: &E) -> Value {
        (self.get)(entity)
    }

    /// The setter, for the row mapper.
    pub(crate) fn setter(&self) -> Setter<E> {
        self.set
    }
}

impl<E> std::fmt::Debug for ColumnMeta<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnMeta")
            .field("field", &self.field)
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

/// Resolved metadata for one entity type.
#[derive(Debug)]
pub struct EntityMetadata<E> {
    entity: &'static str,
    table: &'static str,
    id: ColumnMeta<E>,
    columns: Vec<ColumnMeta<E>>,
}

impl<E: Entity> EntityMetadata<E> {
    /// Resolve metadata from the type's own descriptor.
    pub fn of() -> Result<Self> {
        Self::resolve(&E::descriptor())
    }
}

impl<E> EntityMetadata<E> {
    /// Resolve and validate a descriptor.
    ///
    /// Fails if the table or any column is not a bare SQL identifier, or if two
    /// fields resolve to the same column.
    pub fn resolve(descriptor: &EntityDescriptor<E>) -> Result<Self> {
        let entity = descriptor.type_name;
        let table = table_name(descriptor);
        if !is_valid_identifier(table) {
            return Err(MetadataError::new(entity, format!("invalid table name `{table}`")).into());
        }

        let id = ColumnMeta::resolve(&descriptor.id);
        let mut columns: Vec<ColumnMeta<E>> =
            descriptor.fields.iter().map(ColumnMeta::resolve).collect();
        columns.sort_by(|a, b| a.field.cmp(b.field));

        let mut seen_fields = HashSet::new();
        let mut seen_columns = HashSet::new();
        for col in std::iter::once(&id).chain(columns.iter()) {
            if !is_valid_identifier(col.column) {
                return Err(MetadataError::new(
                    entity,
                    format!("invalid column name `{}` for field `{}`", col.column, col.field),
                )
                .into());
            }
            if !seen_fields.insert(col.field) {
                return Err(
                    MetadataError::new(entity, format!("field `{}` declared twice", col.field))
                        .into(),
                );
            }
            if !seen_columns.insert(col.column.to_ascii_lowercase()) {
                return Err(MetadataError::new(
                    entity,
                    format!("column `{}` is mapped by more than one field", col.column),
                )
                .into());
            }
        }

        tracing::debug!(
            entity,
            table,
            id_column = id.column,
            columns = columns.len(),
            "Resolved entity metadata"
        );

        Ok(Self {
            entity,
            table,
            id,
            columns,
        })
    }

    /// Simple type name.
    pub fn entity_name(&self) -> &'static str {
        self.entity
    }

    /// Resolved table name.
    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Identifier field and column.
    pub fn id(&self) -> &ColumnMeta<E> {
        &self.id
    }

    /// Resolved identifier column.
    pub fn id_column(&self) -> &'static str {
        self.id.column
    }

    /// Non-identifier columns, sorted by field name.
    pub fn columns(&self) -> &[ColumnMeta<E>] {
        &self.columns
    }

    /// Non-identifier column names in binding order.
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.column)
    }

    /// Current identifier value of an entity.
    pub fn id_of(&self, entity: &E) -> Value {
        self.id.read(entity)
    }

    /// Current non-identifier values of an entity, in binding order.
    pub fn values_of(&self, entity: &E) -> Vec<Value> {
        self.columns.iter().map(|c| c.read(entity)).collect()
    }
}

/// Thread-safe, type-keyed cache of resolved [`EntityMetadata`].
///
/// Shared by a session factory and every session it creates.
#[derive(Default)]
pub struct MetadataRegistry {
    entries: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl MetadataRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve and cache metadata for `E` if not already present.
    pub fn register<E: Entity>(&self) -> Result<()> {
        self.get::<E>().map(|_| ())
    }

    /// Cached metadata for `E`, resolving it on first use.
    pub fn get<E: Entity>(&self) -> Result<Arc<EntityMetadata<E>>> {
        let type_id = TypeId::of::<E>();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(meta) = entries.get(&type_id) {
                if let Ok(meta) = Arc::clone(meta).downcast::<EntityMetadata<E>>() {
                    return Ok(meta);
                }
            }
        }

        let resolved = Arc::new(EntityMetadata::<E>::of()?);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .entry(type_id)
            .or_insert_with(|| Arc::clone(&resolved) as Arc<dyn Any + Send + Sync>);
        Ok(Arc::clone(entry)
            .downcast::<EntityMetadata<E>>()
            .unwrap_or(resolved))
    }

    /// Whether metadata for `E` has been resolved.
    pub fn contains<E: Entity>(&self) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<E>())
    }

    /// Number of registered entity types.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no entity type is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("entities", &self.len())
            .finish()
    }
}

//! Row-to-entity mapping.

use crate::entity::Entity;
use crate::error::{MappingError, Result};
use crate::metadata::{ColumnMeta, EntityMetadata};
use crate::row::Row;

/// Build a fresh entity from a row.
///
/// Starts from `E::default()` and assigns the identifier plus every persistent
/// field from the column of the same resolved name. Column lookup is exact
/// first, then ASCII case-insensitive. A missing column or a value of the
/// wrong shape fails the whole mapping; no partially filled entity escapes.
pub fn map_row<E: Entity>(metadata: &EntityMetadata<E>, row: &Row) -> Result<E> {
    let mut entity = E::default();
    for column in std::iter::once(metadata.id()).chain(metadata.columns()) {
        assign(metadata.entity_name(), column, &mut entity, row)?;
    }
    Ok(entity)
}

fn assign<E>(entity_name: &'static str, column: &ColumnMeta<E>, entity: &mut E, row: &Row) -> Result<()> {
    let Some(value) = row.get_by_name(column.column) else {
        return Err(MappingError::missing_column(entity_name, column.field, column.column).into());
    };
    (column.setter())(entity, value.clone()).map_err(|cause| {
        MappingError::type_mismatch(entity_name, column.field, column.column, cause).into()
    })
}

//! Builders for the select-by-id, select-all and update-by-id statements.

use tinyorm_core::{EntityMetadata, Error, MetadataError, Result, Value};

/// `SELECT * FROM {table} WHERE {id} = ?`
pub fn select_by_id_statement<E>(metadata: &EntityMetadata<E>) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = ?",
        metadata.table(),
        metadata.id_column()
    )
}

/// `SELECT * FROM {table}`
pub fn select_all_statement<E>(metadata: &EntityMetadata<E>) -> String {
    format!("SELECT * FROM {}", metadata.table())
}

/// `UPDATE {table} SET {c1}=?, {c2}=?, ... WHERE {id} = ?`
///
/// Columns appear in the metadata's column order, the same order the values
/// are bound in.
pub fn update_statement<E>(metadata: &EntityMetadata<E>) -> Result<String> {
    if metadata.columns().is_empty() {
        return Err(MetadataError::new(
            metadata.entity_name(),
            "no persistent columns besides the identifier; nothing to update",
        )
        .into());
    }
    let assignments: Vec<String> = metadata
        .column_names()
        .map(|column| format!("{column}=?"))
        .collect();
    Ok(format!(
        "UPDATE {} SET {} WHERE {} = ?",
        metadata.table(),
        assignments.join(", "),
        metadata.id_column()
    ))
}

/// SELECT-by-id query builder.
#[derive(Debug)]
pub struct SelectByIdBuilder<'a, E> {
    metadata: &'a EntityMetadata<E>,
    id: Value,
}

impl<'a, E> SelectByIdBuilder<'a, E> {
    /// Select the row whose identifier column equals `id`.
    pub fn new(metadata: &'a EntityMetadata<E>, id: impl Into<Value>) -> Self {
        Self {
            metadata,
            id: id.into(),
        }
    }

    /// Build the SQL and the single identifier parameter.
    pub fn build(self) -> (String, Vec<Value>) {
        (select_by_id_statement(self.metadata), vec![self.id])
    }
}

/// SELECT-all query builder.
#[derive(Debug)]
pub struct SelectAllBuilder<'a, E> {
    metadata: &'a EntityMetadata<E>,
}

impl<'a, E> SelectAllBuilder<'a, E> {
    /// Select every row of the entity's table.
    pub fn new(metadata: &'a EntityMetadata<E>) -> Self {
        Self { metadata }
    }

    /// Build the SQL. There are no parameters.
    pub fn build(self) -> (String, Vec<Value>) {
        (select_all_statement(self.metadata), Vec::new())
    }
}

/// UPDATE-by-id builder for one entity instance.
///
/// # Example
///
/// ```ignore
/// let (sql, params) = UpdateBuilder::new(&metadata, &person).build()?;
/// conn.execute(&sql, &params)?;
/// ```
#[derive(Debug)]
pub struct UpdateBuilder<'a, E> {
    metadata: &'a EntityMetadata<E>,
    entity: &'a E,
}

impl<'a, E> UpdateBuilder<'a, E> {
    /// Create an UPDATE builder for the given entity instance.
    pub fn new(metadata: &'a EntityMetadata<E>, entity: &'a E) -> Self {
        Self { metadata, entity }
    }

    /// Build the SQL and its parameters from the entity's current values.
    ///
    /// Fails with [`Error::MissingId`] when the identifier is null.
    pub fn build(self) -> Result<(String, Vec<Value>)> {
        let values = self.metadata.values_of(self.entity);
        self.build_with_values(values)
    }

    /// Build with pre-computed non-identifier values, in column order.
    ///
    /// Used when the caller already read the values, for example during a
    /// dirty check, so the entity is read exactly once.
    pub fn build_with_values(self, values: Vec<Value>) -> Result<(String, Vec<Value>)> {
        let id = self.metadata.id_of(self.entity);
        if id.is_null() {
            return Err(Error::MissingId {
                entity: self.metadata.entity_name(),
            });
        }
        let sql = update_statement(self.metadata)?;
        let mut params = values;
        params.push(id);
        tracing::trace!(sql = %sql, params = params.len(), "Built UPDATE");
        Ok((sql, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyorm_core::{Entity, EntityDescriptor, FieldDescriptor, FromValue};

    #[derive(Debug, Default)]
    struct Person {
        id: Option<i64>,
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
    }

    macro_rules! text_field {
        ($field:ident, $column:expr) => {
            FieldDescriptor::new(
                stringify!($field),
                |p: &Person| Value::from(p.$field.clone()),
                |p: &mut Person, v: Value| {
                    p.$field = FromValue::from_value(v)?;
                    Ok(())
                },
            )
            .column($column)
        };
    }

    impl Entity for Person {
        fn descriptor() -> EntityDescriptor<Self> {
            EntityDescriptor::new(
                "Person",
                FieldDescriptor::new(
                    "id",
                    |p: &Person| Value::from(p.id),
                    |p: &mut Person, v: Value| {
                        p.id = FromValue::from_value(v)?;
                        Ok(())
                    },
                ),
            )
            .table("persons")
            .field(text_field!(first_name, "first_name"))
            .field(text_field!(last_name, "last_name"))
            .field(text_field!(email, "email"))
        }
    }

    #[derive(Debug, Default)]
    struct Tag {
        code: i64,
    }

    impl Entity for Tag {
        fn descriptor() -> EntityDescriptor<Self> {
            EntityDescriptor::new(
                "Tag",
                FieldDescriptor::new(
                    "code",
                    |t: &Tag| Value::from(t.code),
                    |t: &mut Tag, v: Value| {
                        t.code = FromValue::from_value(v)?;
                        Ok(())
                    },
                )
                .column("tag_code"),
            )
        }
    }

    fn bohdan() -> Person {
        Person {
            id: Some(1),
            first_name: Some("Bohdan".into()),
            last_name: Some("Bodnar".into()),
            email: Some("Bohdan.Bodnar@gmail.com".into()),
        }
    }

    #[test]
    fn test_select_by_id() {
        let meta = EntityMetadata::<Person>::of().unwrap();
        let (sql, params) = SelectByIdBuilder::new(&meta, 1_i64).build();
        assert_eq!(sql, "SELECT * FROM persons WHERE id = ?");
        assert_eq!(params, vec![Value::BigInt(1)]);
    }

    #[test]
    fn test_select_by_id_uses_resolved_id_column() {
        let meta = EntityMetadata::<Tag>::of().unwrap();
        assert_eq!(
            select_by_id_statement(&meta),
            "SELECT * FROM Tag WHERE tag_code = ?"
        );
    }

    #[test]
    fn test_select_all() {
        let meta = EntityMetadata::<Person>::of().unwrap();
        let (sql, params) = SelectAllBuilder::new(&meta).build();
        assert_eq!(sql, "SELECT * FROM persons");
        assert!(params.is_empty());
    }

    #[test]
    fn test_update_columns_and_params_align() {
        let meta = EntityMetadata::<Person>::of().unwrap();
        let person = bohdan();
        let (sql, params) = UpdateBuilder::new(&meta, &person).build().unwrap();
        assert_eq!(
            sql,
            "UPDATE persons SET email=?, first_name=?, last_name=? WHERE id = ?"
        );
        assert_eq!(
            params,
            vec![
                Value::Text("Bohdan.Bodnar@gmail.com".into()),
                Value::Text("Bohdan".into()),
                Value::Text("Bodnar".into()),
                Value::BigInt(1),
            ]
        );
    }

    #[test]
    fn test_update_binds_nulls() {
        let meta = EntityMetadata::<Person>::of().unwrap();
        let person = Person {
            email: None,
            ..bohdan()
        };
        let (_, params) = UpdateBuilder::new(&meta, &person).build().unwrap();
        assert_eq!(params[0], Value::Null);
    }

    #[test]
    fn test_update_without_id_fails() {
        let meta = EntityMetadata::<Person>::of().unwrap();
        let person = Person::default();
        let err = UpdateBuilder::new(&meta, &person).build().unwrap_err();
        assert!(matches!(err, Error::MissingId { entity: "Person" }));
    }

    #[test]
    fn test_update_without_columns_fails() {
        let meta = EntityMetadata::<Tag>::of().unwrap();
        assert!(matches!(
            update_statement(&meta),
            Err(Error::Metadata(_))
        ));
    }

    #[test]
    fn test_build_with_values_appends_id() {
        let meta = EntityMetadata::<Person>::of().unwrap();
        let person = bohdan();
        let values = meta.values_of(&person);
        let (_, params) = UpdateBuilder::new(&meta, &person)
            .build_with_values(values)
            .unwrap();
        assert_eq!(params.last(), Some(&Value::BigInt(1)));
        assert_eq!(params.len(), 4);
    }
}

//! Implementation of the Entity derive macro.
//!
//! Parses `#[tinyorm(...)]` attributes on a struct and its fields and emits an
//! `Entity::descriptor()` that builds the static descriptor the session,
//! statement builder and row mapper consume.

use std::sync::LazyLock;

use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Error, Field, Fields, Ident, LitStr, Result};

static IDENTIFIER: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is a valid regex")
});

/// Parsed definition of a struct with `#[derive(Entity)]`.
#[derive(Debug)]
pub struct EntityDef {
    /// The struct name.
    pub name: Ident,
    /// Table override from `#[tinyorm(table = "...")]`.
    pub table: Option<String>,
    /// The identifier field.
    pub id: EntityFieldDef,
    /// Persistent non-identifier fields, in declaration order.
    pub fields: Vec<EntityFieldDef>,
}

/// One persistent field.
#[derive(Debug)]
pub struct EntityFieldDef {
    /// The field name.
    pub name: Ident,
    /// Column override from `#[tinyorm(column = "...")]`.
    pub column: Option<String>,
}

#[derive(Default)]
struct FieldAttrs {
    column: Option<String>,
    id: bool,
    skip: bool,
}

/// Parse a `DeriveInput` into an `EntityDef`.
pub fn parse_entity(input: &DeriveInput) -> Result<EntityDef> {
    let name = input.ident.clone();

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic types",
        ));
    }

    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new_spanned(
                    other,
                    "Entity requires a struct with named fields",
                ));
            }
        },
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not unions",
            ));
        }
    };

    let table = parse_table_attr(input)?;

    let mut marked_id: Option<EntityFieldDef> = None;
    let mut fields = Vec::new();
    for field in named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;
        let attrs = parse_field_attrs(field)?;
        if attrs.skip {
            if attrs.id || attrs.column.is_some() {
                return Err(Error::new_spanned(
                    field,
                    "a skipped field cannot also be an identifier or carry a column",
                ));
            }
            continue;
        }
        let def = EntityFieldDef {
            name: ident,
            column: attrs.column,
        };
        if attrs.id {
            if marked_id.is_some() {
                return Err(Error::new_spanned(
                    field,
                    "only one field may be marked #[tinyorm(id)]",
                ));
            }
            marked_id = Some(def);
        } else {
            fields.push(def);
        }
    }

    let id = match marked_id {
        Some(id) => id,
        None => {
            let pos = fields.iter().position(|f| f.name == "id").ok_or_else(|| {
                Error::new_spanned(
                    input,
                    "Entity requires an identifier: a field named `id` or one marked #[tinyorm(id)]",
                )
            })?;
            fields.remove(pos)
        }
    };

    Ok(EntityDef {
        name,
        table,
        id,
        fields,
    })
}

fn parse_table_attr(input: &DeriveInput) -> Result<Option<String>> {
    let mut table = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("tinyorm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let lit: LitStr = meta.value()?.parse()?;
                table = Some(validated_identifier(&lit)?);
                Ok(())
            } else {
                let attr_name = meta.path.to_token_stream().to_string();
                Err(meta.error(format!(
                    "unknown tinyorm struct attribute `{attr_name}`. Valid attributes are: table"
                )))
            }
        })?;
    }
    Ok(table)
}

fn parse_field_attrs(field: &Field) -> Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("tinyorm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.column = Some(validated_identifier(&lit)?);
            } else if meta.path.is_ident("id") {
                attrs.id = true;
            } else if meta.path.is_ident("skip") {
                attrs.skip = true;
            } else {
                let attr_name = meta.path.to_token_stream().to_string();
                return Err(meta.error(format!(
                    "unknown tinyorm field attribute `{attr_name}`. \
                     Valid attributes are: column, id, skip"
                )));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

fn validated_identifier(lit: &LitStr) -> Result<String> {
    let value = lit.value();
    if IDENTIFIER.is_match(&value) {
        Ok(value)
    } else {
        Err(Error::new_spanned(
            lit,
            format!("`{value}` is not a valid SQL identifier"),
        ))
    }
}

/// Generate the `Entity` implementation.
pub fn generate_entity_impl(def: &EntityDef) -> TokenStream {
    let name = &def.name;
    let name_str = name.unraw().to_string();

    let table = def.table.as_ref().map(|table| quote! { .table(#table) });
    let id = field_descriptor(name, &def.id);
    let fields = def.fields.iter().map(|field| {
        let descriptor = field_descriptor(name, field);
        quote! { .field(#descriptor) }
    });

    quote! {
        impl ::tinyorm::Entity for #name {
            fn descriptor() -> ::tinyorm::EntityDescriptor<Self> {
                ::tinyorm::EntityDescriptor::new(#name_str, #id)
                    #table
                    #(#fields)*
            }
        }
    }
}

fn field_descriptor(entity: &Ident, field: &EntityFieldDef) -> TokenStream {
    let field_name = &field.name;
    let field_str = field_name.unraw().to_string();
    let column = field.column.as_ref().map(|column| quote! { .column(#column) });

    quote! {
        ::tinyorm::FieldDescriptor::new(
            #field_str,
            |e: &#entity| -> ::tinyorm::Value {
                ::core::convert::From::from(::core::clone::Clone::clone(&e.#field_name))
            },
            |e: &mut #entity, v: ::tinyorm::Value| -> ::core::result::Result<(), ::tinyorm::TypeMismatch> {
                e.#field_name = ::tinyorm::FromValue::from_value(v)?;
                ::core::result::Result::Ok(())
            },
        )
        #column
    }
}

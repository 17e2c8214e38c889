//! Statement builders for tinyorm.
//!
//! `tinyorm-query` renders the three statement shapes the session needs from
//! resolved [`EntityMetadata`](tinyorm_core::EntityMetadata):
//!
//! - `SELECT * FROM {table} WHERE {id} = ?`
//! - `SELECT * FROM {table}`
//! - `UPDATE {table} SET {c1}=?, {c2}=? WHERE {id} = ?`
//!
//! Placeholders are positional `?` markers. The UPDATE binds the non-identifier
//! values in the metadata's column order, then the identifier.

pub mod builder;

pub use builder::{
    SelectAllBuilder, SelectByIdBuilder, UpdateBuilder, select_all_statement,
    select_by_id_statement, update_statement,
};

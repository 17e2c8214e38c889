//! tinyorm: a minimal ORM session.
//!
//! Load entities by primary key, get the same instance back for the same key,
//! mutate them in place, and let the session write back only what changed.
//!
//! # Quick Start
//!
//! ```ignore
//! use tinyorm::prelude::*;
//!
//! #[derive(Debug, Default, Entity)]
//! #[tinyorm(table = "persons")]
//! struct Person {
//!     id: Option<i64>,
//!     #[tinyorm(column = "first_name")]
//!     first_name: Option<String>,
//!     #[tinyorm(column = "last_name")]
//!     last_name: Option<String>,
//!     email: Option<String>,
//! }
//!
//! let factory = SessionFactory::new();
//! factory.register::<Person>()?;
//!
//! let mut session = factory.create_session(provider);
//! let person = session.get_required::<Person>(1)?;
//! person.borrow_mut().email = Some("bohdan@example.com".into());
//!
//! // UPDATE persons SET email=?, first_name=?, last_name=? WHERE id = ?
//! session.close()?;
//! ```
//!
//! # Crates
//!
//! - `tinyorm-core`: values, rows, errors, connection traits, entity metadata
//! - `tinyorm-macros`: `#[derive(Entity)]`
//! - `tinyorm-query`: statement builders
//! - `tinyorm-session`: `Session`, `SessionFactory`, `EntityKey`

pub use tinyorm_core::{
    BoxError, ColumnMeta, Connection, ConnectionError, ConnectionErrorKind, ConnectionProvider,
    Entity, EntityDescriptor, EntityMetadata, Error, FieldDescriptor, FromValue, Getter,
    MappingError, MetadataError, MetadataRegistry, QueryError, QueryErrorKind, Result, Row,
    Setter, TypeMismatch, Value, column_name, is_valid_identifier, map_row, table_name,
};
pub use tinyorm_macros::Entity;
pub use tinyorm_query::{
    SelectAllBuilder, SelectByIdBuilder, UpdateBuilder, select_all_statement,
    select_by_id_statement, update_statement,
};
pub use tinyorm_session::{
    EntityKey, Managed, Session, SessionConfig, SessionDebugInfo, SessionFactory,
};

/// Everything needed to declare entities and run sessions.
pub mod prelude {
    pub use crate::{
        Connection, ConnectionProvider, Entity, EntityKey, Error, Managed, Result, Row, Session,
        SessionConfig, SessionFactory, Value,
    };
}

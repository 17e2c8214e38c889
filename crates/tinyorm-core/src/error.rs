//! Error types shared by every tinyorm crate.
//!
//! Nothing here is retried or recovered locally: every failure travels back to
//! the immediate caller of `find`, `update`, `flush` or `close`.

use std::fmt;

use crate::value::{TypeMismatch, Value};

/// Boxed driver-level cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across tinyorm.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error type.
#[derive(Debug)]
pub enum Error {
    /// A storage connection could not be acquired or was lost.
    Connection(ConnectionError),
    /// The driver rejected a prepared or executed statement.
    Query(QueryError),
    /// A fetched value could not be assigned into an entity field.
    Mapping(MappingError),
    /// Entity metadata failed to resolve.
    Metadata(MetadataError),
    /// No row exists for the requested id.
    NotFound {
        /// Entity type name.
        entity: &'static str,
        /// Requested identifier.
        id: Value,
    },
    /// An entity without an identifier was handed to an id-based write.
    MissingId {
        /// Entity type name.
        entity: &'static str,
    },
    /// A managed entity was mutably borrowed by the caller while the session
    /// needed to read it.
    Borrowed {
        /// Entity type name.
        entity: &'static str,
        /// Identifier of the borrowed entity.
        id: Value,
    },
    /// Anything else.
    Custom(String),
}

impl Error {
    /// Shorthand for a connection failure.
    pub fn connection(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Error::Connection(ConnectionError {
            kind,
            message: message.into(),
            source: None,
        })
    }

    /// Shorthand for a statement failure.
    pub fn query(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Error::Query(QueryError::new(kind, message))
    }

    /// Attach the SQL text to a statement failure if it does not carry one yet.
    #[must_use]
    pub fn with_sql(self, sql: &str) -> Self {
        match self {
            Error::Query(mut e) => {
                if e.sql.is_none() {
                    e.sql = Some(sql.to_string());
                }
                Error::Query(e)
            }
            other => other,
        }
    }

    /// Attach the offending entity (for example `Person#1`) to a statement failure.
    #[must_use]
    pub fn with_entity(self, entity: impl fmt::Display) -> Self {
        match self {
            Error::Query(mut e) => {
                if e.entity.is_none() {
                    e.entity = Some(entity.to_string());
                }
                Error::Query(e)
            }
            other => other,
        }
    }

    /// Whether this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "connection error: {e}"),
            Error::Query(e) => write!(f, "statement error: {e}"),
            Error::Mapping(e) => write!(f, "row mapping error: {e}"),
            Error::Metadata(e) => write!(f, "metadata error: {e}"),
            Error::NotFound { entity, id } => write!(f, "{entity} with id {id} not found"),
            Error::MissingId { entity } => {
                write!(f, "{entity} has no identifier; cannot write it by id")
            }
            Error::Borrowed { entity, id } => {
                write!(f, "{entity}#{id} is mutably borrowed and cannot be read")
            }
            Error::Custom(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn std::error::Error + 'static)),
            Error::Mapping(e) => e
                .cause
                .as_ref()
                .map(|c| c as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Error::Connection(e)
    }
}

impl From<QueryError> for Error {
    fn from(e: QueryError) -> Self {
        Error::Query(e)
    }
}

impl From<MappingError> for Error {
    fn from(e: MappingError) -> Self {
        Error::Mapping(e)
    }
}

impl From<MetadataError> for Error {
    fn from(e: MetadataError) -> Self {
        Error::Metadata(e)
    }
}

// ============================================================================
// Connection errors
// ============================================================================

/// Why a connection could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Acquiring a connection failed.
    Connect,
    /// The connection was lost mid-operation.
    Disconnected,
    /// Authentication was rejected.
    Authentication,
}

/// Connection-level failure.
#[derive(Debug)]
pub struct ConnectionError {
    /// Failure category.
    pub kind: ConnectionErrorKind,
    /// Human readable description.
    pub message: String,
    /// Underlying driver error.
    pub source: Option<BoxError>,
}

impl ConnectionError {
    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ConnectionErrorKind::Connect => "cannot acquire connection",
            ConnectionErrorKind::Disconnected => "connection lost",
            ConnectionErrorKind::Authentication => "authentication failed",
        };
        write!(f, "{kind}: {}", self.message)
    }
}

// ============================================================================
// Statement errors
// ============================================================================

/// Why a statement was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Malformed SQL or unknown table/column.
    Syntax,
    /// Constraint violation.
    Constraint,
    /// A bound parameter did not fit the column type.
    TypeMismatch,
    /// BEGIN/COMMIT/ROLLBACK failed.
    Transaction,
    /// Any other driver-side failure.
    Database,
}

/// Statement-level failure.
#[derive(Debug)]
pub struct QueryError {
    /// Failure category.
    pub kind: QueryErrorKind,
    /// Human readable description.
    pub message: String,
    /// The statement text, when known.
    pub sql: Option<String>,
    /// The entity being read or written, rendered as `Type#id`.
    pub entity: Option<String>,
    /// Underlying driver error.
    pub source: Option<BoxError>,
}

impl QueryError {
    /// Create a statement error with no context attached.
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            sql: None,
            entity: None,
            source: None,
        }
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " (entity: {entity})")?;
        }
        if let Some(sql) = &self.sql {
            write!(f, " (sql: {sql})")?;
        }
        Ok(())
    }
}

// ============================================================================
// Mapping errors
// ============================================================================

/// A fetched value could not be assigned into a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingError {
    /// Entity type name.
    pub entity: &'static str,
    /// Field name.
    pub field: &'static str,
    /// Column the value was read from.
    pub column: &'static str,
    /// Shape mismatch, or `None` when the column was absent from the row.
    pub cause: Option<TypeMismatch>,
}

impl MappingError {
    /// The row had no column for this field.
    pub fn missing_column(entity: &'static str, field: &'static str, column: &'static str) -> Self {
        Self {
            entity,
            field,
            column,
            cause: None,
        }
    }

    /// The column value had the wrong shape for this field.
    pub fn type_mismatch(
        entity: &'static str,
        field: &'static str,
        column: &'static str,
        cause: TypeMismatch,
    ) -> Self {
        Self {
            entity,
            field,
            column,
            cause: Some(cause),
        }
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(
                f,
                "cannot assign column `{}` to {}.{}: {cause}",
                self.column, self.entity, self.field
            ),
            None => write!(
                f,
                "row has no column `{}` for {}.{}",
                self.column, self.entity, self.field
            ),
        }
    }
}

// ============================================================================
// Metadata errors
// ============================================================================

/// Entity metadata did not resolve to a usable table/column layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataError {
    /// Entity type name.
    pub entity: &'static str,
    /// What was wrong.
    pub message: String,
}

impl MetadataError {
    /// Create a metadata error.
    pub fn new(entity: &'static str, message: impl Into<String>) -> Self {
        Self {
            entity,
            message: message.into(),
        }
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entity, self.message)
    }
}

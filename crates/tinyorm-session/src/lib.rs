//! Identity-map session for tinyorm.
//!
//! The Session loads entities by primary key, keeps at most one live instance
//! per key, snapshots each entity's field values when it is loaded, and on
//! close writes back every entity whose current values differ from its
//! snapshot.
//!
//! # Design Philosophy
//!
//! - **Synchronous**: every operation blocks for its storage round trips.
//! - **Single-threaded**: managed entities are `Rc<RefCell<E>>`, so a session is
//!   neither `Send` nor `Sync`.
//! - **Short-lived connections**: a connection is acquired right before each
//!   statement and released right after (atomic flush holds one for the
//!   whole transaction).
//! - **Type erasure**: the identity map stores `Box<dyn TrackedEntity>` for
//!   heterogeneous entity types.
//!
//! # Example
//!
//! ```ignore
//! let factory = SessionFactory::new();
//! let mut session = factory.create_session(provider);
//!
//! // Loads from storage and snapshots the row.
//! let person = session.find::<Person>(1)?.expect("exists");
//!
//! // Identity map hit: same instance, no storage access.
//! let again = session.find::<Person>(1)?.expect("exists");
//! assert!(Rc::ptr_eq(&person, &again));
//!
//! person.borrow_mut().email = Some("new@example.com".into());
//!
//! // Writes one UPDATE for the changed entity.
//! session.close()?;
//! ```

use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use tinyorm_core::{
    Connection, ConnectionProvider, Entity, EntityMetadata, Error, MetadataRegistry, Result,
    Value, map_row,
};
use tinyorm_query::{SelectByIdBuilder, UpdateBuilder};

/// A managed entity: the single shared instance the session hands out per key.
pub type Managed<E> = Rc<RefCell<E>>;

// ============================================================================
// Session Configuration
// ============================================================================

/// Configuration for Session behavior.
///
/// Missing keys take their defaults when deserialized, so `{}` is a valid
/// configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Write all dirty entities in one transaction (BEGIN ... COMMIT) and roll
    /// back on the first failure. Off by default: each UPDATE stands alone and
    /// earlier writes stay durable when a later one fails.
    pub atomic_flush: bool,
    /// Flush dirty entities when the session is closed.
    pub flush_on_close: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            atomic_flush: false,
            flush_on_close: true,
        }
    }
}

impl SessionConfig {
    /// Enable or disable transactional flushing.
    pub fn atomic_flush(mut self, enabled: bool) -> Self {
        self.atomic_flush = enabled;
        self
    }

    /// Enable or disable flushing on close.
    pub fn flush_on_close(mut self, enabled: bool) -> Self {
        self.flush_on_close = enabled;
        self
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Custom(format!("invalid session config: {e}")))
    }
}

// ============================================================================
// Entity Key
// ============================================================================

/// Identity of a managed entity: its type plus its identifier value.
///
/// Two keys are equal when both the entity type and the id are equal. Integer
/// ids compare numerically, so `1_i32` and `1_i64` address the same entity.
#[derive(Debug, Clone)]
pub struct EntityKey {
    entity_type: TypeId,
    entity_name: &'static str,
    id: Value,
}

impl EntityKey {
    /// Key for entity type `E` with the given identifier.
    pub fn new<E: 'static>(id: impl Into<Value>) -> Self {
        Self {
            entity_type: TypeId::of::<E>(),
            entity_name: short_type_name::<E>(),
            id: id.into(),
        }
    }

    fn with_name<E: 'static>(entity_name: &'static str, id: Value) -> Self {
        Self {
            entity_type: TypeId::of::<E>(),
            entity_name,
            id,
        }
    }

    /// The entity's `TypeId`.
    pub fn entity_type(&self) -> TypeId {
        self.entity_type
    }

    /// Simple name of the entity type.
    pub fn entity_name(&self) -> &'static str {
        self.entity_name
    }

    /// The identifier value.
    pub fn id(&self) -> &Value {
        &self.id
    }

    /// Whether this key belongs to entity type `E`.
    pub fn is<E: 'static>(&self) -> bool {
        self.entity_type == TypeId::of::<E>()
    }
}

impl PartialEq for EntityKey {
    fn eq(&self, other: &Self) -> bool {
        self.entity_type == other.entity_type && self.id == other.id
    }
}

impl Eq for EntityKey {}

impl Hash for EntityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entity_type.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_name, self.id)
    }
}

fn short_type_name<E>() -> &'static str {
    let full = std::any::type_name::<E>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ============================================================================
// Tracked Entities
// ============================================================================

/// An UPDATE ready to run for one dirty entity.
struct PendingWrite {
    key: EntityKey,
    sql: String,
    params: Vec<Value>,
    /// Current non-identifier values, the snapshot after a successful write.
    values: Vec<Value>,
}

/// Type-erased view of a managed entity.
trait TrackedEntity {
    fn as_any(&self) -> &dyn Any;

    /// Current non-identifier values in column order.
    fn current_values(&self, key: &EntityKey) -> Result<Vec<Value>>;

    /// The UPDATE for this entity if its values differ from `snapshot`.
    fn pending_write(&self, key: &EntityKey, snapshot: &[Value]) -> Result<Option<PendingWrite>>;
}

struct Tracked<E: Entity> {
    handle: Managed<E>,
    metadata: Arc<EntityMetadata<E>>,
}

impl<E: Entity> Tracked<E> {
    fn borrowed(&self, key: &EntityKey) -> Error {
        Error::Borrowed {
            entity: self.metadata.entity_name(),
            id: key.id().clone(),
        }
    }
}

impl<E: Entity> TrackedEntity for Tracked<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn current_values(&self, key: &EntityKey) -> Result<Vec<Value>> {
        let entity = self.handle.try_borrow().map_err(|_| self.borrowed(key))?;
        Ok(self.metadata.values_of(&entity))
    }

    fn pending_write(&self, key: &EntityKey, snapshot: &[Value]) -> Result<Option<PendingWrite>> {
        let entity = self.handle.try_borrow().map_err(|_| self.borrowed(key))?;
        let values = self.metadata.values_of(&entity);
        if values == snapshot {
            return Ok(None);
        }
        let (sql, params) =
            UpdateBuilder::new(&*self.metadata, &*entity).build_with_values(values.clone())?;
        Ok(Some(PendingWrite {
            key: key.clone(),
            sql,
            params,
            values,
        }))
    }
}

fn execute_write<C: Connection>(conn: &C, write: &PendingWrite) -> Result<u64> {
    tracing::debug!(entity = %write.key, sql = %write.sql, "Executing UPDATE");
    conn.execute(&write.sql, &write.params)
        .map_err(|e| e.with_sql(&write.sql).with_entity(&write.key))
}

// ============================================================================
// Session
// ============================================================================

/// Unit of work over one connection provider.
///
/// Created by [`SessionFactory::create_session`]. Dropping a session without
/// calling [`Session::close`] discards pending changes.
pub struct Session<P: ConnectionProvider> {
    provider: P,
    registry: Arc<MetadataRegistry>,
    config: SessionConfig,
    /// Identity map: at most one live instance per key.
    identity_map: HashMap<EntityKey, Box<dyn TrackedEntity>>,
    /// Field values captured at load (or last successful flush).
    snapshots: HashMap<EntityKey, Vec<Value>>,
    /// Keys in load order; flushes write in this order.
    load_order: Vec<EntityKey>,
}

impl<P: ConnectionProvider> Session<P> {
    /// Create a session with its own metadata registry and default config.
    pub fn new(provider: P) -> Self {
        Self::with_registry(provider, Arc::new(MetadataRegistry::new()), SessionConfig::default())
    }

    fn with_registry(provider: P, registry: Arc<MetadataRegistry>, config: SessionConfig) -> Self {
        Self {
            provider,
            registry,
            config,
            identity_map: HashMap::new(),
            snapshots: HashMap::new(),
            load_order: Vec::new(),
        }
    }

    /// Get the connection provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Get an entity by primary key.
    ///
    /// Returns the managed instance from the identity map when present, without
    /// touching storage. Otherwise runs `SELECT * FROM {table} WHERE {id} = ?`,
    /// maps the first row, snapshots it and starts managing it. Returns
    /// `Ok(None)` when no row matches; nothing is cached in that case.
    #[tracing::instrument(level = "debug", skip(self, id))]
    pub fn find<E: Entity>(&mut self, id: impl Into<Value>) -> Result<Option<Managed<E>>> {
        let metadata = self.registry.get::<E>()?;
        let key = EntityKey::with_name::<E>(metadata.entity_name(), id.into());

        if let Some(tracked) = self.identity_map.get(&key) {
            if let Some(tracked) = tracked.as_any().downcast_ref::<Tracked<E>>() {
                tracing::debug!(entity = %key, "Identity map hit");
                return Ok(Some(Rc::clone(&tracked.handle)));
            }
        }

        let (sql, params) = SelectByIdBuilder::new(&*metadata, key.id().clone()).build();
        tracing::debug!(entity = %key, table = metadata.table(), sql = %sql, "Identity map miss, loading");

        let row = {
            let conn = self.provider.connection()?;
            conn.query_one(&sql, &params)
                .map_err(|e| e.with_sql(&sql).with_entity(&key))?
        };

        let Some(row) = row else {
            tracing::debug!(entity = %key, "No row found");
            return Ok(None);
        };

        let entity = map_row(&*metadata, &row)?;
        let snapshot = metadata.values_of(&entity);
        let handle = Rc::new(RefCell::new(entity));

        self.snapshots.insert(key.clone(), snapshot);
        self.load_order.push(key.clone());
        self.identity_map.insert(
            key,
            Box::new(Tracked {
                handle: Rc::clone(&handle),
                metadata,
            }),
        );

        Ok(Some(handle))
    }

    /// Like [`find`](Self::find), but a missing row is [`Error::NotFound`].
    pub fn get_required<E: Entity>(&mut self, id: impl Into<Value>) -> Result<Managed<E>> {
        let id = id.into();
        match self.find::<E>(id.clone())? {
            Some(handle) => Ok(handle),
            None => Err(Error::NotFound {
                entity: self.registry.get::<E>()?.entity_name(),
                id,
            }),
        }
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write an entity's current values by id, whether or not it is managed
    /// and whether or not it changed.
    ///
    /// Returns the affected row count. Fails with [`Error::MissingId`] when
    /// the identifier is null. The snapshot of a managed entity is left as is.
    #[tracing::instrument(level = "debug", skip(self, entity))]
    pub fn update<E: Entity>(&self, entity: &E) -> Result<u64> {
        let metadata = self.registry.get::<E>()?;
        let (sql, params) = UpdateBuilder::new(&*metadata, entity).build()?;
        let key = EntityKey::with_name::<E>(metadata.entity_name(), metadata.id_of(entity));

        tracing::debug!(entity = %key, sql = %sql, "Executing UPDATE");
        let conn = self.provider.connection()?;
        conn.execute(&sql, &params)
            .map_err(|e| e.with_sql(&sql).with_entity(&key))
    }

    /// Write every dirty managed entity now.
    ///
    /// Written entities stay managed and their snapshots are replaced with the
    /// values just written. Returns the number of UPDATE statements that
    /// succeeded.
    ///
    /// Without `atomic_flush`, entities are written one statement at a time in
    /// load order and the first failure stops the flush; writes before it are
    /// durable. With `atomic_flush`, all writes share one connection inside
    /// BEGIN/COMMIT and the first failure rolls the whole batch back.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn flush(&mut self) -> Result<usize> {
        let start = Instant::now();
        tracing::info!(
            tracked = self.identity_map.len(),
            atomic = self.config.atomic_flush,
            "Starting flush"
        );

        let written = if self.config.atomic_flush {
            self.flush_atomic()?
        } else {
            self.flush_each()?
        };

        tracing::info!(
            written,
            elapsed_ms = start.elapsed().as_millis(),
            "Flush completed"
        );
        Ok(written)
    }

    fn flush_each(&mut self) -> Result<usize> {
        let mut written = 0;
        for key in &self.load_order {
            let (Some(tracked), Some(snapshot)) =
                (self.identity_map.get(key), self.snapshots.get_mut(key))
            else {
                continue;
            };
            let Some(write) = tracked.pending_write(key, snapshot)? else {
                continue;
            };
            let conn = self.provider.connection()?;
            execute_write(&conn, &write)?;
            drop(conn);
            *snapshot = write.values;
            written += 1;
        }
        Ok(written)
    }

    fn flush_atomic(&mut self) -> Result<usize> {
        let mut writes = Vec::new();
        for key in &self.load_order {
            let (Some(tracked), Some(snapshot)) =
                (self.identity_map.get(key), self.snapshots.get(key))
            else {
                continue;
            };
            if let Some(write) = tracked.pending_write(key, snapshot)? {
                writes.push(write);
            }
        }
        if writes.is_empty() {
            return Ok(0);
        }

        let conn = self.provider.connection()?;
        conn.begin().map_err(|e| e.with_sql("BEGIN"))?;
        for write in &writes {
            if let Err(e) = execute_write(&conn, write) {
                tracing::warn!(entity = %write.key, error = %e, "Flush failed, rolling back");
                if let Err(rollback) = conn.rollback() {
                    tracing::warn!(error = %rollback, "ROLLBACK failed");
                }
                return Err(e);
            }
        }
        conn.commit().map_err(|e| e.with_sql("COMMIT"))?;
        drop(conn);

        let written = writes.len();
        for write in writes {
            if let Some(snapshot) = self.snapshots.get_mut(&write.key) {
                *snapshot = write.values;
            }
        }
        Ok(written)
    }

    /// Flush dirty entities (when `flush_on_close` is set) and end the session.
    ///
    /// The identity map and snapshots are discarded whether or not the flush
    /// succeeds. Without `atomic_flush`, a failure leaves earlier writes
    /// durable and later entities unwritten.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn close(mut self) -> Result<()> {
        let result = if self.config.flush_on_close {
            self.flush().map(|_| ())
        } else {
            Ok(())
        };

        let tracked = self.identity_map.len();
        self.identity_map.clear();
        self.snapshots.clear();
        self.load_order.clear();

        match &result {
            Ok(()) => tracing::info!(tracked, "Session closed"),
            Err(e) => tracing::warn!(tracked, error = %e, "Session closed with flush failure"),
        }
        result
    }

    // ========================================================================
    // Tracking
    // ========================================================================

    /// Whether an entity of type `E` with this id is managed.
    pub fn contains<E: Entity>(&self, id: impl Into<Value>) -> bool {
        self.identity_map.contains_key(&EntityKey::new::<E>(id))
    }

    /// Whether a managed entity's current values differ from its snapshot.
    ///
    /// An instance this session does not manage is never dirty.
    pub fn is_dirty<E: Entity>(&self, entity: &Managed<E>) -> Result<bool> {
        let Some(key) = self.key_of(entity) else {
            return Ok(false);
        };
        match (self.identity_map.get(key), self.snapshots.get(key)) {
            (Some(tracked), Some(snapshot)) => Ok(tracked.current_values(key)? != *snapshot),
            _ => Ok(false),
        }
    }

    /// Stop managing an entity. It is not written on flush or close.
    ///
    /// Returns whether the key was managed.
    pub fn detach<E: Entity>(&mut self, id: impl Into<Value>) -> bool {
        let key = EntityKey::new::<E>(id);
        let removed = self.identity_map.remove(&key).is_some();
        if removed {
            self.snapshots.remove(&key);
            self.load_order.retain(|k| k != &key);
            tracing::debug!(entity = %key, "Detached");
        }
        removed
    }

    fn key_of<E: Entity>(&self, entity: &Managed<E>) -> Option<&EntityKey> {
        self.load_order.iter().find(|key| {
            key.is::<E>()
                && self
                    .identity_map
                    .get(*key)
                    .and_then(|t| t.as_any().downcast_ref::<Tracked<E>>())
                    .is_some_and(|t| Rc::ptr_eq(&t.handle, entity))
        })
    }

    // ========================================================================
    // Debug Diagnostics
    // ========================================================================

    /// Get total managed entity count.
    pub fn tracked_count(&self) -> usize {
        self.identity_map.len()
    }

    /// Dump session state for debugging.
    ///
    /// Entities currently mutably borrowed by the caller cannot be compared
    /// and are counted separately.
    pub fn debug_state(&self) -> SessionDebugInfo {
        let mut dirty = 0;
        let mut borrowed = 0;
        for key in &self.load_order {
            let (Some(tracked), Some(snapshot)) =
                (self.identity_map.get(key), self.snapshots.get(key))
            else {
                continue;
            };
            match tracked.current_values(key) {
                Ok(values) if values != *snapshot => dirty += 1,
                Ok(_) => {}
                Err(_) => borrowed += 1,
            }
        }
        SessionDebugInfo {
            tracked: self.tracked_count(),
            dirty,
            borrowed,
            registered_types: self.registry.len(),
            atomic_flush: self.config.atomic_flush,
        }
    }
}

impl<P: ConnectionProvider> fmt::Debug for Session<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("tracked", &self.load_order)
            .finish_non_exhaustive()
    }
}

/// Debug information about session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDebugInfo {
    /// Managed entities.
    pub tracked: usize,
    /// Managed entities whose values differ from their snapshot.
    pub dirty: usize,
    /// Managed entities mutably borrowed at the time of the dump.
    pub borrowed: usize,
    /// Entity types with resolved metadata.
    pub registered_types: usize,
    /// Whether flushes are transactional.
    pub atomic_flush: bool,
}

// ============================================================================
// Session Factory
// ============================================================================

/// Creates sessions that share one metadata registry and configuration.
///
/// The factory is `Send + Sync` and cheap to clone; sessions are not.
#[derive(Debug, Clone, Default)]
pub struct SessionFactory {
    registry: Arc<MetadataRegistry>,
    config: SessionConfig,
}

impl SessionFactory {
    /// Factory with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with an explicit configuration.
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            registry: Arc::new(MetadataRegistry::new()),
            config,
        }
    }

    /// Resolve and validate metadata for `E` up front.
    ///
    /// Otherwise metadata resolves on first use inside a session.
    pub fn register<E: Entity>(&self) -> Result<&Self> {
        self.registry.register::<E>()?;
        tracing::debug!(
            entity = std::any::type_name::<E>(),
            "Registered entity"
        );
        Ok(self)
    }

    /// The shared metadata registry.
    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    /// The configuration given to new sessions.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a session over the given connection provider.
    pub fn create_session<P: ConnectionProvider>(&self, provider: P) -> Session<P> {
        Session::with_registry(provider, Arc::clone(&self.registry), self.config)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

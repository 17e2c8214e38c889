//! Shared entities and a recording mock database for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tinyorm::{
    Connection, ConnectionErrorKind, ConnectionProvider, Entity, Error, QueryErrorKind, Result,
    Row, Value,
};

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq, Entity)]
#[tinyorm(table = "persons")]
pub struct Person {
    pub id: Option<i64>,
    #[tinyorm(column = "first_name")]
    pub first_name: Option<String>,
    #[tinyorm(column = "last_name")]
    pub last_name: Option<String>,
    #[tinyorm(column = "email")]
    pub email: Option<String>,
}

/// Default table and column names, an explicit identifier and a transient field.
#[derive(Debug, Default, Clone, PartialEq, Entity)]
pub struct Invoice {
    #[tinyorm(id, column = "invoice_no")]
    pub number: i64,
    pub total: f64,
    pub paid: bool,
    #[tinyorm(skip)]
    pub cached_label: String,
}

pub fn person_row(id: i64, first: &str, last: &str, email: &str) -> Row {
    Row::new(
        vec![
            "id".into(),
            "first_name".into(),
            "last_name".into(),
            "email".into(),
        ],
        vec![
            Value::BigInt(id),
            Value::Text(first.into()),
            Value::Text(last.into()),
            Value::Text(email.into()),
        ],
    )
}

pub fn bohdan_row() -> Row {
    person_row(1, "Bohdan", "Bodnar", "Bohdan.Bodnar@gmail.com")
}

// ============================================================================
// Mock database
// ============================================================================

/// One statement as the driver saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct MockState {
    /// Canned rows per table.
    pub tables: HashMap<String, Vec<Row>>,
    pub log: Vec<Statement>,
    pub query_calls: usize,
    pub execute_calls: usize,
    pub connections_acquired: usize,
    pub open_connections: usize,
    pub max_open_connections: usize,
    /// Refuse to hand out connections.
    pub refuse_connections: bool,
    /// 1-based number of the UPDATE statement that the driver rejects.
    pub fail_update_number: Option<usize>,
    pub updates_seen: usize,
}

/// Recording connection provider. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockDb {
    pub state: Arc<Mutex<MockState>>,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, table: &str, rows: Vec<Row>) -> Self {
        self.state
            .lock()
            .expect("lock poisoned")
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
        self
    }

    pub fn fail_update(self, number: usize) -> Self {
        self.state.lock().expect("lock poisoned").fail_update_number = Some(number);
        self
    }

    pub fn refuse_connections(self) -> Self {
        self.state.lock().expect("lock poisoned").refuse_connections = true;
        self
    }

    pub fn log(&self) -> Vec<Statement> {
        self.state.lock().expect("lock poisoned").log.clone()
    }

    pub fn sql_log(&self) -> Vec<String> {
        self.log().into_iter().map(|s| s.sql).collect()
    }

    pub fn updates(&self) -> Vec<Statement> {
        self.log()
            .into_iter()
            .filter(|s| s.sql.starts_with("UPDATE"))
            .collect()
    }

    pub fn query_calls(&self) -> usize {
        self.state.lock().expect("lock poisoned").query_calls
    }

    pub fn open_connections(&self) -> usize {
        self.state.lock().expect("lock poisoned").open_connections
    }

    pub fn max_open_connections(&self) -> usize {
        self.state.lock().expect("lock poisoned").max_open_connections
    }

    pub fn connections_acquired(&self) -> usize {
        self.state.lock().expect("lock poisoned").connections_acquired
    }
}

impl ConnectionProvider for MockDb {
    type Connection = MockConnection;

    fn connection(&self) -> Result<MockConnection> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.refuse_connections {
            return Err(Error::connection(
                ConnectionErrorKind::Connect,
                "database unavailable",
            ));
        }
        state.connections_acquired += 1;
        state.open_connections += 1;
        state.max_open_connections = state.max_open_connections.max(state.open_connections);
        Ok(MockConnection {
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.open_connections -= 1;
        }
    }
}

impl Connection for MockConnection {
    /// Understands `SELECT * FROM {table}` and `SELECT * FROM {table} WHERE {col} = ?`.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.query_calls += 1;
        state.log.push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        let words: Vec<&str> = sql.split_whitespace().collect();
        let table = words.get(3).copied().unwrap_or_default();
        let rows = state.tables.get(table).cloned().unwrap_or_default();
        match (words.get(5), params.first()) {
            (Some(column), Some(wanted)) => Ok(rows
                .into_iter()
                .filter(|row| row.get_by_name(column) == Some(wanted))
                .collect()),
            _ => Ok(rows),
        }
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.execute_calls += 1;
        state.log.push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        if sql.starts_with("UPDATE") {
            state.updates_seen += 1;
            if state.fail_update_number == Some(state.updates_seen) {
                return Err(Error::query(
                    QueryErrorKind::Constraint,
                    "constraint violated",
                ));
            }
        }
        Ok(1)
    }
}

/// Resolved metadata for `E`, for assertions.
pub fn metadata<E: Entity>() -> tinyorm::EntityMetadata<E> {
    tinyorm::EntityMetadata::<E>::of().expect("metadata resolves")
}

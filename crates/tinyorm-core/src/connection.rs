//! Storage connection contracts.
//!
//! tinyorm ships no driver. A driver implements [`Connection`]; whatever hands
//! out connections (a plain factory, a pool owned by the application)
//! implements [`ConnectionProvider`]. The session asks the provider for a fresh
//! connection right before each statement and drops it right after, so
//! releasing it is the connection's `Drop`.

use std::rc::Rc;
use std::sync::Arc;

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// A synchronous database connection.
///
/// Every call blocks for the full storage round trip. Placeholders in `sql`
/// are positional `?` markers bound from `params` in order.
pub trait Connection {
    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a query and return the first row, if any.
    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Start a transaction.
    fn begin(&self) -> Result<()> {
        self.execute("BEGIN", &[]).map(|_| ())
    }

    /// Commit the current transaction.
    fn commit(&self) -> Result<()> {
        self.execute("COMMIT", &[]).map(|_| ())
    }

    /// Roll back the current transaction.
    fn rollback(&self) -> Result<()> {
        self.execute("ROLLBACK", &[]).map(|_| ())
    }
}

/// Source of storage connections.
pub trait ConnectionProvider {
    /// The connection type handed out.
    type Connection: Connection;

    /// Acquire a connection. Failures should be `Error::Connection`.
    fn connection(&self) -> Result<Self::Connection>;
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for &P {
    type Connection = P::Connection;

    fn connection(&self) -> Result<Self::Connection> {
        (**self).connection()
    }
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for Arc<P> {
    type Connection = P::Connection;

    fn connection(&self) -> Result<Self::Connection> {
        (**self).connection()
    }
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for Rc<P> {
    type Connection = P::Connection;

    fn connection(&self) -> Result<Self::Connection> {
        (**self).connection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Log {
        statements: RefCell<Vec<String>>,
    }

    struct LogConnection<'a> {
        log: &'a Log,
        rows: Vec<Row>,
    }

    impl Connection for LogConnection<'_> {
        fn query(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            self.log.statements.borrow_mut().push(sql.to_string());
            Ok(self.rows.clone())
        }

        fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64> {
            self.log.statements.borrow_mut().push(sql.to_string());
            Ok(0)
        }
    }

    #[test]
    fn test_query_one_takes_first_row() {
        let log = Log::default();
        let conn = LogConnection {
            log: &log,
            rows: vec![
                Row::new(vec!["id".into()], vec![Value::BigInt(1)]),
                Row::new(vec!["id".into()], vec![Value::BigInt(2)]),
            ],
        };
        let row = conn.query_one("SELECT * FROM t", &[]).unwrap().unwrap();
        assert_eq!(row.get(0), Some(&Value::BigInt(1)));
    }

    #[test]
    fn test_query_one_empty_result() {
        let log = Log::default();
        let conn = LogConnection {
            log: &log,
            rows: vec![],
        };
        assert!(conn.query_one("SELECT * FROM t", &[]).unwrap().is_none());
    }

    #[test]
    fn test_default_transaction_statements() {
        let log = Log::default();
        let conn = LogConnection {
            log: &log,
            rows: vec![],
        };
        conn.begin().unwrap();
        conn.rollback().unwrap();
        conn.begin().unwrap();
        conn.commit().unwrap();
        assert_eq!(
            *log.statements.borrow(),
            vec!["BEGIN", "ROLLBACK", "BEGIN", "COMMIT"]
        );
    }
}

//! Rows returned by a storage driver.

use serde::{Deserialize, Serialize};

use crate::value::{FromValue, Value};

/// A fetched row: column names paired positionally with values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row. Extra names or values beyond the shorter list are ignored.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Column names in result order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in result order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len().min(self.values.len())
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at a column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value for a column name.
    ///
    /// An exact match wins; otherwise the first ASCII case-insensitive match is
    /// used, since SQL identifiers are case-insensitive unless quoted.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let index = self
            .columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))?;
        self.values.get(index)
    }

    /// Typed value for a column name.
    ///
    /// Returns `None` when the column is absent, `Some(Err(_))` when present
    /// but of the wrong shape.
    pub fn get_named<T: FromValue>(
        &self,
        name: &str,
    ) -> Option<Result<T, crate::value::TypeMismatch>> {
        self.get_by_name(name).map(|v| T::from_value(v.clone()))
    }

    /// Iterate `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

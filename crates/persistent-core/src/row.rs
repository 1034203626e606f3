//! Result rows.

use std::sync::Arc;

use crate::value::Value;

/// One row of a result set: column names (shared across the rows of a statement)
/// and their values, in select order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<Vec<String>>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row. `values` must be as long as `columns`.
    pub fn new(columns: Arc<Vec<String>>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of a named column.
    pub fn get_named(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Column names in select order.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Iterate `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Consume the row, yielding `(column, value)` pairs.
    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.columns.iter().cloned().zip(self.values).collect()
    }
}

//! Generated-key result rows.

use std::collections::HashMap;
use std::sync::Arc;

use crate::value::Value;

/// Column names shared by every row of one result set.
#[derive(Debug, Clone, Default)]
pub struct ColumnNames {
    names: Vec<String>,
    name_to_index: HashMap<String, usize>,
}

impl ColumnNames {
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// One row of generated values returned by the data-access layer.
///
/// Rows from the same statement should share their [`ColumnNames`] via
/// [`Row::with_columns`].
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnNames>,
}

impl Row {
    /// Create a row with its own column list.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            values,
            columns: Arc::new(ColumnNames::new(column_names)),
        }
    }

    /// Create a row sharing column metadata with its siblings.
    pub fn with_columns(columns: Arc<ColumnNames>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by exact column name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Column names of this row.
    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_index() {
        let row = Row::new(
            vec!["id".to_string(), "GENERATED_KEY".to_string()],
            vec![Value::BigInt(1), Value::BigInt(2)],
        );
        assert_eq!(row.get_by_name("GENERATED_KEY"), Some(&Value::BigInt(2)));
        assert_eq!(row.get(0), Some(&Value::BigInt(1)));
        assert!(row.get_by_name("missing").is_none());
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_rows_share_columns() {
        let cols = Arc::new(ColumnNames::new(vec!["id".to_string()]));
        let a = Row::with_columns(Arc::clone(&cols), vec![Value::Int(1)]);
        let b = Row::with_columns(cols, vec![Value::Int(2)]);
        assert_eq!(a.column_names(), b.column_names());
    }
}

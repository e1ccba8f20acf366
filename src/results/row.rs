use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// Column names of a result, shared by every row produced from the same statement.
#[derive(Debug, PartialEq, Eq)]
pub struct RowColumns {
    names: Vec<String>,
    // First occurrence wins when a join yields duplicate names.
    index: HashMap<String, usize>,
}

impl RowColumns {
    #[must_use]
    pub fn new(names: Vec<String>) -> Arc<Self> {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Arc::new(Self { names, index })
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn position(&self, column_name: &str) -> Option<usize> {
        self.index.get(column_name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A row from a query result
///
/// Maps each declared column name of the statement to the value SQLite produced for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<RowColumns>,
    values: Vec<RowValues>,
}

impl Row {
    /// Create a new row
    ///
    /// # Arguments
    ///
    /// * `columns` - The column names, shared with sibling rows
    /// * `values` - The values for this row, in column order
    #[must_use]
    pub fn new(columns: Arc<RowColumns>, values: Vec<RowValues>) -> Self {
        Self { columns, values }
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.columns
            .position(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    #[must_use]
    pub fn contains_column(&self, column_name: &str) -> bool {
        self.columns.position(column_name).is_some()
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(column name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Copy the row into an owned name → value map.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, RowValues> {
        self.iter()
            .map(|(name, value)| (name.to_owned(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_index() {
        let columns = RowColumns::new(vec!["id".into(), "name".into()]);
        let row = Row::new(
            columns,
            vec![RowValues::Int(7), RowValues::Text("widget".into())],
        );
        assert_eq!(row.get("name"), Some(&RowValues::Text("widget".into())));
        assert_eq!(row.get_by_index(0), Some(&RowValues::Int(7)));
        assert_eq!(row.get("missing"), None);
        assert!(!row.contains_column("missing"));
    }

    #[test]
    fn duplicate_column_names_resolve_to_first() {
        let columns = RowColumns::new(vec!["id".into(), "id".into()]);
        let row = Row::new(columns, vec![RowValues::Int(1), RowValues::Int(2)]);
        assert_eq!(row.get("id"), Some(&RowValues::Int(1)));
        assert_eq!(row.len(), 2);
    }
}

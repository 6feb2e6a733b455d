//! Ordered field → value rows.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::value::SqlValue;

/// A single table row: field names mapped to values, in field order.
///
/// Field order is the order fields were inserted. Inserting an existing field
/// replaces its value but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    fields: IndexMap<String, SqlValue>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty row with room for `capacity` fields.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: IndexMap::with_capacity(capacity),
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(field, value);
        self
    }

    /// Set a field, returning the value it replaced.
    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: impl Into<SqlValue>,
    ) -> Option<SqlValue> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&SqlValue> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Iterate `(field, value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (field, value) in iter {
            row.insert(field, value);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, SqlValue);
    type IntoIter = indexmap::map::IntoIter<String, SqlValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_preserves_insertion_order() {
        let row = Row::new().with("b", 2i64).with("a", 1i64).with("c", 3i64);
        let names: Vec<&str> = row.field_names().collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_reinsert_keeps_position_and_replaces_value() {
        let mut row = Row::new().with("id", 1i64).with("email", "a@b.com");
        let previous = row.insert("id", 7i64);
        assert_eq!(previous, Some(SqlValue::Int(1)));
        assert_eq!(row.get("id"), Some(&SqlValue::Int(7)));
        assert_eq!(row.field_names().next(), Some("id"));
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_from_iterator() {
        let row: Row = vec![("id", SqlValue::Int(1)), ("name", SqlValue::Null)]
            .into_iter()
            .collect();
        assert!(row.contains("name"));
        assert!(row.get("name").is_some_and(SqlValue::is_null));
    }
}

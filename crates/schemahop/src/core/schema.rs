//! Reflected table metadata.
//!
//! Only what data conversion needs is reflected: table names and the ordered
//! columns of each table. Keys, indexes and constraints belong to the
//! destination schema, which is created outside this tool.

use serde::{Deserialize, Serialize};

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Engine-specific data type name as reported by the catalog
    /// (e.g. `int4`, `varchar`, `tinyint`). Empty when unknown.
    pub data_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// A column whose type is unknown to the catalog.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Schema (PostgreSQL) or database (MySQL) the table lives in.
    pub schema: String,

    /// Table name.
    pub name: String,

    /// Column definitions, in ordinal order.
    pub columns: Vec<Column>,
}

impl TableDescriptor {
    pub fn new(schema: impl Into<String>, name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns,
        }
    }

    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        if self.schema.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }

    /// Ordered field names.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Find a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDescriptor {
        TableDescriptor::new(
            "public",
            "users",
            vec![Column::new("id", "int4"), Column::new("email", "varchar")],
        )
    }

    #[test]
    fn test_full_name() {
        assert_eq!(users().full_name(), "public.users");

        let bare = TableDescriptor::new("", "users", Vec::new());
        assert_eq!(bare.full_name(), "users");
    }

    #[test]
    fn test_fields_in_ordinal_order() {
        let table = users();
        let fields: Vec<&str> = table.fields().collect();
        assert_eq!(fields, vec!["id", "email"]);
        assert!(table.has_field("email"));
        assert!(!table.has_field("password"));
        assert_eq!(table.column("id").map(|c| c.data_type.as_str()), Some("int4"));
    }
}

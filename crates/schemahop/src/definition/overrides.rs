//! Override tables for one (source, destination) dialect pair.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::{Row, SqlValue, TableDescriptor};
use crate::error::ConvertError;

/// Converts a single field value.
pub type FieldConverter =
    Arc<dyn Fn(&SqlValue) -> std::result::Result<SqlValue, ConvertError> + Send + Sync>;

/// Converts a whole row; `Ok(None)` drops the row.
pub type RowConverter =
    Arc<dyn Fn(&Row) -> std::result::Result<Option<Row>, ConvertError> + Send + Sync>;

/// Converts all rows of a table at once.
///
/// Receives every source row and the destination table; `Ok(None)` writes
/// nothing for the table.
pub type TableConverter = Arc<
    dyn Fn(Vec<Row>, &TableDescriptor) -> std::result::Result<Option<Vec<Row>>, ConvertError>
        + Send
        + Sync,
>;

/// Where a source table goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOverride {
    /// Do not read or write the table.
    Skip,
    /// Write the table's rows into a differently named destination table.
    Rename(String),
}

/// Where a source field goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOverride {
    /// Drop the field from every row.
    Skip,
    /// Write the value under a different destination field name.
    Rename(String),
}

/// Field-level rules of one source table.
#[derive(Clone, Default)]
pub struct FieldRules {
    pub(crate) overrides: HashMap<String, FieldOverride>,
    pub(crate) converters: HashMap<String, FieldConverter>,
}

impl FieldRules {
    pub fn field_override(&self, field: &str) -> Option<&FieldOverride> {
        self.overrides.get(field)
    }

    pub fn converter(&self, field: &str) -> Option<&FieldConverter> {
        self.converters.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty() && self.converters.is_empty()
    }
}

impl fmt::Debug for FieldRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut converted: Vec<&String> = self.converters.keys().collect();
        converted.sort();
        f.debug_struct("FieldRules")
            .field("overrides", &self.overrides)
            .field("converters", &converted)
            .finish()
    }
}

/// Every override a definition declares for one dialect pair.
///
/// Lookups that find nothing mean identity behavior.
#[derive(Clone, Default)]
pub struct OverrideSet {
    pub(crate) tables: HashMap<String, TableOverride>,
    pub(crate) table_converters: HashMap<String, TableConverter>,
    pub(crate) row_converters: HashMap<String, RowConverter>,
    pub(crate) fields: HashMap<String, FieldRules>,
}

impl OverrideSet {
    pub fn table_override(&self, table: &str) -> Option<&TableOverride> {
        self.tables.get(table)
    }

    pub fn table_converter(&self, table: &str) -> Option<&TableConverter> {
        self.table_converters.get(table)
    }

    pub fn row_converter(&self, table: &str) -> Option<&RowConverter> {
        self.row_converters.get(table)
    }

    pub fn field_rules(&self, table: &str) -> Option<&FieldRules> {
        self.fields.get(table)
    }

    /// True when the set declares nothing at all.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.table_converters.is_empty()
            && self.row_converters.is_empty()
            && self.fields.values().all(FieldRules::is_empty)
    }
}

impl fmt::Debug for OverrideSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn sorted(mut keys: Vec<&String>) -> Vec<&String> {
            keys.sort();
            keys
        }

        f.debug_struct("OverrideSet")
            .field("tables", &self.tables)
            .field(
                "table_converters",
                &sorted(self.table_converters.keys().collect()),
            )
            .field(
                "row_converters",
                &sorted(self.row_converters.keys().collect()),
            )
            .field("fields", &self.fields)
            .finish()
    }
}

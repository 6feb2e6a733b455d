//! Migration definitions.
//!
//! A [`Definition`] describes how the data of one application's schema, at a
//! range of schema versions, is carried from a source engine to a destination
//! engine. It holds override tables keyed by [`DialectPair`]; anything not
//! overridden is copied unchanged (same table, same field, same value).
//!
//! Definitions are assembled with [`DefinitionBuilder`] and are immutable
//! afterwards. Conflicting overrides are rejected by
//! [`DefinitionBuilder::build`]:
//!
//! - the same table, field or converter declared twice
//! - a skipped table that also carries converters or field rules
//! - a table converter combined with row converters or field rules for the
//!   same table (the table converter replaces both)
//! - a skipped field that also has a value converter

mod overrides;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub use overrides::{
    FieldConverter, FieldOverride, FieldRules, OverrideSet, RowConverter, TableConverter,
    TableOverride,
};

use crate::core::{Row, SqlValue, TableDescriptor};
use crate::dialect::DialectPair;
use crate::error::{ConvertError, MigrateError, Result};
use crate::version::VersionConstraint;

/// An immutable, named and versioned set of conversion overrides.
#[derive(Debug)]
pub struct Definition {
    name: String,
    constraint: VersionConstraint,
    description: Option<String>,
    table_order: Vec<String>,
    overrides: HashMap<DialectPair, OverrideSet>,
}

impl Definition {
    /// Start building a definition for application `name` covering the
    /// schema versions matched by `constraint`.
    pub fn builder(name: impl Into<String>, constraint: impl Into<String>) -> DefinitionBuilder {
        DefinitionBuilder::new(name, constraint)
    }

    /// A definition without overrides: every table and field is copied as is.
    pub fn identity(name: impl Into<String>, constraint: impl Into<String>) -> Result<Self> {
        Self::builder(name, constraint).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version_constraint(&self) -> &VersionConstraint {
        &self.constraint
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Tables to convert first, in this order. Other tables follow in catalog
    /// order.
    pub fn table_order(&self) -> &[String] {
        &self.table_order
    }

    /// Overrides for a dialect pair, if the definition declares any.
    pub fn overrides(&self, pair: DialectPair) -> Option<&OverrideSet> {
        self.overrides.get(&pair)
    }

    /// Dialect pairs with declared overrides, sorted.
    pub fn pairs(&self) -> Vec<DialectPair> {
        let mut pairs: Vec<DialectPair> = self.overrides.keys().copied().collect();
        pairs.sort();
        pairs
    }
}

/// Builder for [`Definition`].
///
/// Methods record conflicts instead of failing immediately so definitions
/// can be written as one chain; [`build`](Self::build) reports them all.
pub struct DefinitionBuilder {
    name: String,
    constraint: String,
    description: Option<String>,
    table_order: Vec<String>,
    overrides: HashMap<DialectPair, OverrideSet>,
    errors: Vec<String>,
}

impl DefinitionBuilder {
    fn new(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: constraint.into(),
            description: None,
            table_order: Vec::new(),
            overrides: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn table_order<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.table_order = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn skip_table(self, pair: DialectPair, table: impl Into<String>) -> Self {
        self.set_table(pair, table.into(), TableOverride::Skip)
    }

    pub fn rename_table(
        self,
        pair: DialectPair,
        table: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        self.set_table(pair, table.into(), TableOverride::Rename(destination.into()))
    }

    pub fn table_converter<F>(mut self, pair: DialectPair, table: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Row>, &TableDescriptor) -> std::result::Result<Option<Vec<Row>>, ConvertError>
            + Send
            + Sync
            + 'static,
    {
        let table = table.into();
        let set = self.overrides.entry(pair).or_default();
        if set.table_converters.contains_key(&table) {
            self.errors.push(format!(
                "{}: table converter for '{}' declared twice",
                pair, table
            ));
        } else {
            set.table_converters.insert(table, Arc::new(f));
        }
        self
    }

    pub fn row_converter<F>(mut self, pair: DialectPair, table: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Row) -> std::result::Result<Option<Row>, ConvertError> + Send + Sync + 'static,
    {
        let table = table.into();
        let set = self.overrides.entry(pair).or_default();
        if set.row_converters.contains_key(&table) {
            self.errors.push(format!(
                "{}: row converter for '{}' declared twice",
                pair, table
            ));
        } else {
            set.row_converters.insert(table, Arc::new(f));
        }
        self
    }

    pub fn skip_field(
        self,
        pair: DialectPair,
        table: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        self.set_field(pair, table.into(), field.into(), FieldOverride::Skip)
    }

    pub fn rename_field(
        self,
        pair: DialectPair,
        table: impl Into<String>,
        field: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        self.set_field(
            pair,
            table.into(),
            field.into(),
            FieldOverride::Rename(destination.into()),
        )
    }

    pub fn field_converter<F>(
        mut self,
        pair: DialectPair,
        table: impl Into<String>,
        field: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: Fn(&SqlValue) -> std::result::Result<SqlValue, ConvertError> + Send + Sync + 'static,
    {
        let (table, field) = (table.into(), field.into());
        let rules = self
            .overrides
            .entry(pair)
            .or_default()
            .fields
            .entry(table.clone())
            .or_default();
        if rules.converters.contains_key(&field) {
            self.errors.push(format!(
                "{}: converter for field '{}.{}' declared twice",
                pair, table, field
            ));
        } else {
            rules.converters.insert(field, Arc::new(f));
        }
        self
    }

    fn set_table(mut self, pair: DialectPair, table: String, rule: TableOverride) -> Self {
        if let TableOverride::Rename(destination) = &rule {
            if destination.is_empty() {
                self.errors
                    .push(format!("{}: table '{}' renamed to an empty name", pair, table));
                return self;
            }
        }
        let set = self.overrides.entry(pair).or_default();
        if set.tables.contains_key(&table) {
            self.errors
                .push(format!("{}: table '{}' overridden twice", pair, table));
        } else {
            set.tables.insert(table, rule);
        }
        self
    }

    fn set_field(
        mut self,
        pair: DialectPair,
        table: String,
        field: String,
        rule: FieldOverride,
    ) -> Self {
        if let FieldOverride::Rename(destination) = &rule {
            if destination.is_empty() {
                self.errors.push(format!(
                    "{}: field '{}.{}' renamed to an empty name",
                    pair, table, field
                ));
                return self;
            }
        }
        let rules = self
            .overrides
            .entry(pair)
            .or_default()
            .fields
            .entry(table.clone())
            .or_default();
        if rules.overrides.contains_key(&field) {
            self.errors.push(format!(
                "{}: field '{}.{}' overridden twice",
                pair, table, field
            ));
        } else {
            rules.overrides.insert(field, rule);
        }
        self
    }

    /// Check cross-rule conflicts that depend on the complete rule set.
    fn check_conflicts(&mut self) {
        let mut pairs: Vec<&DialectPair> = self.overrides.keys().collect();
        pairs.sort();

        for pair in pairs {
            let set = &self.overrides[pair];

            let mut skipped: Vec<&String> = set
                .tables
                .iter()
                .filter(|(_, rule)| **rule == TableOverride::Skip)
                .map(|(table, _)| table)
                .collect();
            skipped.sort();
            for table in skipped {
                let has_fields = set.fields.get(table).is_some_and(|r| !r.is_empty());
                if set.table_converters.contains_key(table)
                    || set.row_converters.contains_key(table)
                    || has_fields
                {
                    self.errors.push(format!(
                        "{}: table '{}' is skipped but also has conversion rules",
                        pair, table
                    ));
                }
            }

            let mut custom: Vec<&String> = set.table_converters.keys().collect();
            custom.sort();
            for table in custom {
                let has_fields = set.fields.get(table).is_some_and(|r| !r.is_empty());
                if set.row_converters.contains_key(table) || has_fields {
                    self.errors.push(format!(
                        "{}: table '{}' has a table converter and row or field rules",
                        pair, table
                    ));
                }
            }

            let mut row_converted: Vec<&String> = set
                .row_converters
                .keys()
                .filter(|table| !set.table_converters.contains_key(*table))
                .collect();
            row_converted.sort();
            for table in row_converted {
                if set.fields.get(table).is_some_and(|r| !r.is_empty()) {
                    self.errors.push(format!(
                        "{}: table '{}' has a row converter and field rules",
                        pair, table
                    ));
                }
            }

            let mut tables: Vec<&String> = set.fields.keys().collect();
            tables.sort();
            for table in tables {
                let rules = &set.fields[table];
                let mut fields: Vec<&String> = rules
                    .overrides
                    .iter()
                    .filter(|(_, rule)| **rule == FieldOverride::Skip)
                    .map(|(field, _)| field)
                    .filter(|field| rules.converters.contains_key(*field))
                    .collect();
                fields.sort();
                for field in fields {
                    self.errors.push(format!(
                        "{}: field '{}.{}' is skipped but also has a converter",
                        pair, table, field
                    ));
                }
            }
        }

        let mut seen = HashSet::new();
        for table in &self.table_order {
            if !seen.insert(table.as_str()) {
                self.errors
                    .push(format!("table '{}' listed twice in table order", table));
            }
        }
    }

    /// Validate and freeze the definition.
    pub fn build(mut self) -> Result<Definition> {
        let constraint: VersionConstraint = self.constraint.parse()?;

        if self.name.trim().is_empty() {
            self.errors.push("definition name is empty".to_string());
        }

        self.check_conflicts();

        if !self.errors.is_empty() {
            return Err(MigrateError::Definition(format!(
                "'{}' ({}): {}",
                self.name,
                self.constraint,
                self.errors.join("; ")
            )));
        }

        self.overrides.retain(|_, set| !set.is_empty());

        Ok(Definition {
            name: self.name,
            constraint,
            description: self.description,
            table_order: self.table_order,
            overrides: self.overrides,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;

    const MY_PG: DialectPair = DialectPair::new(Dialect::Mysql, Dialect::Postgres);
    const PG_PG: DialectPair = DialectPair::new(Dialect::Postgres, Dialect::Postgres);

    fn expect_definition_error(builder: DefinitionBuilder, needle: &str) {
        match builder.build() {
            Err(MigrateError::Definition(message)) => {
                assert!(message.contains(needle), "unexpected message: {message}")
            }
            other => panic!("expected Definition error, got {other:?}"),
        }
    }

    #[test]
    fn test_identity_definition() {
        let def = Definition::identity("default", "*").unwrap();
        assert_eq!(def.name(), "default");
        assert!(def.version_constraint().is_any());
        assert!(def.overrides(MY_PG).is_none());
        assert!(def.pairs().is_empty());
    }

    #[test]
    fn test_lookups_are_scoped_by_pair() {
        let def = Definition::builder("app", "==1.0")
            .description("test app")
            .skip_table(MY_PG, "cache")
            .rename_table(MY_PG, "users", "accounts")
            .rename_field(MY_PG, "users", "pass", "password_hash")
            .skip_field(MY_PG, "users", "login")
            .field_converter(MY_PG, "users", "id", |v| Ok(v.clone()))
            .build()
            .unwrap();

        let set = def.overrides(MY_PG).unwrap();
        assert_eq!(set.table_override("cache"), Some(&TableOverride::Skip));
        assert_eq!(
            set.table_override("users"),
            Some(&TableOverride::Rename("accounts".to_string()))
        );
        let rules = set.field_rules("users").unwrap();
        assert_eq!(
            rules.field_override("pass"),
            Some(&FieldOverride::Rename("password_hash".to_string()))
        );
        assert_eq!(rules.field_override("login"), Some(&FieldOverride::Skip));
        assert!(rules.converter("id").is_some());
        assert!(rules.converter("pass").is_none());

        assert!(def.overrides(PG_PG).is_none());
        assert_eq!(def.description(), Some("test app"));
    }

    #[test]
    fn test_duplicate_overrides_rejected() {
        expect_definition_error(
            Definition::builder("app", "*")
                .skip_table(MY_PG, "users")
                .rename_table(MY_PG, "users", "accounts"),
            "overridden twice",
        );
        expect_definition_error(
            Definition::builder("app", "*")
                .field_converter(MY_PG, "t", "f", |v| Ok(v.clone()))
                .field_converter(MY_PG, "t", "f", |v| Ok(v.clone())),
            "declared twice",
        );
    }

    #[test]
    fn test_same_table_under_different_pairs_is_fine() {
        let def = Definition::builder("app", "*")
            .skip_table(MY_PG, "users")
            .rename_table(PG_PG, "users", "accounts")
            .build()
            .unwrap();
        assert_eq!(def.pairs(), vec![MY_PG, PG_PG]);
    }

    #[test]
    fn test_skip_conflicts_rejected() {
        expect_definition_error(
            Definition::builder("app", "*")
                .skip_table(MY_PG, "users")
                .row_converter(MY_PG, "users", |row| Ok(Some(row.clone()))),
            "is skipped",
        );
        expect_definition_error(
            Definition::builder("app", "*")
                .skip_field(MY_PG, "users", "pass")
                .field_converter(MY_PG, "users", "pass", |v| Ok(v.clone())),
            "is skipped",
        );
        expect_definition_error(
            Definition::builder("app", "*")
                .table_converter(MY_PG, "users", |rows, _| Ok(Some(rows)))
                .skip_field(MY_PG, "users", "pass"),
            "table converter",
        );
    }

    #[test]
    fn test_row_converter_with_field_rules_rejected() {
        expect_definition_error(
            Definition::builder("app", "*")
                .row_converter(MY_PG, "users", |row| Ok(Some(row.clone())))
                .rename_field(MY_PG, "users", "pass", "password_hash"),
            "has a row converter and field rules",
        );
        expect_definition_error(
            Definition::builder("app", "*")
                .field_converter(MY_PG, "users", "id", |v| Ok(v.clone()))
                .row_converter(MY_PG, "users", |row| Ok(Some(row.clone()))),
            "row converter",
        );

        // Field rules on another table are fine.
        Definition::builder("app", "*")
            .row_converter(MY_PG, "users", |row| Ok(Some(row.clone())))
            .rename_field(MY_PG, "identities", "pass", "password_hash")
            .build()
            .unwrap();
    }

    #[test]
    fn test_override_set_debug_lists_converted_tables_sorted() {
        let def = Definition::builder("app", "*")
            .table_converter(MY_PG, "system", |rows, _| Ok(Some(rows)))
            .table_converter(MY_PG, "cache", |rows, _| Ok(Some(rows)))
            .row_converter(MY_PG, "users", |row| Ok(Some(row.clone())))
            .row_converter(MY_PG, "contacts", |row| Ok(Some(row.clone())))
            .build()
            .unwrap();

        let debug = format!("{:?}", def.overrides(MY_PG).unwrap());
        assert!(debug.contains(r#"table_converters: ["cache", "system"]"#), "{debug}");
        assert!(debug.contains(r#"row_converters: ["contacts", "users"]"#), "{debug}");
    }

    #[test]
    fn test_bad_constraint_and_order() {
        let err = Definition::builder("app", ">=").build().unwrap_err();
        assert!(matches!(err, MigrateError::InvalidConstraint { .. }));

        expect_definition_error(
            Definition::builder("app", "*").table_order(["users", "users"]),
            "listed twice",
        );
        expect_definition_error(Definition::builder(" ", "*"), "name is empty");
    }
}

//! Roundcube webmail, schema of release 1.4.1.
//!
//! MySQL stores flags as `TINYINT(1)`, which the MySQL driver decodes as
//! booleans; the PostgreSQL schema declares the same columns `smallint`.
//! Session data, caches and the `system` version bookkeeping table are not
//! carried over: caches rebuild themselves and the destination schema was
//! installed with its own `system` rows.

use crate::core::SqlValue;
use crate::definition::{Definition, DefinitionBuilder};
use crate::dialect::{Dialect, DialectPair};
use crate::error::{ConvertError, Result};

const MYSQL_TO_POSTGRES: DialectPair = DialectPair::new(Dialect::Mysql, Dialect::Postgres);

const SKIPPED_TABLES: &[&str] = &[
    "system",
    "session",
    "cache",
    "cache_index",
    "cache_messages",
    "cache_shared",
    "cache_thread",
];

const FLAG_FIELDS: &[(&str, &str)] = &[
    ("contacts", "del"),
    ("contactgroups", "del"),
    ("identities", "del"),
    ("identities", "standard"),
    ("identities", "html_signature"),
];

/// Parents before children, so foreign keys hold while rows are inserted.
const TABLE_ORDER: &[&str] = &[
    "users",
    "contacts",
    "contactgroups",
    "contactgroupmembers",
    "identities",
    "dictionary",
    "searches",
    "filestore",
];

/// Convert a boolean flag to the 0/1 integer a `smallint` column expects.
fn flag_to_int(value: &SqlValue) -> std::result::Result<SqlValue, ConvertError> {
    match value {
        SqlValue::Bool(flag) => Ok(SqlValue::Int(i64::from(*flag))),
        SqlValue::Int(0 | 1) | SqlValue::Null => Ok(value.clone()),
        SqlValue::Int(other) => Err(ConvertError::new(format!(
            "flag value {} is neither 0 nor 1",
            other
        ))),
        other => Err(ConvertError::new(format!(
            "expected a boolean flag, got {}",
            other.kind()
        ))),
    }
}

pub fn roundcube_definition() -> Result<Definition> {
    let mut builder: DefinitionBuilder = Definition::builder("roundcube", "==1.4.1")
        .description("Roundcube webmail 1.4.1 (MySQL to PostgreSQL)")
        .table_order(TABLE_ORDER.iter().copied());

    for table in SKIPPED_TABLES {
        builder = builder.skip_table(MYSQL_TO_POSTGRES, *table);
    }
    for (table, field) in FLAG_FIELDS {
        builder = builder.field_converter(MYSQL_TO_POSTGRES, *table, *field, flag_to_int);
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::TableOverride;

    #[test]
    fn test_flag_to_int() {
        assert_eq!(flag_to_int(&SqlValue::Bool(true)).unwrap(), SqlValue::Int(1));
        assert_eq!(flag_to_int(&SqlValue::Bool(false)).unwrap(), SqlValue::Int(0));
        assert_eq!(flag_to_int(&SqlValue::Int(1)).unwrap(), SqlValue::Int(1));
        assert_eq!(flag_to_int(&SqlValue::Null).unwrap(), SqlValue::Null);

        let err = flag_to_int(&SqlValue::Int(7)).unwrap_err();
        assert!(err.message().contains("neither 0 nor 1"));
        let err = flag_to_int(&SqlValue::Text("yes".into())).unwrap_err();
        assert!(err.message().contains("text"));
    }

    #[test]
    fn test_definition_shape() {
        let def = roundcube_definition().unwrap();
        assert_eq!(def.name(), "roundcube");
        assert_eq!(def.version_constraint().to_string(), "==1.4.1");
        assert_eq!(def.table_order()[0], "users");

        let set = def.overrides(MYSQL_TO_POSTGRES).unwrap();
        for table in SKIPPED_TABLES {
            assert_eq!(set.table_override(table), Some(&TableOverride::Skip));
        }
        assert!(set.table_override("users").is_none());
        assert!(set
            .field_rules("identities")
            .and_then(|r| r.converter("html_signature"))
            .is_some());

        let pg_to_pg = DialectPair::new(Dialect::Postgres, Dialect::Postgres);
        assert!(def.overrides(pg_to_pg).is_none());
    }
}

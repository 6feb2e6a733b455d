//! Identifier validation and quoting.
//!
//! Table and column names come from catalog reflection and from definition
//! overrides, and are interpolated into SQL text because identifiers cannot be
//! bound as parameters. Every identifier is validated and then quoted with
//! the dialect's quoting rules, doubling any embedded quote character.

use crate::error::{MigrateError, Result};

/// Maximum identifier length accepted (MySQL allows 64, PostgreSQL 63 bytes;
/// the catalog of each engine enforces its own exact limit).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier.
///
/// Rejects empty identifiers, identifiers containing NUL bytes and
/// identifiers longer than [`MAX_IDENTIFIER_LENGTH`] bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains a NUL byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds {} bytes (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier: `"name"`.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a MySQL identifier: `` `name` ``.
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Qualify a PostgreSQL table name with its schema.
pub fn qualify_pg(schema: &str, table: &str) -> Result<String> {
    if schema.is_empty() {
        return quote_pg(table);
    }
    Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(table)?))
}

/// Qualify a MySQL table name with its database.
pub fn qualify_mysql(schema: &str, table: &str) -> Result<String> {
    if schema.is_empty() {
        return quote_mysql(table);
    }
    Ok(format!("{}.{}", quote_mysql(schema)?, quote_mysql(table)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_pg() {
        assert_eq!(quote_pg("users").unwrap(), "\"users\"");
        assert_eq!(quote_pg("table\"name").unwrap(), "\"table\"\"name\"");
    }

    #[test]
    fn test_quote_mysql() {
        assert_eq!(quote_mysql("users").unwrap(), "`users`");
        assert_eq!(quote_mysql("table`name").unwrap(), "`table``name`");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify_pg("public", "users").unwrap(), "\"public\".\"users\"");
        assert_eq!(qualify_mysql("", "users").unwrap(), "`users`");
        assert_eq!(
            qualify_mysql("roundcube", "users").unwrap(),
            "`roundcube`.`users`"
        );
    }

    #[test]
    fn test_rejects_invalid_identifiers() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("users\0; DROP TABLE x").is_err());
        assert!(validate_identifier(&"x".repeat(MAX_IDENTIFIER_LENGTH + 1)).is_err());
        assert!(validate_identifier(&"x".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
    }
}

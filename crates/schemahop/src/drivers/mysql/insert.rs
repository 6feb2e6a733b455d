//! Multi-row `INSERT` statement text.

/// MySQL rejects prepared statements with more placeholders than this.
pub(crate) const MAX_PLACEHOLDERS: usize = 65_535;

/// Rows per statement so one statement stays under [`MAX_PLACEHOLDERS`].
pub(crate) fn rows_per_statement(field_count: usize) -> usize {
    (MAX_PLACEHOLDERS / field_count.max(1)).max(1)
}

/// `INSERT INTO t (a, b) VALUES (?, ?), (?, ?)` for `row_count` rows.
///
/// `columns` must already be quoted.
pub(crate) fn insert_sql(qualified_table: &str, columns: &[String], row_count: usize) -> String {
    let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![tuple.as_str(); row_count].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualified_table,
        columns.join(", "),
        values
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql() {
        let columns = vec!["`id`".to_string(), "`email`".to_string()];
        assert_eq!(
            insert_sql("`rc`.`users`", &columns, 2),
            "INSERT INTO `rc`.`users` (`id`, `email`) VALUES (?, ?), (?, ?)"
        );
        assert_eq!(insert_sql("`t`", &[], 1), "INSERT INTO `t` () VALUES ()");
    }

    #[test]
    fn test_rows_per_statement_respects_placeholder_limit() {
        assert_eq!(rows_per_statement(1), MAX_PLACEHOLDERS);
        assert_eq!(rows_per_statement(10), 6_553);
        assert!(rows_per_statement(10) * 10 <= MAX_PLACEHOLDERS);
        assert_eq!(rows_per_statement(0), MAX_PLACEHOLDERS);
        assert_eq!(rows_per_statement(100_000), 1);
    }
}

//! Utilities shared by the database drivers.
//!
//! - [`tls`]: TLS setup for PostgreSQL connections
//! - [`field_groups`]: splitting rows into runs that share a field list

pub mod tls;

pub use tls::{make_connector, SslMode};

use crate::core::Row;

/// Split rows into consecutive runs with the same ordered field names.
///
/// Multi-row inserts need one column list per statement; rows reaching one
/// table from several source tables may carry different fields.
pub fn field_groups(rows: &[Row]) -> Vec<(Vec<&str>, &[Row])> {
    let mut groups: Vec<(Vec<&str>, &[Row])> = Vec::new();
    let mut start = 0;

    for i in 1..=rows.len() {
        let boundary = i == rows.len()
            || !rows[i].field_names().eq(rows[start].field_names());
        if boundary {
            let fields = rows[start].field_names().collect();
            groups.push((fields, &rows[start..i]));
            start = i;
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_groups() {
        let rows = vec![
            Row::new().with("id", 1i64).with("a", 1i64),
            Row::new().with("id", 2i64).with("a", 2i64),
            Row::new().with("id", 3i64),
            Row::new().with("id", 4i64).with("a", 4i64),
        ];
        let groups = field_groups(&rows);
        let shape: Vec<(Vec<&str>, usize)> =
            groups.iter().map(|(f, r)| (f.clone(), r.len())).collect();
        assert_eq!(
            shape,
            vec![
                (vec!["id", "a"], 2),
                (vec!["id"], 1),
                (vec!["id", "a"], 1)
            ]
        );
        assert!(field_groups(&[]).is_empty());
    }
}

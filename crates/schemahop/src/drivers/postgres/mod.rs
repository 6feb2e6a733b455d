//! PostgreSQL driver.
//!
//! One `tokio-postgres` client per run. The catalog is reflected from
//! `information_schema` in `current_schema()` when the connection opens.
//! Inserts use `COPY ... FROM STDIN` in text format inside an explicit
//! transaction; before commit, serial and identity sequences of written
//! tables are moved past the copied keys.

mod copy;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::SinkExt;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info, warn};

use crate::core::{Column, DestinationSession, Row, SchemaCatalog, SqlValue, TableDescriptor};
use crate::dialect::{redact_url, Dialect};
use crate::drivers::common::{field_groups, make_connector, SslMode};
use crate::error::{MigrateError, Result};

/// Types decoded natively; everything else is selected as `::text`.
const NATIVE_TYPES: &[&str] = &[
    "bool", "int2", "int4", "int8", "float4", "float8", "text", "varchar", "bpchar", "name",
    "bytea", "timestamp", "timestamptz",
];

/// An open PostgreSQL connection.
pub struct PostgresConnection {
    client: Client,
    endpoint: String,
    schema: String,
    catalog: Vec<TableDescriptor>,
    in_transaction: bool,
    written: Vec<TableDescriptor>,
}

impl PostgresConnection {
    /// Connect to a `postgres://` or `postgresql://` URI.
    ///
    /// `sslmode` in the query string selects TLS (see [`SslMode`]).
    pub async fn connect(url: &str) -> Result<Self> {
        let endpoint = redact_url(url);
        let (url, ssl_mode) = SslMode::split_from_url(url)?;
        let mut config: tokio_postgres::Config = url.parse().map_err(|e| {
            MigrateError::Config(format!("Invalid PostgreSQL URI '{}': {}", endpoint, e))
        })?;
        config.ssl_mode(ssl_mode.to_postgres());

        let client = match make_connector(ssl_mode)? {
            Some(tls) => {
                let (client, connection) = config
                    .connect(tls)
                    .await
                    .map_err(|e| MigrateError::connectivity(&endpoint, e))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("PostgreSQL connection error: {}", e);
                    }
                });
                client
            }
            None => {
                warn!(
                    "PostgreSQL TLS is disabled for {}. Credentials will be transmitted in plaintext.",
                    endpoint
                );
                let (client, connection) = config
                    .connect(NoTls)
                    .await
                    .map_err(|e| MigrateError::connectivity(&endpoint, e))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("PostgreSQL connection error: {}", e);
                    }
                });
                client
            }
        };

        client
            .batch_execute("SET TIME ZONE 'UTC'")
            .await
            .map_err(|e| MigrateError::connectivity(&endpoint, e))?;

        let schema: Option<String> = client
            .query_one("SELECT current_schema()::text", &[])
            .await
            .map_err(|e| MigrateError::database("reading current schema", e))?
            .get(0);
        let schema = schema.ok_or_else(|| {
            MigrateError::Config(format!(
                "No current schema for {}; check the search_path",
                endpoint
            ))
        })?;

        let catalog = reflect(&client, &schema).await?;
        info!(
            "Connected to PostgreSQL {} (schema {}, {} tables)",
            endpoint,
            schema,
            catalog.len()
        );

        Ok(Self {
            client,
            endpoint,
            schema,
            catalog,
            in_transaction: false,
            written: Vec::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    async fn copy_in(&self, table: &TableDescriptor, fields: &[&str], rows: &[Row]) -> Result<u64> {
        let columns = fields
            .iter()
            .map(|f| Dialect::Postgres.quote_ident(f))
            .collect::<Result<Vec<_>>>()?;
        let sql = format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT text)",
            Dialect::Postgres.qualify(&table.schema, &table.name)?,
            columns.join(", ")
        );
        let context = format!("copying into {}", table.full_name());

        let mut buf = BytesMut::with_capacity(rows.len() * 128);
        copy::encode_rows(&mut buf, fields, rows);
        let data: Bytes = buf.freeze();

        let sink = self
            .client
            .copy_in(&sql)
            .await
            .map_err(|e| MigrateError::database(&context, e))?;
        tokio::pin!(sink);
        sink.send(data)
            .await
            .map_err(|e| MigrateError::database(&context, e))?;
        sink.finish()
            .await
            .map_err(|e| MigrateError::database(&context, e))
    }

    /// Move serial/identity sequences of a table past its largest key.
    ///
    /// Owned sequences are found with `pg_get_serial_sequence`; sequences
    /// only referenced by a `nextval(...)` default are taken from the default.
    async fn reset_sequences(&self, table: &TableDescriptor) -> Result<()> {
        let context = format!("resetting sequences of {}", table.full_name());
        let rows = self
            .client
            .query(
                "SELECT column_name::text, column_default::text FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 \
                   AND (column_default LIKE 'nextval(%' OR is_identity = 'YES')",
                &[&table.schema, &table.name],
            )
            .await
            .map_err(|e| MigrateError::database(&context, e))?;

        let qualified = Dialect::Postgres.qualify(&table.schema, &table.name)?;
        for row in rows {
            let column: String = row.get(0);
            let default: Option<String> = row.get(1);
            let fallback = default.as_deref().and_then(sequence_from_default);
            let sql = setval_sql(&qualified, &Dialect::Postgres.quote_ident(&column)?);
            let reset = self
                .client
                .query_one(sql.as_str(), &[&qualified, &column, &fallback])
                .await
                .map_err(|e| MigrateError::database(&context, e))?;
            let value: Option<i64> = reset.get(0);
            match value {
                Some(_) => debug!("Reset sequence of {}.{}", table.full_name(), column),
                None => warn!(
                    "No sequence found for {}.{}, not reset",
                    table.full_name(),
                    column
                ),
            }
        }
        Ok(())
    }
}

/// `setval` over the column's sequence. `$1`/`$2` are the qualified table and
/// the column for `pg_get_serial_sequence`, `$3` the sequence named by the
/// column default. `setval` is strict, so no sequence yields NULL.
fn setval_sql(qualified_table: &str, quoted_column: &str) -> String {
    format!(
        "SELECT setval(COALESCE(pg_get_serial_sequence($1, $2), $3::text)::regclass, \
         COALESCE(MAX({col}), 1), MAX({col}) IS NOT NULL) FROM {table}",
        col = quoted_column,
        table = qualified_table
    )
}

/// Sequence name in a `nextval('...')` column default, as regclass input.
fn sequence_from_default(default: &str) -> Option<String> {
    let start = default.find("nextval(")? + "nextval(".len();
    let rest = default[start..].trim_start_matches(|c: char| c == '(' || c.is_whitespace());
    let mut chars = rest.strip_prefix('\'')?.chars().peekable();

    let mut name = String::new();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
            } else {
                return (!name.is_empty()).then_some(name);
            }
        }
        name.push(c);
    }
    None
}

/// Reflect base tables and their ordered columns.
async fn reflect(client: &Client, schema: &str) -> Result<Vec<TableDescriptor>> {
    let rows = client
        .query(
            "SELECT c.table_name::text, c.column_name::text, c.udt_name::text \
             FROM information_schema.columns c \
             JOIN information_schema.tables t \
               ON t.table_schema = c.table_schema AND t.table_name = c.table_name \
             WHERE c.table_schema = $1 AND t.table_type = 'BASE TABLE' \
             ORDER BY c.table_name, c.ordinal_position",
            &[&schema],
        )
        .await
        .map_err(|e| MigrateError::database("reflecting PostgreSQL catalog", e))?;

    let mut tables: Vec<TableDescriptor> = Vec::new();
    for row in rows {
        let table: String = row.get(0);
        let column = Column::new(row.get::<_, String>(1), row.get::<_, String>(2));
        match tables.last_mut() {
            Some(last) if last.name == table => last.columns.push(column),
            _ => tables.push(TableDescriptor::new(schema, table, vec![column])),
        }
    }
    Ok(tables)
}

fn select_expression(column: &Column) -> Result<String> {
    let quoted = Dialect::Postgres.quote_ident(&column.name)?;
    if NATIVE_TYPES.contains(&column.data_type.as_str()) {
        Ok(quoted)
    } else {
        Ok(format!("{}::text", quoted))
    }
}

fn decode(row: &tokio_postgres::Row, idx: usize, column: &Column) -> std::result::Result<SqlValue, tokio_postgres::Error> {
    let value = match column.data_type.as_str() {
        "bool" => row.try_get::<_, Option<bool>>(idx)?.into(),
        "int2" => row.try_get::<_, Option<i16>>(idx)?.into(),
        "int4" => row.try_get::<_, Option<i32>>(idx)?.into(),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.into(),
        "float4" => row.try_get::<_, Option<f32>>(idx)?.into(),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.into(),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.into(),
        "timestamp" => row.try_get::<_, Option<chrono::NaiveDateTime>>(idx)?.into(),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)?
            .map(|ts| ts.naive_utc())
            .into(),
        _ => row.try_get::<_, Option<String>>(idx)?.into(),
    };
    Ok(value)
}

#[async_trait]
impl SchemaCatalog for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn tables(&self) -> Result<Vec<TableDescriptor>> {
        Ok(self.catalog.clone())
    }

    async fn select_all(&self, table: &TableDescriptor) -> Result<Vec<Row>> {
        if table.columns.is_empty() {
            return Ok(Vec::new());
        }
        let context = format!("reading {}", table.full_name());

        let select = table
            .columns
            .iter()
            .map(select_expression)
            .collect::<Result<Vec<_>>>()?;
        let sql = format!(
            "SELECT {} FROM {}",
            select.join(", "),
            Dialect::Postgres.qualify(&table.schema, &table.name)?
        );

        let pg_rows = self
            .client
            .query(sql.as_str(), &[])
            .await
            .map_err(|e| MigrateError::database(&context, e))?;

        let mut rows = Vec::with_capacity(pg_rows.len());
        for pg_row in &pg_rows {
            let mut row = Row::with_capacity(table.columns.len());
            for (idx, column) in table.columns.iter().enumerate() {
                let value = decode(pg_row, idx, column).map_err(|e| {
                    MigrateError::database(format!("{} (column {})", context, column.name), e)
                })?;
                row.insert(column.name.as_str(), value);
            }
            rows.push(row);
        }
        debug!("Read {} rows from {}", rows.len(), table.full_name());
        Ok(rows)
    }
}

#[async_trait]
impl DestinationSession for PostgresConnection {
    async fn begin(&mut self) -> Result<()> {
        self.client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| MigrateError::database("beginning transaction", e))?;
        self.in_transaction = true;
        self.written.clear();
        Ok(())
    }

    async fn insert(&mut self, table: &TableDescriptor, rows: &[Row]) -> Result<u64> {
        if !self.in_transaction {
            return Err(MigrateError::database(
                format!("inserting into {}", table.full_name()),
                "no open transaction",
            ));
        }

        let mut written = 0;
        for (fields, group) in field_groups(rows) {
            written += self.copy_in(table, &fields, group).await?;
        }

        if !self.written.iter().any(|t| t.name == table.name) {
            self.written.push(table.clone());
        }
        Ok(written)
    }

    async fn commit(&mut self) -> Result<()> {
        for table in &self.written {
            self.reset_sequences(table).await?;
        }
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| MigrateError::database("committing", e))?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.in_transaction = false;
        self.written.clear();
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| MigrateError::database("rolling back", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_expression_casts_non_native_types() {
        assert_eq!(
            select_expression(&Column::new("id", "int4")).unwrap(),
            "\"id\""
        );
        assert_eq!(
            select_expression(&Column::new("price", "numeric")).unwrap(),
            "\"price\"::text"
        );
        assert_eq!(
            select_expression(&Column::new("data", "jsonb")).unwrap(),
            "\"data\"::text"
        );
    }

    #[test]
    fn test_sequence_from_default() {
        assert_eq!(
            sequence_from_default("nextval('users_seq'::text)").as_deref(),
            Some("users_seq")
        );
        assert_eq!(
            sequence_from_default("nextval(('users_seq'::text)::regclass)").as_deref(),
            Some("users_seq")
        );
        assert_eq!(
            sequence_from_default("nextval('\"public\".\"Users_seq\"'::regclass)").as_deref(),
            Some("\"public\".\"Users_seq\"")
        );
        assert_eq!(
            sequence_from_default("nextval('o''brien_seq'::regclass)").as_deref(),
            Some("o'brien_seq")
        );
        assert_eq!(sequence_from_default("0"), None);
        assert_eq!(sequence_from_default("nextval('"), None);
        assert_eq!(sequence_from_default("nextval(''::regclass)"), None);
    }

    #[test]
    fn test_setval_sql_falls_back_to_default_sequence() {
        let sql = setval_sql("\"public\".\"users\"", "\"user_id\"");
        assert!(sql.starts_with(
            "SELECT setval(COALESCE(pg_get_serial_sequence($1, $2), $3::text)::regclass, "
        ));
        assert!(sql.contains("COALESCE(MAX(\"user_id\"), 1), MAX(\"user_id\") IS NOT NULL"));
        assert!(sql.ends_with("FROM \"public\".\"users\""));
    }
}

//! Database drivers.
//!
//! - [`postgres`]: PostgreSQL via `tokio-postgres`
//! - [`mysql`]: MySQL/MariaDB via `sqlx`
//! - [`memory`]: in-process database for tests
//! - [`common`]: TLS setup and insert helpers shared by the SQL drivers
//!
//! [`Connection`] dispatches the catalog and session traits to the driver
//! behind it with a plain `match`, so callers work with one concrete type.

pub mod common;
pub mod memory;
pub mod mysql;
pub mod postgres;

use async_trait::async_trait;
use tracing::debug;

use crate::core::{DestinationSession, Row, SchemaCatalog, TableDescriptor};
use crate::dialect::{redact_url, Dialect};
use crate::error::Result;

pub use memory::MemoryDatabase;
pub use mysql::MysqlConnection;
pub use postgres::PostgresConnection;

/// An open connection to any supported database.
pub enum Connection {
    Postgres(PostgresConnection),
    Mysql(MysqlConnection),
    Memory(MemoryDatabase),
}

impl Connection {
    /// Short description for logs, with any password redacted.
    pub fn endpoint(&self) -> String {
        match self {
            Connection::Postgres(c) => c.endpoint().to_string(),
            Connection::Mysql(c) => c.endpoint().to_string(),
            Connection::Memory(db) => format!("memory ({})", db.dialect()),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Connection").field(&self.endpoint()).finish()
    }
}

impl From<MemoryDatabase> for Connection {
    fn from(db: MemoryDatabase) -> Self {
        Connection::Memory(db)
    }
}

impl From<PostgresConnection> for Connection {
    fn from(c: PostgresConnection) -> Self {
        Connection::Postgres(c)
    }
}

impl From<MysqlConnection> for Connection {
    fn from(c: MysqlConnection) -> Self {
        Connection::Mysql(c)
    }
}

/// Open a connection for a URI, picking the driver from its scheme.
pub async fn connect(url: &str) -> Result<Connection> {
    let dialect = Dialect::from_url(url)?;
    debug!("Connecting to {} ({})", redact_url(url), dialect);
    match dialect {
        Dialect::Postgres => Ok(Connection::Postgres(PostgresConnection::connect(url).await?)),
        Dialect::Mysql => Ok(Connection::Mysql(MysqlConnection::connect(url).await?)),
    }
}

#[async_trait]
impl SchemaCatalog for Connection {
    fn dialect(&self) -> Dialect {
        match self {
            Connection::Postgres(c) => c.dialect(),
            Connection::Mysql(c) => c.dialect(),
            Connection::Memory(db) => db.dialect(),
        }
    }

    async fn tables(&self) -> Result<Vec<TableDescriptor>> {
        match self {
            Connection::Postgres(c) => c.tables().await,
            Connection::Mysql(c) => c.tables().await,
            Connection::Memory(db) => db.tables().await,
        }
    }

    async fn select_all(&self, table: &TableDescriptor) -> Result<Vec<Row>> {
        match self {
            Connection::Postgres(c) => c.select_all(table).await,
            Connection::Mysql(c) => c.select_all(table).await,
            Connection::Memory(db) => db.select_all(table).await,
        }
    }
}

#[async_trait]
impl DestinationSession for Connection {
    async fn begin(&mut self) -> Result<()> {
        match self {
            Connection::Postgres(c) => c.begin().await,
            Connection::Mysql(c) => c.begin().await,
            Connection::Memory(db) => db.begin().await,
        }
    }

    async fn insert(&mut self, table: &TableDescriptor, rows: &[Row]) -> Result<u64> {
        match self {
            Connection::Postgres(c) => c.insert(table, rows).await,
            Connection::Mysql(c) => c.insert(table, rows).await,
            Connection::Memory(db) => db.insert(table, rows).await,
        }
    }

    async fn commit(&mut self) -> Result<()> {
        match self {
            Connection::Postgres(c) => c.commit().await,
            Connection::Mysql(c) => c.commit().await,
            Connection::Memory(db) => db.commit().await,
        }
    }

    async fn rollback(&mut self) -> Result<()> {
        match self {
            Connection::Postgres(c) => c.rollback().await,
            Connection::Mysql(c) => c.rollback().await,
            Connection::Memory(db) => db.rollback().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let err = connect("sqlite:///tmp/mail.db").await.unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_memory_connection_dispatch() {
        let db = MemoryDatabase::new(Dialect::Postgres);
        db.add_table("users", &["id"], Vec::new());

        let mut conn = Connection::from(db.clone());
        assert_eq!(conn.dialect(), Dialect::Postgres);
        assert_eq!(conn.endpoint(), "memory (postgres)");

        let table = conn.table("users").await.unwrap().unwrap();
        conn.begin().await.unwrap();
        conn.insert(&table, &[Row::new().with("id", 1i64)])
            .await
            .unwrap();
        conn.commit().await.unwrap();
        assert_eq!(db.rows("users").len(), 1);
    }
}

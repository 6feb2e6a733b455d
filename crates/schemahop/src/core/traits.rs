//! Core traits for database-agnostic data conversion.
//!
//! - [`SchemaCatalog`]: reflects tables and reads rows from a database
//! - [`DestinationSession`]: a catalog that can also write rows inside a
//!   single transaction
//!
//! The conversion engine is written against these traits only, so it runs
//! unchanged against PostgreSQL, MySQL and the in-memory test database.

use async_trait::async_trait;

use crate::dialect::Dialect;
use crate::error::Result;

use super::row::Row;
use super::schema::TableDescriptor;

/// Read-only view of a database's tables.
#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    /// Dialect of the underlying engine.
    fn dialect(&self) -> Dialect;

    /// Reflect the tables of the connected schema, each with its ordered
    /// columns.
    ///
    /// Table order is stable across calls and determines the order tables
    /// are converted and written in.
    async fn tables(&self) -> Result<Vec<TableDescriptor>>;

    /// Read every row of a table, fields in column order.
    async fn select_all(&self, table: &TableDescriptor) -> Result<Vec<Row>>;

    /// Find a reflected table by name.
    async fn table(&self, name: &str) -> Result<Option<TableDescriptor>> {
        Ok(self.tables().await?.into_iter().find(|t| t.name == name))
    }
}

/// A destination database: writes happen inside one transaction.
///
/// Calls follow `begin → insert* → commit | rollback`. Inserting outside a
/// transaction is an error.
#[async_trait]
pub trait DestinationSession: SchemaCatalog {
    /// Start the run's transaction.
    async fn begin(&mut self) -> Result<()>;

    /// Insert rows into a table, returning the number of rows written.
    ///
    /// Rows may carry different field sets; fields absent from a row are
    /// left to the column default.
    async fn insert(&mut self, table: &TableDescriptor, rows: &[Row]) -> Result<u64>;

    /// Commit the transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Discard everything written since [`begin`](Self::begin).
    async fn rollback(&mut self) -> Result<()>;
}

//! In-process database.
//!
//! Holds tables and rows in memory behind a shared lock, so clones of a
//! [`MemoryDatabase`] see the same data. Writes made inside a transaction are
//! kept aside and only become visible on commit. Used by tests and for
//! exercising definitions without a server.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::core::{Column, DestinationSession, Row, SchemaCatalog, TableDescriptor};
use crate::dialect::Dialect;
use crate::error::{MigrateError, Result};

const SCHEMA: &str = "main";

#[derive(Debug, Default)]
struct Store {
    tables: IndexMap<String, MemoryTable>,
    /// Rows inserted in the open transaction, per table.
    pending: Option<HashMap<String, Vec<Row>>>,
    failing: HashSet<String>,
    reads: HashMap<String, usize>,
    inserts: HashMap<String, usize>,
}

#[derive(Debug)]
struct MemoryTable {
    descriptor: TableDescriptor,
    rows: Vec<Row>,
}

/// A cloneable handle to an in-memory database.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    dialect: Dialect,
    store: Arc<Mutex<Store>>,
}

impl MemoryDatabase {
    /// Create an empty database that reports itself as `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            store: Arc::new(Mutex::new(Store::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create (or replace) a table with committed rows.
    pub fn add_table(&self, name: &str, columns: &[&str], rows: Vec<Row>) {
        let descriptor = TableDescriptor::new(
            SCHEMA,
            name,
            columns.iter().map(|c| Column::untyped(*c)).collect(),
        );
        self.lock()
            .tables
            .insert(name.to_string(), MemoryTable { descriptor, rows });
    }

    /// Committed rows of a table (empty when the table does not exist).
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Committed rows across all tables.
    pub fn total_rows(&self) -> usize {
        self.lock().tables.values().map(|t| t.rows.len()).sum()
    }

    /// Make every insert into `table` fail.
    pub fn fail_inserts_into(&self, table: &str) {
        self.lock().failing.insert(table.to_string());
    }

    /// Number of `select_all` calls made for a table.
    pub fn reads(&self, table: &str) -> usize {
        self.lock().reads.get(table).copied().unwrap_or(0)
    }

    /// Number of `insert` calls made for a table.
    pub fn inserts(&self, table: &str) -> usize {
        self.lock().inserts.get(table).copied().unwrap_or(0)
    }

    pub fn in_transaction(&self) -> bool {
        self.lock().pending.is_some()
    }
}

#[async_trait]
impl SchemaCatalog for MemoryDatabase {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn tables(&self) -> Result<Vec<TableDescriptor>> {
        Ok(self
            .lock()
            .tables
            .values()
            .map(|t| t.descriptor.clone())
            .collect())
    }

    async fn select_all(&self, table: &TableDescriptor) -> Result<Vec<Row>> {
        let mut store = self.lock();
        *store.reads.entry(table.name.clone()).or_default() += 1;
        store
            .tables
            .get(&table.name)
            .map(|t| t.rows.clone())
            .ok_or_else(|| {
                MigrateError::database(
                    format!("reading {}", table.full_name()),
                    "no such table",
                )
            })
    }
}

#[async_trait]
impl DestinationSession for MemoryDatabase {
    async fn begin(&mut self) -> Result<()> {
        let mut store = self.lock();
        if store.pending.is_some() {
            return Err(MigrateError::database(
                "beginning transaction",
                "a transaction is already open",
            ));
        }
        store.pending = Some(HashMap::new());
        Ok(())
    }

    async fn insert(&mut self, table: &TableDescriptor, rows: &[Row]) -> Result<u64> {
        let mut store = self.lock();
        let context = format!("inserting into {}", table.full_name());
        *store.inserts.entry(table.name.clone()).or_default() += 1;

        if store.failing.contains(&table.name) {
            return Err(MigrateError::database(context, "injected insert failure"));
        }

        let Some(target) = store.tables.get(&table.name) else {
            return Err(MigrateError::database(context, "no such table"));
        };
        for row in rows {
            if let Some(field) = row.field_names().find(|f| !target.descriptor.has_field(f)) {
                return Err(MigrateError::database(
                    context,
                    format!("column \"{}\" does not exist", field),
                ));
            }
        }

        let pending = store
            .pending
            .as_mut()
            .ok_or_else(|| MigrateError::database(&context, "no open transaction"))?;
        pending
            .entry(table.name.clone())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }

    async fn commit(&mut self) -> Result<()> {
        let mut store = self.lock();
        let pending = store
            .pending
            .take()
            .ok_or_else(|| MigrateError::database("committing", "no open transaction"))?;
        for (name, rows) in pending {
            if let Some(table) = store.tables.get_mut(&name) {
                table.rows.extend(rows);
            }
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.lock()
            .pending
            .take()
            .map(|_| ())
            .ok_or_else(|| MigrateError::database("rolling back", "no open transaction"))
    }
}

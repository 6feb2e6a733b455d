//! Migration orchestrator - ties a definition and two connections together.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::core::{DestinationSession, SchemaCatalog};
use crate::definition::Definition;
use crate::dialect::{Dialect, DialectPair};
use crate::drivers::{self, Connection, MemoryDatabase};
use crate::engine::{ConversionEngine, TableReport};
use crate::error::Result;
use crate::registry::DefinitionRegistry;

/// Where a migration reads from or writes to.
pub enum Endpoint {
    /// Connection URI, opened by the migrator.
    Uri(String),
    /// Connection opened by the caller.
    Connection(Connection),
}

impl From<&str> for Endpoint {
    fn from(uri: &str) -> Self {
        Endpoint::Uri(uri.to_string())
    }
}

impl From<String> for Endpoint {
    fn from(uri: String) -> Self {
        Endpoint::Uri(uri)
    }
}

impl From<Connection> for Endpoint {
    fn from(conn: Connection) -> Self {
        Endpoint::Connection(conn)
    }
}

impl From<MemoryDatabase> for Endpoint {
    fn from(db: MemoryDatabase) -> Self {
        Endpoint::Connection(Connection::Memory(db))
    }
}

impl Endpoint {
    async fn open(self) -> Result<Connection> {
        match self {
            Endpoint::Uri(uri) => drivers::connect(&uri).await,
            Endpoint::Connection(conn) => Ok(conn),
        }
    }
}

/// Which definition a migration uses.
pub enum DefinitionSelector {
    /// A definition picked by the caller.
    Resolved(Arc<Definition>),
    /// Looked up in the registry by name and application version.
    Lookup { name: String, version: String },
}

impl From<Arc<Definition>> for DefinitionSelector {
    fn from(definition: Arc<Definition>) -> Self {
        DefinitionSelector::Resolved(definition)
    }
}

impl From<Definition> for DefinitionSelector {
    fn from(definition: Definition) -> Self {
        DefinitionSelector::Resolved(Arc::new(definition))
    }
}

impl<N: Into<String>, V: Into<String>> From<(N, V)> for DefinitionSelector {
    fn from((name, version): (N, V)) -> Self {
        DefinitionSelector::Lookup {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Final state of the destination transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Committed,
    DryRun,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub source_dialect: Dialect,
    pub destination_dialect: Dialect,
    pub definition: String,
    pub constraint: String,
    pub tables: Vec<TableReport>,
    pub rows_read: usize,
    pub rows_written: u64,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs one definition from a source database into a destination database.
pub struct Migrator {
    definition: Arc<Definition>,
    source: Connection,
    destination: Connection,
    dry_run: bool,
}

impl Migrator {
    /// Resolve the definition, then open the source and destination.
    ///
    /// An unknown definition or version fails before any connection is made.
    pub async fn new(
        registry: &DefinitionRegistry,
        source: impl Into<Endpoint>,
        destination: impl Into<Endpoint>,
        definition: impl Into<DefinitionSelector>,
    ) -> Result<Self> {
        let definition = match definition.into() {
            DefinitionSelector::Resolved(definition) => definition,
            DefinitionSelector::Lookup { name, version } => registry.resolve(&name, &version)?,
        };
        info!(
            "Using definition '{}' ({})",
            definition.name(),
            definition.version_constraint()
        );

        let source = source.into().open().await?;
        info!("Source: {}", source.endpoint());
        let destination = destination.into().open().await?;
        info!("Destination: {}", destination.endpoint());

        Ok(Self {
            definition,
            source,
            destination,
            dry_run: false,
        })
    }

    /// Roll back instead of committing once everything is inserted.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub fn pair(&self) -> DialectPair {
        DialectPair::new(self.source.dialect(), self.destination.dialect())
    }

    /// Run the migration in a single destination transaction.
    pub async fn run(&mut self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let pair = self.pair();
        info!("Starting migration run {} ({})", run_id, pair);

        self.destination.begin().await?;

        let mut engine = ConversionEngine::new(&self.definition, pair);
        let report = match engine.run(&self.source, &mut self.destination).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Migration failed, rolling back: {}", e);
                if let Err(rollback) = self.destination.rollback().await {
                    error!("Rollback failed: {}", rollback);
                }
                return Err(e);
            }
        };

        let status = if self.dry_run {
            self.destination.rollback().await?;
            info!(
                "Dry run: {} rows would be written; rolled back",
                report.rows_written
            );
            RunStatus::DryRun
        } else {
            if let Err(e) = self.destination.commit().await {
                if let Err(rollback) = self.destination.rollback().await {
                    error!("Rollback after failed commit failed: {}", rollback);
                }
                return Err(e);
            }
            engine.mark_committed();
            info!("Committed {} rows", report.rows_written);
            RunStatus::Committed
        };

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        Ok(MigrationResult {
            run_id,
            status,
            started_at,
            completed_at,
            duration_seconds: duration,
            source_dialect: pair.source,
            destination_dialect: pair.destination,
            definition: self.definition.name().to_string(),
            constraint: self.definition.version_constraint().to_string(),
            rows_read: report.rows_read(),
            rows_written: report.rows_written,
            tables: report.tables,
        })
    }
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("definition", &self.definition.name())
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Convenience wrapper: resolve, connect and run in one call.
pub async fn migrate(
    registry: &DefinitionRegistry,
    source: impl Into<Endpoint>,
    destination: impl Into<Endpoint>,
    definition: impl Into<DefinitionSelector>,
) -> Result<MigrationResult> {
    Migrator::new(registry, source, destination, definition)
        .await?
        .run()
        .await
}

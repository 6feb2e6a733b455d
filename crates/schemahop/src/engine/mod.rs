//! Table and row conversion.
//!
//! The engine walks the source catalog table by table, converts every row
//! according to the definition's overrides for the run's dialect pair, stages
//! the converted rows per destination table and finally inserts them in the
//! order the destination tables were first reached. It never commits: the
//! caller owns the destination transaction.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::{DestinationSession, Row, SchemaCatalog, TableDescriptor};
use crate::definition::{
    Definition, FieldOverride, FieldRules, OverrideSet, RowConverter, TableConverter,
    TableOverride,
};
use crate::dialect::DialectPair;
use crate::error::{ConvertError, MigrateError, Result};

/// Progress of a conversion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    TableLoop,
    RowLoop,
    Staged,
    Committed,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::TableLoop => "table loop",
            RunPhase::RowLoop => "row loop",
            RunPhase::Staged => "staged",
            RunPhase::Committed => "committed",
            RunPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a source table was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableOutcome {
    /// Rows went through the row/field conversion path.
    Converted,
    /// Rows went through a definition-supplied table converter.
    Custom,
    /// The table was skipped; nothing was read.
    Skipped,
}

/// Per source table result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub source: String,
    pub destination: Option<String>,
    pub outcome: TableOutcome,
    pub rows_read: usize,
    pub rows_staged: usize,
}

/// Rows written to one destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationReport {
    pub table: String,
    pub rows_written: u64,
}

/// Result of [`ConversionEngine::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineReport {
    /// Source tables in processing order.
    pub tables: Vec<TableReport>,
    /// Destination tables in insert order.
    pub destinations: Vec<DestinationReport>,
    pub rows_written: u64,
}

impl EngineReport {
    pub fn table(&self, source: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.source == source)
    }

    pub fn rows_read(&self) -> usize {
        self.tables.iter().map(|t| t.rows_read).sum()
    }
}

struct Staged {
    descriptor: TableDescriptor,
    rows: Vec<Row>,
}

/// Converts the data of a source catalog into a destination session.
pub struct ConversionEngine<'a> {
    definition: &'a Definition,
    pair: DialectPair,
    overrides: Option<&'a OverrideSet>,
    phase: RunPhase,
}

impl<'a> ConversionEngine<'a> {
    pub fn new(definition: &'a Definition, pair: DialectPair) -> Self {
        let overrides = definition.overrides(pair);
        if overrides.is_none() {
            debug!(
                "Definition '{}' has no overrides for {}; copying as is",
                definition.name(),
                pair
            );
        }
        Self {
            definition,
            pair,
            overrides,
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Record that the caller committed the staged rows.
    pub fn mark_committed(&mut self) {
        if self.phase == RunPhase::Staged {
            self.phase = RunPhase::Committed;
        }
    }

    /// Convert every source table and insert the results.
    ///
    /// The destination must be inside a transaction. On error nothing is
    /// rolled back here; the phase is left at [`RunPhase::Failed`].
    pub async fn run<S, D>(&mut self, source: &S, destination: &mut D) -> Result<EngineReport>
    where
        S: SchemaCatalog + ?Sized,
        D: DestinationSession + ?Sized,
    {
        let result = self.run_inner(source, destination).await;
        if let Err(e) = &result {
            warn!("Conversion stopped during {}: {}", self.phase, e);
            self.phase = RunPhase::Failed;
        }
        result
    }

    async fn run_inner<S, D>(&mut self, source: &S, destination: &mut D) -> Result<EngineReport>
    where
        S: SchemaCatalog + ?Sized,
        D: DestinationSession + ?Sized,
    {
        self.phase = RunPhase::TableLoop;

        let tables = self.ordered(source.tables().await?);
        let catalog: HashMap<String, TableDescriptor> = destination
            .tables()
            .await?
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();

        info!(
            "Converting {} tables with definition '{}' ({})",
            tables.len(),
            self.definition.name(),
            self.pair
        );

        let mut report = EngineReport::default();
        let mut staging: IndexMap<String, Staged> = IndexMap::new();

        for table in &tables {
            self.phase = RunPhase::TableLoop;

            let dest_name = match self.table_override(&table.name) {
                Some(TableOverride::Skip) => {
                    info!("{}: skipped", table.name);
                    report.tables.push(TableReport {
                        source: table.name.clone(),
                        destination: None,
                        outcome: TableOutcome::Skipped,
                        rows_read: 0,
                        rows_staged: 0,
                    });
                    continue;
                }
                Some(TableOverride::Rename(to)) => {
                    debug!("{}: renamed to {}", table.name, to);
                    to.clone()
                }
                None => table.name.clone(),
            };

            let dest = catalog
                .get(&dest_name)
                .ok_or_else(|| MigrateError::UnknownTable {
                    table: dest_name.clone(),
                })?;

            let rows = source.select_all(table).await?;
            let rows_read = rows.len();

            self.phase = RunPhase::RowLoop;
            let (outcome, converted) = match self.table_converter(&table.name) {
                Some(convert) => {
                    debug!("{}: using table converter", table.name);
                    (
                        TableOutcome::Custom,
                        convert_table(convert, rows, table, dest)?,
                    )
                }
                None => (TableOutcome::Converted, self.convert_rows(table, &rows)?),
            };

            check_fields(table, dest, &converted)?;

            info!(
                "{} → {}: {} rows read, {} staged",
                table.name,
                dest_name,
                rows_read,
                converted.len()
            );
            report.tables.push(TableReport {
                source: table.name.clone(),
                destination: Some(dest_name.clone()),
                outcome,
                rows_read,
                rows_staged: converted.len(),
            });

            staging
                .entry(dest_name)
                .or_insert_with(|| Staged {
                    descriptor: dest.clone(),
                    rows: Vec::new(),
                })
                .rows
                .extend(converted);
        }

        self.phase = RunPhase::Staged;

        for (name, staged) in &staging {
            if staged.rows.is_empty() {
                debug!("{}: nothing to insert", name);
                continue;
            }
            let written = destination.insert(&staged.descriptor, &staged.rows).await?;
            info!("{}: inserted {} rows", name, written);
            report.rows_written += written;
            report.destinations.push(DestinationReport {
                table: name.clone(),
                rows_written: written,
            });
        }

        Ok(report)
    }

    /// Apply the definition's table order: listed tables first, in the listed
    /// order, then the rest in catalog order.
    fn ordered(&self, tables: Vec<TableDescriptor>) -> Vec<TableDescriptor> {
        let order = self.definition.table_order();
        if order.is_empty() {
            return tables;
        }

        let mut remaining: IndexMap<String, TableDescriptor> =
            tables.into_iter().map(|t| (t.name.clone(), t)).collect();
        let mut ordered = Vec::with_capacity(remaining.len());
        for name in order {
            match remaining.shift_remove(name) {
                Some(table) => ordered.push(table),
                None => debug!("Ordered table {} not in source catalog", name),
            }
        }
        ordered.extend(remaining.into_values());
        ordered
    }

    fn table_override(&self, table: &str) -> Option<&'a TableOverride> {
        self.overrides.and_then(|o| o.table_override(table))
    }

    fn table_converter(&self, table: &str) -> Option<&'a TableConverter> {
        self.overrides.and_then(|o| o.table_converter(table))
    }

    fn row_converter(&self, table: &str) -> Option<&'a RowConverter> {
        self.overrides.and_then(|o| o.row_converter(table))
    }

    fn field_rules(&self, table: &str) -> Option<&'a FieldRules> {
        self.overrides.and_then(|o| o.field_rules(table))
    }

    fn convert_rows(&self, table: &TableDescriptor, rows: &[Row]) -> Result<Vec<Row>> {
        if let Some(convert) = self.row_converter(&table.name) {
            debug!("{}: using row converter", table.name);
            let mut converted = Vec::with_capacity(rows.len());
            for (index, row) in rows.iter().enumerate() {
                if let Some(row) = convert(row).map_err(|e| located(table, None, index, e))? {
                    converted.push(row);
                }
            }
            return Ok(converted);
        }

        let rules = self.field_rules(&table.name);
        warn_on_collisions(table, rules);

        rows.iter()
            .enumerate()
            .map(|(index, row)| convert_fields(table, rules, row, index))
            .collect()
    }
}

fn located(table: &TableDescriptor, field: Option<&str>, row: usize, e: ConvertError) -> MigrateError {
    MigrateError::Conversion {
        table: table.name.clone(),
        field: field.map(str::to_string),
        row: Some(row),
        message: e.message().to_string(),
    }
}

fn convert_table(
    convert: &TableConverter,
    rows: Vec<Row>,
    table: &TableDescriptor,
    dest: &TableDescriptor,
) -> Result<Vec<Row>> {
    match convert(rows, dest) {
        Ok(Some(rows)) => Ok(rows),
        Ok(None) => {
            debug!("{}: table converter returned nothing", table.name);
            Ok(Vec::new())
        }
        Err(e) => Err(MigrateError::conversion(&table.name, e.message())),
    }
}

/// Field-by-field conversion of one row.
fn convert_fields(
    table: &TableDescriptor,
    rules: Option<&FieldRules>,
    row: &Row,
    index: usize,
) -> Result<Row> {
    let Some(rules) = rules else {
        return Ok(row.clone());
    };

    let mut converted = Row::with_capacity(row.len());
    for (field, value) in row.iter() {
        let dest_field = match rules.field_override(field) {
            Some(FieldOverride::Skip) => continue,
            Some(FieldOverride::Rename(to)) => to.as_str(),
            None => field,
        };
        let value = match rules.converter(field) {
            Some(convert) => convert(value).map_err(|e| located(table, Some(field), index, e))?,
            None => value.clone(),
        };
        converted.insert(dest_field, value);
    }
    Ok(converted)
}

/// Two source fields mapped onto one destination field: the later field in
/// row order wins. Reported once per table.
fn warn_on_collisions(table: &TableDescriptor, rules: Option<&FieldRules>) {
    let Some(rules) = rules else {
        return;
    };

    let mut seen: HashMap<&str, &str> = HashMap::new();
    let mut collisions = Vec::new();
    for field in table.fields() {
        let dest = match rules.field_override(field) {
            Some(FieldOverride::Skip) => continue,
            Some(FieldOverride::Rename(to)) => to.as_str(),
            None => field,
        };
        if let Some(previous) = seen.insert(dest, field) {
            collisions.push(format!("{}/{} → {}", previous, field, dest));
        }
    }

    if !collisions.is_empty() {
        warn!(
            "{}: fields collide after renaming ({}); the later field wins",
            table.name,
            collisions.join(", ")
        );
    }
}

/// Every staged field must exist in the destination table.
fn check_fields(table: &TableDescriptor, dest: &TableDescriptor, rows: &[Row]) -> Result<()> {
    for (index, row) in rows.iter().enumerate() {
        if row.is_empty() {
            return Err(MigrateError::Conversion {
                table: table.name.clone(),
                field: None,
                row: Some(index),
                message: format!("row has no fields left to insert into '{}'", dest.name),
            });
        }
        if let Some(field) = row.field_names().find(|f| !dest.has_field(f)) {
            return Err(MigrateError::Conversion {
                table: table.name.clone(),
                field: Some(field.to_string()),
                row: Some(index),
                message: format!(
                    "destination table '{}' has no field '{}'",
                    dest.name, field
                ),
            });
        }
    }
    Ok(())
}

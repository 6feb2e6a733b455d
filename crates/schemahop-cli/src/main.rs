//! schemahop CLI - versioned data migration between relational databases.

mod prompt;

use clap::{Parser, Subcommand};
use schemahop::{
    Config, DefinitionRegistry, MigrateError, MigrationResult, Migrator, RunStatus, TableOutcome,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemahop")]
#[command(about = "Versioned data migration between relational databases")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate data from a source database into a destination database
    Run {
        /// Source database URI (mysql://, mariadb://, postgres://)
        #[arg(long, env = "SCHEMAHOP_SOURCE", hide_env_values = true)]
        source: Option<String>,

        /// Destination database URI; the schema must already exist
        #[arg(long, env = "SCHEMAHOP_DESTINATION", hide_env_values = true)]
        destination: Option<String>,

        /// Name of the migration definition, e.g. roundcube
        #[arg(long, env = "SCHEMAHOP_DEFINITION")]
        definition: Option<String>,

        /// Application schema version of the source, e.g. 1.4.1
        #[arg(long, env = "SCHEMAHOP_DEFINITION_VERSION")]
        definition_version: Option<String>,

        /// Convert and insert, then roll back instead of committing
        #[arg(long)]
        dry_run: bool,
    },

    /// List registered migration definitions
    Definitions,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let registry = DefinitionRegistry::with_builtins()?;

    match cli.command {
        Commands::Definitions => list_definitions(&registry, cli.output_json)?,
        Commands::Run {
            source,
            destination,
            definition,
            definition_version,
            dry_run,
        } => {
            let mut config = match &cli.config {
                Some(path) => {
                    let config = Config::load(path)?;
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                None => Config::default(),
            };

            // Flags and environment variables win over the file.
            if source.is_some() {
                config.source.url = source;
            }
            if destination.is_some() {
                config.destination.url = destination;
            }
            if definition.is_some() {
                config.definition.name = definition;
            }
            if definition_version.is_some() {
                config.definition.version = definition_version;
            }
            if dry_run {
                config.migration.dry_run = true;
            }
            config.validate()?;

            if !config.missing().is_empty() && std::io::stdin().is_terminal() {
                prompt::fill_missing(&mut config, &registry)?;
            }
            let settings = config.settings()?;
            debug!("Run settings: {:?}", settings);

            let result = Migrator::new(
                &registry,
                settings.source.as_str(),
                settings.destination.as_str(),
                (settings.definition.as_str(), settings.version.as_str()),
            )
            .await?
            .with_dry_run(settings.dry_run)
            .run()
            .await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_summary(&result);
            }
        }
    }
    Ok(())
}

fn list_definitions(registry: &DefinitionRegistry, output_json: bool) -> Result<(), MigrateError> {
    if output_json {
        let entries: Vec<serde_json::Value> = registry
            .entries()
            .map(|entry| {
                serde_json::json!({
                    "name": entry.name,
                    "constraint": entry.constraint.to_string(),
                    "description": entry.definition.description(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("Registered definitions:");
    for entry in registry.entries() {
        println!(
            "  {:<16} {:<16} {}",
            entry.name,
            entry.constraint.to_string(),
            entry.definition.description().unwrap_or("")
        );
    }
    Ok(())
}

fn print_summary(result: &MigrationResult) {
    match result.status {
        RunStatus::Committed => println!("\nMigration completed!"),
        RunStatus::DryRun => println!("\nDry run completed (rolled back, nothing written)"),
    }

    let skipped = result
        .tables
        .iter()
        .filter(|t| t.outcome == TableOutcome::Skipped)
        .count();

    println!("  Run ID: {}", result.run_id);
    println!("  Definition: {} ({})", result.definition, result.constraint);
    println!(
        "  Dialects: {} → {}",
        result.source_dialect, result.destination_dialect
    );
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!(
        "  Tables: {} migrated, {} skipped",
        result.tables.len() - skipped,
        skipped
    );
    println!("  Rows read: {}", result.rows_read);
    println!("  Rows written: {}", result.rows_written);
}

/// Logs go to stderr so JSON results on stdout stay parseable. `RUST_LOG`
/// takes precedence over `--verbosity`.
fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

//! Error types for the migration library.

use std::fmt;

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing inputs, unsupported URI, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A schema version string could not be parsed.
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// A version constraint expression could not be parsed.
    #[error("Invalid version constraint '{constraint}': {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    /// No registered definition matches the requested name/version.
    #[error("No migration definition found for '{name}' version {version}")]
    DefinitionNotFound { name: String, version: String },

    /// A definition was built with duplicate or conflicting overrides.
    #[error("Invalid migration definition: {0}")]
    Definition(String),

    /// An override function failed while converting data.
    #[error("Conversion failed for {}: {message}", conversion_location(table, field.as_deref(), *row))]
    Conversion {
        table: String,
        field: Option<String>,
        row: Option<usize>,
        message: String,
    },

    /// A destination table referenced by the run is not present in the destination catalog.
    #[error("Destination table '{table}' does not exist")]
    UnknownTable { table: String },

    /// Source or destination could not be reached.
    #[error("Cannot connect to {endpoint}: {message}")]
    Connectivity { endpoint: String, message: String },

    /// Query, insert or transaction failure on an open connection.
    #[error("Database error while {context}: {message}")]
    Database { context: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn conversion_location(table: &str, field: Option<&str>, row: Option<usize>) -> String {
    let mut location = format!("table '{}'", table);
    if let Some(field) = field {
        location.push_str(&format!(", field '{}'", field));
    }
    if let Some(row) = row {
        location.push_str(&format!(", row {}", row));
    }
    location
}

impl MigrateError {
    /// Create a Conversion error scoped to a table.
    pub fn conversion(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Conversion {
            table: table.into(),
            field: None,
            row: None,
            message: message.into(),
        }
    }

    /// Create a Database error with context about where it occurred.
    pub fn database(context: impl Into<String>, message: impl fmt::Display) -> Self {
        MigrateError::Database {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a Connectivity error for an endpoint.
    pub fn connectivity(endpoint: impl Into<String>, message: impl fmt::Display) -> Self {
        MigrateError::Connectivity {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => 1,
            MigrateError::InvalidVersion { .. }
            | MigrateError::InvalidConstraint { .. }
            | MigrateError::Definition(_) => 2,
            MigrateError::DefinitionNotFound { .. } => 3,
            MigrateError::Connectivity { .. } => 4,
            MigrateError::Conversion { .. } | MigrateError::UnknownTable { .. } => 5,
            MigrateError::Database { .. } => 6,
            MigrateError::Io(_) => 7,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Failure reported by a definition's converter function.
///
/// Converters only know what went wrong; the engine attaches the table,
/// field and row the failure happened on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertError {
    message: String,
}

impl ConvertError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConvertError {}

impl From<String> for ConvertError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ConvertError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

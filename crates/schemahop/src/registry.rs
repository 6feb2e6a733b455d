//! Registry of migration definitions, keyed by application name.
//!
//! Each name holds an ordered list of `(constraint, definition)` entries.
//! Resolution walks the list in registration order and returns the first
//! entry whose constraint matches, so for overlapping ranges the earlier
//! registration wins.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::definition::Definition;
use crate::error::{MigrateError, Result};
use crate::version::{parse_version, VersionConstraint};

/// One registered definition.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub name: String,
    pub constraint: VersionConstraint,
    pub definition: Arc<Definition>,
}

/// Name/version → definition lookup.
///
/// The registry is filled once at startup and read afterwards; it holds no
/// interior mutability and can be shared across threads behind a reference.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    by_name: HashMap<String, Vec<RegistryEntry>>,
    /// Names in first-registration order, for listing.
    order: Vec<String>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in definitions.
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        crate::definitions::register_builtins(&mut registry)?;
        Ok(registry)
    }

    /// File `definition` under `name` for the versions matched by
    /// `constraint`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        constraint: &str,
        definition: Arc<Definition>,
    ) -> Result<()> {
        let constraint: VersionConstraint = constraint.parse()?;
        self.push(name.into(), constraint, definition);
        Ok(())
    }

    /// Register a definition under its own name and constraint.
    pub fn add(&mut self, definition: Definition) -> Result<()> {
        let name = definition.name().to_string();
        let constraint = definition.version_constraint().clone();
        self.push(name, constraint, Arc::new(definition));
        Ok(())
    }

    fn push(&mut self, name: String, constraint: VersionConstraint, definition: Arc<Definition>) {
        debug!(
            "Registering definition '{}' for versions {}",
            name, constraint
        );
        if !self.by_name.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.by_name
            .entry(name.clone())
            .or_default()
            .push(RegistryEntry {
                name,
                constraint,
                definition,
            });
    }

    /// Find the definition for an application at a schema version.
    pub fn resolve(&self, name: &str, version: &str) -> Result<Arc<Definition>> {
        let parsed = parse_version(version)?;

        let entry = self
            .by_name
            .get(name)
            .and_then(|entries| entries.iter().find(|e| e.constraint.matches(&parsed)))
            .ok_or_else(|| MigrateError::DefinitionNotFound {
                name: name.to_string(),
                version: version.to_string(),
            })?;

        debug!(
            "Resolved '{}' {} to definition constrained by {}",
            name, version, entry.constraint
        );
        Ok(Arc::clone(&entry.definition))
    }

    /// All entries: names in first-registration order, entries of a name in
    /// registration order.
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.order
            .iter()
            .filter_map(|name| self.by_name.get(name))
            .flatten()
    }

    /// Registered names in first-registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

use crate::definition::Definition;
use crate::error::Result;

/// Identity definition for simple applications without version constraints.
pub fn default_definition() -> Result<Definition> {
    Definition::builder("default", "*")
        .description("Copy every table and field unchanged")
        .build()
}

//! Interactive prompts for run inputs missing from flags and config.

use dialoguer::{Input, Select};
use schemahop::{parse_version, Config, DefinitionRegistry, Dialect, MigrateError};

/// Ask for every required input that is still unset.
pub fn fill_missing(config: &mut Config, registry: &DefinitionRegistry) -> Result<(), MigrateError> {
    if config.source.url.is_none() {
        config.source.url = Some(prompt_url("Source database URI")?);
    }
    if config.destination.url.is_none() {
        config.destination.url = Some(prompt_url("Destination database URI")?);
    }
    if config.definition.name.is_none() {
        config.definition.name = Some(prompt_definition(registry)?);
    }
    if config.definition.version.is_none() {
        config.definition.version = Some(prompt_version()?);
    }
    Ok(())
}

fn prompt_url(prompt: &str) -> Result<String, MigrateError> {
    Input::<String>::new()
        .with_prompt(prompt)
        .validate_with(|url: &String| -> Result<(), String> {
            Dialect::from_url(url).map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()
        .map_err(prompt_error)
}

fn prompt_definition(registry: &DefinitionRegistry) -> Result<String, MigrateError> {
    let mut names: Vec<&str> = registry.names().collect();
    if names.is_empty() {
        return Input::<String>::new()
            .with_prompt("Definition name")
            .interact_text()
            .map_err(prompt_error);
    }

    let selection = Select::new()
        .with_prompt("Definition")
        .items(&names)
        .default(0)
        .interact()
        .map_err(prompt_error)?;
    Ok(names.swap_remove(selection).to_string())
}

fn prompt_version() -> Result<String, MigrateError> {
    Input::<String>::new()
        .with_prompt("Application schema version of the source")
        .validate_with(|version: &String| -> Result<(), String> {
            parse_version(version).map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()
        .map_err(prompt_error)
}

fn prompt_error(e: dialoguer::Error) -> MigrateError {
    match e {
        dialoguer::Error::IO(e) => MigrateError::Io(e),
    }
}

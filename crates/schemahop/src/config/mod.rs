//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty file deserializes to null.
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Names of required inputs that are still unset.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.source.url.is_none() {
            missing.push("source");
        }
        if self.destination.url.is_none() {
            missing.push("destination");
        }
        if self.definition.name.is_none() {
            missing.push("definition");
        }
        if self.definition.version.is_none() {
            missing.push("definition version");
        }
        missing
    }

    /// Validate and return the inputs of a run; every required value must
    /// be set.
    pub fn settings(&self) -> Result<RunSettings> {
        self.validate()?;
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(MigrateError::Config(format!(
                "Missing required input: {}",
                missing.join(", ")
            )));
        }

        let required = |value: &Option<String>| value.clone().unwrap_or_default();
        Ok(RunSettings {
            source: required(&self.source.url),
            destination: required(&self.destination.url),
            definition: required(&self.definition.name),
            version: required(&self.definition.version),
            dry_run: self.migration.dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
source:      { url: "mysql://rc:pw@mail-db/roundcube" }
destination: { url: "postgres://rc:pw@pg/roundcube" }
definition:  { name: roundcube, version: "1.4.1" }
migration:   { dry_run: true }
"#;

    #[test]
    fn test_from_yaml_full() {
        let config = Config::from_yaml(FULL).unwrap();
        let settings = config.settings().unwrap();
        assert_eq!(settings.source, "mysql://rc:pw@mail-db/roundcube");
        assert_eq!(settings.destination, "postgres://rc:pw@pg/roundcube");
        assert_eq!(settings.definition, "roundcube");
        assert_eq!(settings.version, "1.4.1");
        assert!(settings.dry_run);
    }

    #[test]
    fn test_partial_config_reports_missing_inputs() {
        let config = Config::from_yaml("definition: { name: default }").unwrap();
        assert_eq!(
            config.missing(),
            vec!["source", "destination", "definition version"]
        );
        let err = config.settings().unwrap_err();
        assert!(err.to_string().contains("source, destination"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_empty_yaml() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = Config::from_yaml("target: { url: \"postgres://pg/rc\" }").unwrap_err();
        assert!(matches!(err, MigrateError::Yaml(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.definition.name.as_deref(), Some("roundcube"));
    }

    #[test]
    fn test_settings_debug_redacts_passwords() {
        let settings = Config::from_yaml(FULL).unwrap().settings().unwrap();
        let debug_output = format!("{:?}", settings);
        assert!(!debug_output.contains(":pw@"));
    }
}

//! Built-in migration definitions.
//!
//! | Name | Versions | Pairs |
//! |---|---|---|
//! | `roundcube` | `==1.4.1` | mysql → postgres |
//! | `default` | `*` | identity for every pair |

mod default;
mod roundcube;

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::registry::DefinitionRegistry;

pub use default::default_definition;
pub use roundcube::roundcube_definition;

/// Register the built-in definitions.
///
/// Application-specific definitions go first so a lookup that also matches
/// a catch-all entry under the same name still finds them.
pub fn register_builtins(registry: &mut DefinitionRegistry) -> Result<()> {
    for definition in [roundcube_definition()?, default_definition()?] {
        let name = definition.name().to_string();
        let constraint = definition.version_constraint().to_string();
        registry.register(name, &constraint, Arc::new(definition))?;
    }
    debug!("Registered built-in definitions");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_resolve() {
        let registry = DefinitionRegistry::with_builtins().unwrap();

        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["roundcube", "default"]);

        assert_eq!(registry.resolve("roundcube", "1.4.1").unwrap().name(), "roundcube");
        assert_eq!(registry.resolve("default", "0.1").unwrap().name(), "default");
        assert_eq!(registry.resolve("default", "12.3.4-beta").unwrap().name(), "default");
        assert!(registry.resolve("roundcube", "1.5.0").is_err());
    }
}

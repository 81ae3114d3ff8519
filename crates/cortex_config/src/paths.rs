//! Well-known configuration locations and the mapping from component names
//! to their configuration sections.

use crate::error::{ConfigError, ConfigResult};
use crate::source::{join_path, ConfigSource, ConfigSourceExt};

/// Deployment label of this installation.
pub const SETUP_PATH: &str = "/Cortex/Setup";

/// Setup label used when [`SETUP_PATH`] is not defined.
pub const DEFAULT_SETUP: &str = "Unknown";

/// Root directory of this installation's mutable state.
pub const INSTANCE_PATH: &str = "/LocalSite/InstancePath";

/// Section holding the directory service data.
pub const REGISTRY_SECTION: &str = "/Registry";

/// The setup label configured for this installation.
pub fn setup(source: &dyn ConfigSource) -> String {
    source
        .get_string(SETUP_PATH)
        .unwrap_or_else(|| DEFAULT_SETUP.to_string())
}

/// The instance of `system` selected by `setup`.
pub fn system_instance(source: &dyn ConfigSource, system: &str, setup: &str) -> Option<String> {
    source.get_string(&join_path(["Cortex", "Setups", setup, system]))
}

/// Split `<System>/<Name>` into its system and the rest of the name.
pub fn split_component_name(name: &str) -> ConfigResult<(&str, &str)> {
    match name.trim_matches('/').split_once('/') {
        Some((system, rest)) if !system.is_empty() && !rest.is_empty() => Ok((system, rest)),
        _ => Err(ConfigError::InvalidComponentName(name.to_string())),
    }
}

/// The configuration section of the executor called `name` (`<System>/<Name>`)
/// under the given setup: `/Systems/<System>/<instance>/Executors/<Name>`.
pub fn executor_section(source: &dyn ConfigSource, name: &str, setup: &str) -> ConfigResult<String> {
    component_section(source, name, setup, "Executors")
}

/// The configuration section of the service called `name`.
pub fn service_section(source: &dyn ConfigSource, name: &str, setup: &str) -> ConfigResult<String> {
    component_section(source, name, setup, "Services")
}

fn component_section(
    source: &dyn ConfigSource,
    name: &str,
    setup: &str,
    kind: &str,
) -> ConfigResult<String> {
    let (system, rest) = split_component_name(name)?;
    let instance =
        system_instance(source, system, setup).ok_or_else(|| ConfigError::NoSystemInstance {
            system: system.to_string(),
            setup: setup.to_string(),
        })?;
    Ok(join_path(["Systems", system, instance.as_str(), kind, rest]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigTree;
    use matches::assert_matches;

    fn tree() -> ConfigTree {
        ConfigTree::new()
            .with("/Cortex/Setup", "Production")
            .unwrap()
            .with("/Cortex/Setups/Production/WorkloadManagement", "Prod")
            .unwrap()
    }

    #[test]
    fn executor_section_uses_the_system_instance() {
        let tree = tree();
        let setup = setup(&tree);
        assert_eq!(
            executor_section(&tree, "WorkloadManagement/Optimizer", &setup).unwrap(),
            "/Systems/WorkloadManagement/Prod/Executors/Optimizer"
        );
        assert_eq!(
            service_section(&tree, "WorkloadManagement/JobManager", &setup).unwrap(),
            "/Systems/WorkloadManagement/Prod/Services/JobManager"
        );
    }

    #[test]
    fn unknown_system_instance_is_an_error() {
        assert_matches!(
            executor_section(&tree(), "Stager/Monitor", "Production"),
            Err(ConfigError::NoSystemInstance { system, .. }) if system == "Stager"
        );
    }

    #[test]
    fn names_need_a_system() {
        assert_matches!(
            executor_section(&tree(), "Optimizer", "Production"),
            Err(ConfigError::InvalidComponentName(_))
        );
        assert_matches!(
            split_component_name("/A/"),
            Err(ConfigError::InvalidComponentName(_))
        );
        assert_eq!(split_component_name("A/B/C").unwrap(), ("A", "B/C"));
    }

    #[test]
    fn setup_defaults_to_unknown() {
        assert_eq!(setup(&ConfigTree::new()), DEFAULT_SETUP);
    }
}

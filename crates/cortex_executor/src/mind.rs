//! The dispatcher ("mind") an executor type registers with.

use cortex_config::ConfigValue;
use std::collections::BTreeMap;

/// Name of the mind plus the extra arguments sent along when registering.
/// Only the transport looks inside.
#[derive(Clone, Debug, PartialEq)]
pub struct MindBinding {
    name: String,
    extra_args: BTreeMap<String, ConfigValue>,
}

impl MindBinding {
    /// Bind to the mind called `name`, e.g. `WorkloadManagement/OptimizationMind`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra_args: BTreeMap::new(),
        }
    }

    /// Add a registration argument
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.extra_args.insert(key.into(), value.into());
        self
    }

    /// Name of the mind
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extra registration arguments, sorted by name
    pub fn extra_args(&self) -> &BTreeMap<String, ConfigValue> {
        &self.extra_args
    }
}

//! A configuration store held in memory, usually loaded from a YAML file.
//!
//! ```rust
//! use cortex_config::{ConfigSourceExt, ConfigTree};
//!
//! let yaml = r#"---
//! Cortex:
//!   Setup: Production
//! Registry:
//!   Groups:
//!     admins:
//!       Properties: ServiceAdministrator, JobAdministrator
//! "#;
//!
//! let tree = ConfigTree::from_yaml(yaml).unwrap();
//! assert_eq!(tree.get_string("/Cortex/Setup").as_deref(), Some("Production"));
//! assert_eq!(
//!     tree.get_list("/Registry/Groups/admins/Properties"),
//!     vec!["ServiceAdministrator", "JobAdministrator"],
//! );
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::source::{path_segments, ConfigSource, ConfigValue};
use serde_yaml::Mapping;
use std::path::Path;

/// An immutable-once-shared tree of sections and options.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigTree {
    root: Mapping,
}

impl ConfigTree {
    /// An empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a tree from YAML text. The document root must be a mapping.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let value: ConfigValue = serde_yaml::from_str(yaml)?;
        match value {
            ConfigValue::Mapping(root) => Ok(Self { root }),
            ConfigValue::Null => Ok(Self::new()),
            _ => Err(ConfigError::RootNotAMapping),
        }
    }

    /// Read and parse a YAML file.
    pub fn load_yaml(path: &Path) -> ConfigResult<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => ConfigError::ConfigMissing(path.into()),
            _ => err.into(),
        })?;
        Self::from_yaml(&yaml)
    }

    /// Store `value` at `path`, creating any missing sections on the way.
    pub fn set(&mut self, path: &str, value: impl Into<ConfigValue>) -> ConfigResult<()> {
        let segments: Vec<&str> = path_segments(path).collect();
        let Some((last, parents)) = segments.split_last() else {
            return Err(ConfigError::NotASection(path.to_string()));
        };
        let mut node = &mut self.root;
        for (depth, seg) in parents.iter().enumerate() {
            let key = ConfigValue::String((*seg).to_string());
            let child = node
                .entry(key)
                .or_insert_with(|| ConfigValue::Mapping(Mapping::new()));
            node = match child {
                ConfigValue::Mapping(m) => m,
                _ => {
                    return Err(ConfigError::NotASection(format!(
                        "/{}",
                        segments[..=depth].join("/")
                    )))
                }
            };
        }
        node.insert(ConfigValue::String((*last).to_string()), value.into());
        Ok(())
    }

    /// Builder flavour of [`set`](Self::set)
    pub fn with(mut self, path: &str, value: impl Into<ConfigValue>) -> ConfigResult<Self> {
        self.set(path, value)?;
        Ok(self)
    }

    fn lookup(&self, path: &str) -> Option<&ConfigValue> {
        let mut segments = path_segments(path);
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for seg in segments {
            current = match current {
                ConfigValue::Mapping(m) => m.get(seg)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl ConfigSource for ConfigTree {
    fn get(&self, path: &str) -> Option<ConfigValue> {
        self.lookup(path).cloned()
    }

    fn sections(&self, path: &str) -> Vec<String> {
        let node = if path_segments(path).next().is_none() {
            Some(&self.root)
        } else {
            match self.lookup(path) {
                Some(ConfigValue::Mapping(m)) => Some(m),
                _ => None,
            }
        };
        node.map(|m| {
            m.iter()
                .filter(|(_, v)| v.is_mapping())
                .filter_map(|(k, _)| k.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
    }
}

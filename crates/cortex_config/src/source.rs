//! The read-only interface every configuration backend implements.

use crate::error::{ConfigError, ConfigResult};
use serde::de::DeserializeOwned;

/// A single configuration value. Options are YAML scalars or sequences,
/// sections are YAML mappings.
pub type ConfigValue = serde_yaml::Value;

/// Key/value lookups against a hierarchical configuration store.
///
/// Paths are `/` separated. A leading slash is optional and empty segments
/// are ignored, so `"/A//B"` and `"A/B"` name the same entry.
pub trait ConfigSource: Send + Sync {
    /// The value stored at `path`, if any.
    fn get(&self, path: &str) -> Option<ConfigValue>;

    /// Names of the sections directly below `path`.
    fn sections(&self, path: &str) -> Vec<String>;
}

/// Typed helpers built on top of [`ConfigSource`].
pub trait ConfigSourceExt: ConfigSource {
    /// Deserialize the value at `path` into `T`.
    fn get_as<T: DeserializeOwned>(&self, path: &str) -> ConfigResult<Option<T>> {
        match self.get(path) {
            None => Ok(None),
            Some(value) => convert_value(value)
                .map(Some)
                .map_err(|source| ConfigError::Conversion {
                    path: path.to_string(),
                    source,
                }),
        }
    }

    /// Like [`get_as`](Self::get_as) but falls back to `default` when the
    /// option is missing or has the wrong type.
    fn get_or<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        match self.get_as(path) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(err) => {
                tracing::warn!(%path, ?err, "ignoring malformed option");
                default
            }
        }
    }

    /// A scalar option rendered as a string.
    fn get_string(&self, path: &str) -> Option<String> {
        self.get(path).as_ref().and_then(scalar_to_string)
    }

    /// A list option. Accepts a YAML sequence, a comma separated string,
    /// or a single scalar. Missing options are an empty list.
    fn get_list(&self, path: &str) -> Vec<String> {
        self.get(path).map(|v| value_to_list(&v)).unwrap_or_default()
    }
}

impl<S: ConfigSource + ?Sized> ConfigSourceExt for S {}

/// Split a path into its non-empty segments.
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Join path fragments into an absolute configuration path.
pub fn join_path<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for part in parts {
        for seg in path_segments(part.as_ref()) {
            out.push('/');
            out.push_str(seg);
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Deserialize `value` into `T`, casting between scalars when the stored
/// type is not the one asked for: `"false"` and `"no"` read as booleans,
/// `"3"` as a number and `3` as a string.
pub fn convert_value<T: DeserializeOwned>(value: ConfigValue) -> Result<T, serde_yaml::Error> {
    let err = match serde_yaml::from_value(value.clone()) {
        Ok(converted) => return Ok(converted),
        Err(err) => err,
    };
    let recast = match &value {
        ConfigValue::String(s) => parse_scalar(s),
        ConfigValue::Number(_) | ConfigValue::Bool(_) => {
            scalar_to_string(&value).map(ConfigValue::String)
        }
        _ => None,
    };
    recast
        .and_then(|recast| serde_yaml::from_value(recast).ok())
        .ok_or(err)
}

fn parse_scalar(s: &str) -> Option<ConfigValue> {
    let s = s.trim();
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Some(ConfigValue::Bool(true)),
        "false" | "no" | "off" => Some(ConfigValue::Bool(false)),
        _ => match serde_yaml::from_str(s) {
            Ok(number @ ConfigValue::Number(_)) => Some(number),
            _ => None,
        },
    }
}

pub(crate) fn scalar_to_string(value: &ConfigValue) -> Option<String> {
    match value {
        ConfigValue::String(s) => Some(s.clone()),
        ConfigValue::Number(n) => Some(n.to_string()),
        ConfigValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn value_to_list(value: &ConfigValue) -> Vec<String> {
    match value {
        ConfigValue::Sequence(items) => items.iter().filter_map(scalar_to_string).collect(),
        ConfigValue::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        other => scalar_to_string(other).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(&["/A", "B/", "//C"] => "/A/B/C".to_string())]
    #[test_case(&["", "/"] => "/".to_string())]
    #[test_case(&["Systems", "Framework/Production"] => "/Systems/Framework/Production".to_string())]
    fn joins_paths(parts: &[&str]) -> String {
        join_path(parts.iter())
    }

    #[test_case("false" => Some(false))]
    #[test_case(" No " => Some(false) ; "padded no")]
    #[test_case("yes" => Some(true))]
    #[test_case("TRUE" => Some(true) ; "upper case true")]
    #[test_case("maybe" => None)]
    fn strings_cast_to_bool(s: &str) -> Option<bool> {
        convert_value(ConfigValue::String(s.into())).ok()
    }

    #[test]
    fn strings_cast_to_numbers_and_back() {
        assert_eq!(convert_value::<u32>(ConfigValue::String("3".into())).unwrap(), 3);
        assert_eq!(convert_value::<f64>(ConfigValue::String("2.5".into())).unwrap(), 2.5);
        assert!(convert_value::<u32>(ConfigValue::String("three".into())).is_err());
        assert!(convert_value::<u32>(ConfigValue::String("-3".into())).is_err());
        assert_eq!(convert_value::<String>(ConfigValue::from(3)).unwrap(), "3");
        assert_eq!(convert_value::<String>(ConfigValue::Bool(false)).unwrap(), "false");
        assert!(convert_value::<bool>(ConfigValue::from(1)).is_err());
    }

    #[test]
    fn comma_separated_lists_are_split_and_trimmed() {
        let value = ConfigValue::String(" a, b ,,c ".into());
        assert_eq!(value_to_list(&value), vec!["a", "b", "c"]);
    }

    #[test]
    fn scalar_list_is_a_single_item() {
        let value: ConfigValue = serde_yaml::from_str("42").unwrap();
        assert_eq!(value_to_list(&value), vec!["42"]);
    }
}

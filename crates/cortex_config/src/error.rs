use std::path::PathBuf;
use thiserror::Error;

/// Alias
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or reading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No configuration found at this path: {0}")]
    ConfigMissing(PathBuf),

    #[error("Config deserialization error: {0}")]
    SerializationError(#[from] serde_yaml::Error),

    #[error("Error while performing IO for the configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("The configuration root must be a mapping")]
    RootNotAMapping,

    #[error("Cannot descend into {0}: it is an option, not a section")]
    NotASection(String),

    #[error("Value at {path} has an unexpected type: {source}")]
    Conversion {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Component name {0:?} must have the form <System>/<Name>")]
    InvalidComponentName(String),

    #[error("Option /Cortex/Setups/{setup}/{system} is not defined")]
    NoSystemInstance { system: String, setup: String },
}

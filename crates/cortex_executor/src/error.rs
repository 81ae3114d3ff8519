use crate::processor::TaskId;
use cortex_config::ConfigError;
use derive_more::Display;
use std::path::PathBuf;
use thiserror::Error;

/// Which codec hook failed
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum CodecDirection {
    #[display(fmt = "serialize")]
    Serialize,
    #[display(fmt = "deserialize")]
    Deserialize,
}

/// A serialize or deserialize hook reported an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot {direction} task {task_id}: {message}")]
pub struct CodecError {
    pub task_id: TaskId,
    pub direction: CodecDirection,
    pub message: String,
}

/// Alias
pub type CodecResult<T> = Result<T, CodecError>;

/// The privileged credential could not be put in place.
#[derive(Error, Debug)]
pub enum ProxyInstallError {
    #[error("Cannot get proxy for {identity}: {message}")]
    Fetch { identity: String, message: String },

    #[error("Cannot write proxy for {identity} to {path:?}: {source}")]
    Io {
        identity: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Alias
pub type ProxyInstallResult<T> = Result<T, ProxyInstallError>;

/// Why a task left the pipeline early. All of these are recoverable: the
/// dispatcher decides whether to retry or report the task as failed.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Cannot set shifter proxy: {0}")]
    ProxyInstall(#[from] ProxyInstallError),

    #[error("Task {task_id} failed: {message}")]
    Failed { task_id: TaskId, message: String },
}

/// Alias
pub type TaskResult<T> = Result<T, TaskError>;

/// The executor could not be started.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Exception while initializing {name}: {message}")]
    Initialize { name: String, message: String },

    #[error("Property {0} is set by the framework and cannot be changed")]
    ReadOnlyProperty(String),

    #[error("Executor is already bound to mind {0}")]
    MindAlreadyBound(String),
}

/// Alias
pub type BootstrapResult<T> = Result<T, BootstrapError>;

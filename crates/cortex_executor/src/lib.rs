#![warn(missing_docs)]
//! The framework side of a cortex executor.
//!
//! An executor is a worker process that receives tasks from a dispatcher
//! (its "mind"), works on them and sends them back. A concrete executor
//! implements the [`Executor`] hooks; this crate does everything around
//! them:
//!
//! - [`ExecutorModule::bootstrap`] resolves the executor's configuration
//!   sections, registers the framework defaults and runs the `initialize`
//!   hook once. The configuration is read-only afterwards.
//! - [`ExecutorModule::process_task`] takes a task stub through
//!   deserialization, shifter proxy installation, processing and
//!   serialization, and returns the new stub together with the freeze
//!   time the hook asked for.
//!
//! Hook errors become typed errors ([`CodecError`], [`TaskError`],
//! [`BootstrapError`]). A hook that panics takes the calling task down
//! with it: a broken executor should be loud.

mod codec;
#[allow(missing_docs)]
mod error;
mod hooks;
pub mod lifecycle;
mod mind;
mod processor;
pub mod shifter;

pub use codec::TaskCodec;
pub use error::*;
pub use hooks::{Executor, HookResult};
pub use lifecycle::{
    BootstrapParams, ExecutorConfig, ExecutorModule, ExecutorProperties, ExecutorSetup,
};
pub use mind::MindBinding;
pub use processor::{ProcessedTask, TaskContext, TaskId, TaskStage, TaskStub};
pub use shifter::{FileProxyInstaller, ProxyInstaller, ProxySource};

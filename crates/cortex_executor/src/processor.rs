//! The path of a single task through an executor.
//!
//! ```text
//! Received -> Deserialized -> ProxyReady -> Processed -> Serialized -> Done
//!     \            \              \             \            \
//!      `------------`--------------`-------------`------------`--> Failed
//! ```

use crate::codec::TaskCodec;
use crate::error::{TaskError, TaskResult};
use crate::hooks::Executor;
use crate::lifecycle::{ExecutorConfig, ExecutorModule};
use crate::shifter::PROXY_ENV_VAR;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Identifies a task within one dispatcher. Not globally unique.
#[derive(
    Clone, Copy, Debug, Display, From, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TaskId(pub u64);

/// The opaque wire form of a task
#[derive(Clone, Debug, Default, From, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStub(#[serde(with = "serde_bytes")] Vec<u8>);

impl TaskStub {
    /// Constructor
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Unwrap into the raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for TaskStub {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Where a task is in the pipeline
#[allow(missing_docs)] // should be self-explanatory
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum TaskStage {
    Received,
    Deserialized,
    ProxyReady,
    Processed,
    Serialized,
    Done,
    Failed,
}

/// State belonging to one run of the pipeline. Never shared between tasks.
#[derive(Debug)]
pub struct TaskContext {
    task_id: TaskId,
    freeze: Duration,
    proxy_location: Option<PathBuf>,
    config: Arc<ExecutorConfig>,
}

impl TaskContext {
    fn new(task_id: TaskId, config: Arc<ExecutorConfig>) -> Self {
        Self {
            task_id,
            freeze: Duration::ZERO,
            proxy_location: None,
            config,
        }
    }

    /// The task being processed
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Ask the mind to hand the task out again after `duration` instead of
    /// treating it as finished. Processing goes on normally.
    pub fn freeze(&mut self, duration: Duration) {
        self.freeze = duration;
    }

    /// The freeze requested so far, zero if none
    pub fn frozen_for(&self) -> Duration {
        self.freeze
    }

    /// Whether a freeze was requested
    pub fn is_frozen(&self) -> bool {
        !self.freeze.is_zero()
    }

    /// Location of the installed shifter proxy, if the executor uses one
    pub fn proxy_location(&self) -> Option<&Path> {
        self.proxy_location.as_deref()
    }

    /// The environment a child process needs to run with the installed
    /// proxy. Empty when the executor uses its own credentials.
    ///
    /// ```no_run
    /// # fn launch(ctx: &cortex_executor::TaskContext) -> std::io::Result<()> {
    /// std::process::Command::new("glite-transfer")
    ///     .envs(ctx.proxy_env())
    ///     .status()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn proxy_env(&self) -> Option<(&'static str, &Path)> {
        self.proxy_location()
            .map(|location| (PROXY_ENV_VAR, location))
    }

    /// The executor's configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }
}

/// A task that went through the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessedTask {
    /// The task to send back to the mind
    pub stub: TaskStub,
    /// Zero when the task is finished, otherwise how long the mind should
    /// wait before handing it out again
    pub freeze: Duration,
}

impl ProcessedTask {
    /// Whether the mind should requeue the task
    pub fn should_requeue(&self) -> bool {
        !self.freeze.is_zero()
    }
}

impl<E: Executor> ExecutorModule<E> {
    /// Run one task through the executor.
    ///
    /// Safe to call concurrently: everything specific to the task lives in
    /// this call. A panic in a hook is not caught.
    pub async fn process_task(&self, task_id: TaskId, stub: TaskStub) -> TaskResult<ProcessedTask> {
        let span = tracing::debug_span!("task", %task_id);
        async move {
            let mut stage = TaskStage::Received;
            let result = self.run_pipeline(task_id, stub, &mut stage).await;
            match &result {
                Ok(done) => tracing::debug!(stage = %TaskStage::Done, freeze = ?done.freeze),
                Err(err) => {
                    tracing::error!(stage = %TaskStage::Failed, failed_at = %stage, %err)
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_pipeline(
        &self,
        task_id: TaskId,
        stub: TaskStub,
        stage: &mut TaskStage,
    ) -> TaskResult<ProcessedTask> {
        self.record_message();
        let mut ctx = TaskContext::new(task_id, self.config.clone());
        tracing::trace!(stage = %stage);

        let codec = TaskCodec::new(&self.executor);
        let mut task = codec.deserialize(task_id, &stub)?;
        *stage = TaskStage::Deserialized;
        tracing::trace!(stage = %stage);

        if let (Some(identity), Some(location)) = (
            self.config.shifter_proxy(),
            self.config.shifter_proxy_location(),
        ) {
            self.installer.install(identity, &location).await?;
            ctx.proxy_location = Some(location);
        }
        *stage = TaskStage::ProxyReady;
        tracing::trace!(stage = %stage);

        let replacement = self
            .executor
            .process_task(&mut ctx, &mut task)
            .await
            .map_err(|err| TaskError::Failed {
                task_id,
                message: format!("{err:#}"),
            })?;
        if let Some(replacement) = replacement {
            task = replacement;
        }
        *stage = TaskStage::Processed;
        tracing::trace!(stage = %stage, frozen = ctx.is_frozen());

        let stub = codec.serialize(task_id, &task)?;
        *stage = TaskStage::Serialized;
        tracing::trace!(stage = %stage);

        Ok(ProcessedTask {
            stub,
            freeze: ctx.frozen_for(),
        })
    }
}

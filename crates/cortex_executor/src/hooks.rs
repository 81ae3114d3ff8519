//! What a concrete executor type has to provide.

use crate::lifecycle::ExecutorSetup;
use crate::processor::{TaskContext, TaskStub};

/// Hooks report failures as errors. Any error type will do.
pub type HookResult<T> = anyhow::Result<T>;

/// An executor type.
///
/// The framework calls [`initialize`](Executor::initialize) once at start
/// up, then runs [`ExecutorModule::process_task`](crate::ExecutorModule::process_task)
/// for every task the mind hands over, possibly many at once. Hooks take
/// `&self` during processing: anything that belongs to a single task goes
/// through the [`TaskContext`] or the task itself.
///
/// A hook returning `Err` is an ordinary failure and ends up in a typed
/// error. A hook that panics is a broken executor; the panic is not caught.
#[async_trait::async_trait]
pub trait Executor: Send + Sync + 'static {
    /// The in-memory form of a task
    type Task: Send;

    /// Configure the executor: register option defaults, properties, the
    /// shifter proxy identity and the mind to connect to.
    async fn initialize(&mut self, setup: &mut ExecutorSetup) -> HookResult<()>;

    /// Turn a task into its wire form
    fn serialize_task(&self, task: &Self::Task) -> HookResult<TaskStub>;

    /// Rebuild a task from its wire form
    fn deserialize_task(&self, stub: &TaskStub) -> HookResult<Self::Task>;

    /// Do the work. Return `Some(task)` to replace the task that is sent
    /// back, `None` to send back `task` as it is now.
    ///
    /// Call [`TaskContext::freeze`] to have the mind requeue the task later.
    async fn process_task(
        &self,
        ctx: &mut TaskContext,
        task: &mut Self::Task,
    ) -> HookResult<Option<Self::Task>>;
}

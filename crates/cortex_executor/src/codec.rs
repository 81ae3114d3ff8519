use crate::error::{CodecDirection, CodecError, CodecResult};
use crate::hooks::Executor;
use crate::processor::{TaskId, TaskStub};

/// Runs the executor's serialize and deserialize hooks, turning their
/// errors into [`CodecError`]s that carry the task id.
pub struct TaskCodec<'e, E: Executor> {
    executor: &'e E,
}

impl<'e, E: Executor> TaskCodec<'e, E> {
    /// Constructor
    pub fn new(executor: &'e E) -> Self {
        Self { executor }
    }

    /// Wire form of `task`
    pub fn serialize(&self, task_id: TaskId, task: &E::Task) -> CodecResult<TaskStub> {
        self.executor
            .serialize_task(task)
            .map_err(|err| codec_error(task_id, CodecDirection::Serialize, err))
    }

    /// In-memory form of `stub`
    pub fn deserialize(&self, task_id: TaskId, stub: &TaskStub) -> CodecResult<E::Task> {
        self.executor
            .deserialize_task(stub)
            .map_err(|err| codec_error(task_id, CodecDirection::Deserialize, err))
    }
}

fn codec_error(task_id: TaskId, direction: CodecDirection, err: anyhow::Error) -> CodecError {
    tracing::error!(%task_id, %direction, ?err, "codec hook failed");
    CodecError {
        task_id,
        direction,
        message: format!("{err:#}"),
    }
}

use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::runner::TaskMessage;

pub type TaskId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Created,
    Running,
    Succeeded,
    Cancelled,
    Failed,
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Cancelled | TaskState::Failed
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Created => "created",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Cancelled => "cancelled",
            TaskState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A unit of work executed off the interactive thread.
pub trait DexTask: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// At most one instance of a singleton task type runs per [`TaskRunner`];
    /// starting another cancels the running one.
    ///
    /// [`TaskRunner`]: crate::TaskRunner
    const SINGLETON: bool = false;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn do_it(&mut self, input: Self::Input, ctx: &TaskContext) -> Result<Self::Output, Self::Error>;
}

/// Handed to a running task for reporting and cancellation checks.
pub struct TaskContext {
    id: TaskId,
    token: CancellationToken,
    tx: mpsc::Sender<TaskMessage>,
}

impl TaskContext {
    pub(crate) fn new(id: TaskId, token: CancellationToken, tx: mpsc::Sender<TaskMessage>) -> Self {
        Self { id, token, tx }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Report `done` of `total` units. Updates are dropped when the channel is full.
    pub fn update_progress(&self, done: u64, total: u64) {
        let fraction = if total == 0 {
            1.0
        } else {
            (done as f64 / total as f64).clamp(0.0, 1.0)
        };
        let _ = self.tx.try_send(TaskMessage::Progress {
            id: self.id,
            fraction,
        });
    }

    pub fn update_message(&self, message: impl Into<String>) {
        let _ = self.tx.try_send(TaskMessage::Message {
            id: self.id,
            text: message.into(),
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Failure recorded when a task body panics.
#[derive(Debug, thiserror::Error)]
#[error("task panicked: {0}")]
pub struct TaskPanicked(pub String);

//! Background work for the editor.
//!
//! A [`DexTask`] runs on its own detached thread. Progress, status messages and the
//! final result travel back over a bounded channel and are applied to bound
//! properties when the interactive thread calls [`TaskRunner::pump`]. Failures are
//! turned into a readable diagnostic instead of escaping the worker.

pub mod report;
pub mod runner;
pub mod status;
pub mod task;
pub mod wait;

pub use report::describe_failure;
pub use runner::{TaskBuilder, TaskHandle, TaskOutcome, TaskRunner, TaskRunnerError};
pub use status::{QueueTracker, RunningTask, StatusController};
pub use task::{DexTask, TaskContext, TaskId, TaskPanicked, TaskState};
pub use wait::WaitIndicator;

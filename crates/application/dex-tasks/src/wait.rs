use crate::TaskId;

/// Modal "please wait" feedback shown while a task started from the interactive
/// thread is running.
pub trait WaitIndicator: Send + Sync {
    fn show(&self, task: TaskId, name: &str);
    fn close(&self, task: TaskId);
}

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dex_core::Property;

use crate::TaskId;

/// Receives task start/finish notifications for "N tasks running" feedback.
pub trait StatusController: Send + Sync {
    fn start(&self, task: TaskId, name: &str);
    fn finish(&self, task: TaskId);
    fn queue_size(&self) -> usize;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningTask {
    pub id: TaskId,
    pub name: String,
    pub started_at: DateTime<Utc>,
}

/// Status controller that tracks running tasks and exposes their count as a
/// bindable property.
pub struct QueueTracker {
    running: Mutex<Vec<RunningTask>>,
    size: Property<usize>,
}

impl Default for QueueTracker {
    fn default() -> Self {
        Self {
            running: Mutex::new(Vec::new()),
            size: Property::new(0),
        }
    }
}

impl QueueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size_property(&self) -> Property<usize> {
        self.size.clone()
    }

    pub fn running(&self) -> Vec<RunningTask> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut Vec<RunningTask>)) {
        let size = {
            let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut running);
            running.len()
        };
        self.size.set(size);
    }
}

impl StatusController for QueueTracker {
    fn start(&self, task: TaskId, name: &str) {
        self.update(|running| {
            running.push(RunningTask {
                id: task,
                name: name.to_string(),
                started_at: Utc::now(),
            })
        });
    }

    fn finish(&self, task: TaskId) {
        self.update(|running| running.retain(|t| t.id != task));
    }

    fn queue_size(&self) -> usize {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

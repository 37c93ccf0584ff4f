use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dex_config::{STATUS_CANCELLED, STATUS_DONE, STATUS_FAILED};
use dex_core::Property;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::report::{describe_failure, short_name};
use crate::{DexTask, StatusController, TaskContext, TaskId, TaskPanicked, TaskState, WaitIndicator};

#[derive(Debug, thiserror::Error)]
pub enum TaskRunnerError {
    #[error("failed to start worker thread for {task}: {source}")]
    Spawn {
        task: String,
        #[source]
        source: std::io::Error,
    },
}

/// What a result handler receives once a task is finalized.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    /// `None` when the task was started without input and its body was skipped.
    Succeeded(Option<T>),
    Cancelled,
    /// Carries the failure diagnostic.
    Failed(String),
}

type SharedError = Arc<dyn Error + Send + Sync>;

pub(crate) enum TaskMessage {
    Progress { id: TaskId, fraction: f64 },
    Message { id: TaskId, text: String },
    Finished { id: TaskId, result: RawResult },
}

pub(crate) enum RawResult {
    Succeeded(Box<dyn Any + Send>),
    Cancelled,
    Failed { diagnostic: String, error: SharedError },
}

type CompletionFn = Box<dyn FnOnce(RawResult) + Send>;

struct HandleState {
    state: TaskState,
    error_msg: Option<String>,
    error: Option<SharedError>,
}

struct HandleShared {
    id: TaskId,
    name: &'static str,
    started_at: DateTime<Utc>,
    token: CancellationToken,
    state: Mutex<HandleState>,
}

impl HandleShared {
    fn lock(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Caller-side view of a started task.
#[derive(Clone)]
pub struct TaskHandle {
    shared: Arc<HandleShared>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    pub fn name(&self) -> &'static str {
        short_name(self.shared.name)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.shared.started_at
    }

    pub fn state(&self) -> TaskState {
        self.shared.lock().state
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    /// Failure diagnostic, once the task has failed.
    pub fn error_msg(&self) -> Option<String> {
        self.shared.lock().error_msg.clone()
    }

    /// The error the task body returned, once the task has failed.
    pub fn error_exception(&self) -> Option<SharedError> {
        self.shared.lock().error.clone()
    }

    /// Request cooperative cancellation. The task is finalized as cancelled when
    /// its body returns.
    pub fn cancel(&self) {
        self.shared.token.cancel();
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.shared.id)
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

struct ActiveTask {
    type_id: TypeId,
    singleton: bool,
    shared: Arc<HandleShared>,
    progress: Option<Property<f64>>,
    status: Option<Property<String>>,
    complete: Option<CompletionFn>,
    waiting: bool,
}

struct RunnerInner {
    tx: mpsc::Sender<TaskMessage>,
    rx: Mutex<mpsc::Receiver<TaskMessage>>,
    active: Mutex<HashMap<TaskId, ActiveTask>>,
    status: Option<Arc<dyn StatusController>>,
    wait: Option<Arc<dyn WaitIndicator>>,
    home: ThreadId,
}

impl RunnerInner {
    fn active(&self) -> MutexGuard<'_, HashMap<TaskId, ActiveTask>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish the terminal state of a task that has left the active set.
    fn finalize(&self, task: ActiveTask, result: RawResult) {
        let name = short_name(task.shared.name);
        let (state, text) = match &result {
            RawResult::Succeeded(_) => (TaskState::Succeeded, STATUS_DONE.to_string()),
            RawResult::Cancelled => (TaskState::Cancelled, STATUS_CANCELLED.to_string()),
            RawResult::Failed { diagnostic, .. } => {
                (TaskState::Failed, format!("{STATUS_FAILED} {diagnostic}"))
            }
        };

        {
            let mut handle = task.shared.lock();
            handle.state = state;
            if let RawResult::Failed { diagnostic, error } = &result {
                handle.error_msg = Some(diagnostic.clone());
                handle.error = Some(error.clone());
            }
        }

        if let Some(progress) = &task.progress {
            progress.set(1.0);
        }
        if let Some(status) = &task.status {
            status.set(text);
        }
        if task.waiting {
            if let Some(wait) = &self.wait {
                wait.close(task.shared.id);
            }
        }
        if let Some(controller) = &self.status {
            controller.finish(task.shared.id);
        }
        info!(task = name, id = %task.shared.id, %state, "task finished");

        if let Some(complete) = task.complete {
            complete(result);
        }
    }

    /// Fail a task whose worker thread never started.
    fn abandon(&self, id: TaskId, type_name: &'static str, reason: &std::io::Error) {
        let removed = self.active().remove(&id);
        let Some(task) = removed else {
            return;
        };
        let err = TaskPanicked(format!("worker thread could not be started: {reason}"));
        let diagnostic = describe_failure(type_name, std::any::type_name::<TaskPanicked>(), &err);
        self.finalize(
            task,
            RawResult::Failed {
                diagnostic,
                error: Arc::new(err),
            },
        );
    }
}

/// Starts tasks and brings their updates back to the interactive thread.
///
/// The thread that creates the runner is treated as the interactive thread: tasks
/// started from it show the wait indicator, and it is expected to call
/// [`TaskRunner::pump`] regularly.
#[derive(Clone)]
pub struct TaskRunner {
    inner: Arc<RunnerInner>,
}

impl TaskRunner {
    pub fn new(channel_capacity: usize) -> Self {
        Self::with_ports(channel_capacity, None, None)
    }

    pub fn with_ports(
        channel_capacity: usize,
        status: Option<Arc<dyn StatusController>>,
        wait: Option<Arc<dyn WaitIndicator>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(dex_config::clamp_channel_capacity(channel_capacity));
        Self {
            inner: Arc::new(RunnerInner {
                tx,
                rx: Mutex::new(rx),
                active: Mutex::new(HashMap::new()),
                status,
                wait,
                home: thread::current().id(),
            }),
        }
    }

    pub fn task<T: DexTask>(&self, task: T) -> TaskBuilder<T> {
        TaskBuilder {
            runner: self.clone(),
            task,
            progress: None,
            status: None,
            complete: None,
        }
    }

    /// Apply queued progress, messages and results. Result handlers run here.
    /// Returns the number of messages processed.
    pub fn pump(&self) -> usize {
        let messages: Vec<TaskMessage> = {
            let mut rx = self.inner.rx.lock().unwrap_or_else(PoisonError::into_inner);
            std::iter::from_fn(|| rx.try_recv().ok()).collect()
        };
        let count = messages.len();

        for message in messages {
            match message {
                TaskMessage::Progress { id, fraction } => {
                    let progress = self.inner.active().get(&id).and_then(|t| t.progress.clone());
                    if let Some(progress) = progress {
                        progress.set(fraction);
                    }
                }
                TaskMessage::Message { id, text } => {
                    let status = self.inner.active().get(&id).and_then(|t| t.status.clone());
                    if let Some(status) = status {
                        status.set(text);
                    }
                }
                TaskMessage::Finished { id, result } => {
                    let task = self.inner.active().remove(&id);
                    match task {
                        Some(task) => self.inner.finalize(task, result),
                        None => debug!(%id, "dropping result of superseded task"),
                    }
                }
            }
        }
        count
    }

    pub fn running_count(&self) -> usize {
        self.inner.active().len()
    }

    pub fn is_idle(&self) -> bool {
        self.inner.active().is_empty()
    }

    /// Pump until every task has finished or `timeout` elapses. Returns `true` when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if self.is_idle() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(dex_config::IDLE_POLL_INTERVAL_MS));
        }
    }

    /// Request cancellation of every running task.
    pub fn cancel_all(&self) {
        for task in self.inner.active().values() {
            task.shared.token.cancel();
        }
    }
}

/// Attaches bindings and a result handler to a task before it is started.
pub struct TaskBuilder<T: DexTask> {
    runner: TaskRunner,
    task: T,
    progress: Option<Property<f64>>,
    status: Option<Property<String>>,
    complete: Option<Box<dyn FnOnce(TaskOutcome<T::Output>) + Send>>,
}

impl<T: DexTask> TaskBuilder<T> {
    /// Bind a progress property; it receives fractions in `0.0..=1.0`.
    pub fn with_progress(mut self, progress: &Property<f64>) -> Self {
        self.progress = Some(progress.clone());
        self
    }

    /// Bind a status property; it receives progress messages and the terminal status.
    pub fn with_status(mut self, status: &Property<String>) -> Self {
        self.status = Some(status.clone());
        self
    }

    pub fn on_complete(mut self, handler: impl FnOnce(TaskOutcome<T::Output>) + Send + 'static) -> Self {
        self.complete = Some(Box::new(handler));
        self
    }

    /// Start the task on a new worker thread. The body only runs when `input` is present.
    pub fn go(self, input: Option<T::Input>) -> Result<TaskHandle, TaskRunnerError> {
        let TaskBuilder {
            runner,
            mut task,
            progress,
            status,
            complete,
        } = self;
        let inner = runner.inner.clone();

        let id = Uuid::new_v4();
        let type_name = task.name();
        let name = short_name(type_name);
        let shared = Arc::new(HandleShared {
            id,
            name: type_name,
            started_at: Utc::now(),
            token: CancellationToken::new(),
            state: Mutex::new(HandleState {
                state: TaskState::Created,
                error_msg: None,
                error: None,
            }),
        });
        let waiting = inner.wait.is_some() && thread::current().id() == inner.home;

        let superseded = {
            let mut active = inner.active();
            let superseded: Vec<TaskId> = if T::SINGLETON {
                active
                    .iter()
                    .filter(|(_, t)| t.singleton && t.type_id == TypeId::of::<T>())
                    .map(|(id, _)| *id)
                    .collect()
            } else {
                Vec::new()
            };
            let superseded: Vec<ActiveTask> = superseded
                .into_iter()
                .filter_map(|id| active.remove(&id))
                .collect();
            for old in &superseded {
                old.shared.token.cancel();
                old.shared.lock().state = TaskState::Cancelled;
            }
            active.insert(
                id,
                ActiveTask {
                    type_id: TypeId::of::<T>(),
                    singleton: T::SINGLETON,
                    shared: shared.clone(),
                    progress: progress.clone(),
                    status,
                    complete: complete.map(typed_completion::<T::Output>),
                    waiting,
                },
            );
            superseded
        };
        for old in superseded {
            info!(task = name, superseded = %old.shared.id, "singleton task restarted");
            inner.finalize(old, RawResult::Cancelled);
        }

        if let Some(controller) = &inner.status {
            controller.start(id, name);
        }
        if waiting {
            if let Some(wait) = &inner.wait {
                wait.show(id, name);
            }
        }
        if let Some(progress) = &progress {
            progress.set(0.0);
        }
        shared.lock().state = TaskState::Running;

        let ctx = TaskContext::new(id, shared.token.clone(), inner.tx.clone());
        let tx = inner.tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("dex-task-{}", name.to_lowercase()))
            .spawn(move || {
                let result = run_body(&mut task, input, &ctx, type_name);
                let _ = tx.blocking_send(TaskMessage::Finished { id, result });
            });

        match spawned {
            Ok(_) => {
                info!(task = name, %id, "task started");
                Ok(TaskHandle { shared })
            }
            Err(source) => {
                error!(task = name, error = %source, "failed to spawn task thread");
                inner.abandon(id, type_name, &source);
                Err(TaskRunnerError::Spawn {
                    task: name.to_string(),
                    source,
                })
            }
        }
    }
}

fn typed_completion<O: Send + 'static>(
    handler: Box<dyn FnOnce(TaskOutcome<O>) + Send>,
) -> CompletionFn {
    Box::new(move |result: RawResult| {
        let outcome = match result {
            RawResult::Succeeded(output) => match output.downcast::<Option<O>>() {
                Ok(output) => TaskOutcome::Succeeded(*output),
                Err(_) => TaskOutcome::Failed("task produced an output of an unexpected type".into()),
            },
            RawResult::Cancelled => TaskOutcome::Cancelled,
            RawResult::Failed { diagnostic, .. } => TaskOutcome::Failed(diagnostic),
        };
        handler(outcome);
    })
}

/// Run the task body on the worker thread, converting errors and panics into a
/// failure diagnostic.
fn run_body<T: DexTask>(
    task: &mut T,
    input: Option<T::Input>,
    ctx: &TaskContext,
    type_name: &'static str,
) -> RawResult {
    let Some(input) = input else {
        return RawResult::Succeeded(Box::new(None::<T::Output>));
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.do_it(input, ctx)));
    if ctx.is_cancelled() {
        return RawResult::Cancelled;
    }
    match outcome {
        Ok(Ok(output)) => RawResult::Succeeded(Box::new(Some(output))),
        Ok(Err(err)) => {
            let diagnostic = describe_failure(type_name, std::any::type_name::<T::Error>(), &err);
            error!(task = short_name(type_name), error = %err, "task failed");
            RawResult::Failed {
                diagnostic,
                error: Arc::new(err),
            }
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            let err = TaskPanicked(message);
            let diagnostic = describe_failure(type_name, std::any::type_name::<TaskPanicked>(), &err);
            error!(task = short_name(type_name), error = %err, "task panicked");
            RawResult::Failed {
                diagnostic,
                error: Arc::new(err),
            }
        }
    }
}

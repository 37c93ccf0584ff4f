use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use dex_core::Property;
use dex_tasks::{
    DexTask, QueueTracker, StatusController, TaskContext, TaskId, TaskOutcome, TaskPanicked,
    TaskRunner, TaskState, WaitIndicator,
};

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
#[error("never fails")]
struct Never;

struct SumTask {
    ran: Arc<AtomicBool>,
}

impl DexTask for SumTask {
    type Input = Vec<u64>;
    type Output = u64;
    type Error = Never;

    fn do_it(&mut self, input: Vec<u64>, ctx: &TaskContext) -> Result<u64, Never> {
        self.ran.store(true, Ordering::SeqCst);
        let total = input.len() as u64;
        let mut sum = 0;
        for (i, n) in input.into_iter().enumerate() {
            sum += n;
            ctx.update_progress(i as u64 + 1, total);
            ctx.update_message(format!("added {n}"));
        }
        Ok(sum)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("model file is unreadable")]
struct LoadFailure {
    #[source]
    source: std::io::Error,
}

struct FailingTask;

impl DexTask for FailingTask {
    type Input = ();
    type Output = ();
    type Error = LoadFailure;

    fn do_it(&mut self, _: (), _: &TaskContext) -> Result<(), LoadFailure> {
        Err(LoadFailure {
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "model.json missing"),
        })
    }
}

struct PanickingTask;

impl DexTask for PanickingTask {
    type Input = ();
    type Output = ();
    type Error = Never;

    fn do_it(&mut self, _: (), _: &TaskContext) -> Result<(), Never> {
        panic!("boom");
    }
}

/// Runs until cancelled.
struct WaitForCancel;

impl DexTask for WaitForCancel {
    type Input = u32;
    type Output = u32;
    type Error = Never;

    fn do_it(&mut self, tag: u32, ctx: &TaskContext) -> Result<u32, Never> {
        wait_for_cancel(ctx);
        Ok(tag)
    }
}

struct SingletonScan;

impl DexTask for SingletonScan {
    type Input = u32;
    type Output = u32;
    type Error = Never;
    const SINGLETON: bool = true;

    fn do_it(&mut self, tag: u32, ctx: &TaskContext) -> Result<u32, Never> {
        wait_for_cancel(ctx);
        Ok(tag)
    }
}

fn wait_for_cancel(ctx: &TaskContext) {
    let started = Instant::now();
    while !ctx.is_cancelled() && started.elapsed() < TIMEOUT {
        thread::sleep(Duration::from_millis(2));
    }
}

fn capture<T: Send + 'static>() -> (
    Arc<Mutex<Vec<TaskOutcome<T>>>>,
    impl FnOnce(TaskOutcome<T>) + Send + 'static,
) {
    let store: Arc<Mutex<Vec<TaskOutcome<T>>>> = Arc::default();
    let sink = store.clone();
    (store, move |outcome: TaskOutcome<T>| sink.lock().unwrap().push(outcome))
}

#[test]
fn successful_task_reports_result_and_done_status() {
    let runner = TaskRunner::new(64);
    let progress = Property::new(0.0);
    let status = Property::new(String::new());
    let ran = Arc::new(AtomicBool::new(false));
    let (outcomes, handler) = capture::<u64>();

    let handle = runner
        .task(SumTask { ran: ran.clone() })
        .with_progress(&progress)
        .with_status(&status)
        .on_complete(handler)
        .go(Some(vec![1, 2, 3]))
        .unwrap();

    assert!(runner.wait_idle(TIMEOUT));
    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(*outcomes.lock().unwrap(), vec![TaskOutcome::Succeeded(Some(6))]);
    assert_eq!(progress.get(), 1.0);
    assert_eq!(status.get(), "Done!");
    assert_eq!(handle.state(), TaskState::Succeeded);
    assert_eq!(handle.name(), "SumTask");
    assert!(handle.error_msg().is_none());
}

#[test]
fn missing_input_skips_the_body() {
    let runner = TaskRunner::new(8);
    let ran = Arc::new(AtomicBool::new(false));
    let (outcomes, handler) = capture::<u64>();

    runner
        .task(SumTask { ran: ran.clone() })
        .on_complete(handler)
        .go(None)
        .unwrap();

    assert!(runner.wait_idle(TIMEOUT));
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(*outcomes.lock().unwrap(), vec![TaskOutcome::Succeeded(None)]);
}

#[test]
fn failure_becomes_diagnostic_and_status() {
    let runner = TaskRunner::new(8);
    let progress = Property::new(0.0);
    let status = Property::new(String::new());
    let (outcomes, handler) = capture::<()>();

    let handle = runner
        .task(FailingTask)
        .with_progress(&progress)
        .with_status(&status)
        .on_complete(handler)
        .go(Some(()))
        .unwrap();
    assert!(runner.wait_idle(TIMEOUT));

    assert_eq!(handle.state(), TaskState::Failed);
    assert_eq!(progress.get(), 1.0);

    let diagnostic = handle.error_msg().unwrap();
    assert!(diagnostic.contains("Task: runner::FailingTask"), "{diagnostic}");
    assert!(diagnostic.contains("Error: runner::LoadFailure"), "{diagnostic}");
    assert!(diagnostic.contains("Cause: model.json missing"), "{diagnostic}");
    assert!(diagnostic.contains("Message: model file is unreadable"), "{diagnostic}");
    assert!(diagnostic.contains("Raw message: LoadFailure"), "{diagnostic}");

    assert_eq!(status.get(), format!("Failed! {diagnostic}"));
    assert_eq!(*outcomes.lock().unwrap(), vec![TaskOutcome::Failed(diagnostic)]);

    let error = handle.error_exception().unwrap();
    assert!(error.downcast_ref::<LoadFailure>().is_some());
}

#[test]
fn panicking_task_fails_instead_of_hanging() {
    let runner = TaskRunner::new(8);
    let handle = runner.task(PanickingTask).go(Some(())).unwrap();

    assert!(runner.wait_idle(TIMEOUT));
    assert_eq!(handle.state(), TaskState::Failed);
    let error = handle.error_exception().unwrap();
    let panicked = error.downcast_ref::<TaskPanicked>().unwrap();
    assert_eq!(panicked.0, "boom");
}

#[test]
fn cancelled_task_publishes_cancelled_status() {
    let runner = TaskRunner::new(8);
    let status = Property::new(String::new());
    let (outcomes, handler) = capture::<u32>();

    let handle = runner
        .task(WaitForCancel)
        .with_status(&status)
        .on_complete(handler)
        .go(Some(7))
        .unwrap();
    assert_eq!(handle.state(), TaskState::Running);

    handle.cancel();
    assert!(runner.wait_idle(TIMEOUT));
    assert_eq!(handle.state(), TaskState::Cancelled);
    assert_eq!(status.get(), "Cancelled!");
    assert_eq!(*outcomes.lock().unwrap(), vec![TaskOutcome::Cancelled]);
}

#[test]
fn singleton_restart_cancels_the_running_instance() {
    let tracker = Arc::new(QueueTracker::new());
    let peak = Arc::new(AtomicUsize::new(0));
    let seen = peak.clone();
    tracker.size_property().add_listener(move |_, size| {
        seen.fetch_max(*size, Ordering::SeqCst);
    });
    let runner = TaskRunner::with_ports(8, Some(tracker.clone()), None);
    let (first_outcomes, first_handler) = capture::<u32>();

    let first = runner
        .task(SingletonScan)
        .on_complete(first_handler)
        .go(Some(1))
        .unwrap();
    let second = runner.task(SingletonScan).go(Some(2)).unwrap();

    assert_eq!(first.state(), TaskState::Cancelled);
    assert_eq!(second.state(), TaskState::Running);
    assert_eq!(*first_outcomes.lock().unwrap(), vec![TaskOutcome::Cancelled]);
    assert_eq!(tracker.queue_size(), 1);
    assert_eq!(runner.running_count(), 1);

    second.cancel();
    assert!(runner.wait_idle(TIMEOUT));
    assert_eq!(second.state(), TaskState::Cancelled);
    assert_eq!(tracker.queue_size(), 0);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[test]
fn non_singleton_tasks_run_side_by_side() {
    let tracker = Arc::new(QueueTracker::new());
    let runner = TaskRunner::with_ports(8, Some(tracker.clone()), None);

    let a = runner.task(WaitForCancel).go(Some(1)).unwrap();
    let b = runner.task(WaitForCancel).go(Some(2)).unwrap();
    assert_eq!(tracker.queue_size(), 2);
    assert_eq!(a.state(), TaskState::Running);
    assert_eq!(b.state(), TaskState::Running);

    runner.cancel_all();
    assert!(runner.wait_idle(TIMEOUT));
    assert_eq!(tracker.queue_size(), 0);
}

#[derive(Default)]
struct RecordingIndicator {
    calls: Mutex<Vec<(&'static str, TaskId)>>,
}

impl WaitIndicator for RecordingIndicator {
    fn show(&self, task: TaskId, _name: &str) {
        self.calls.lock().unwrap().push(("show", task));
    }

    fn close(&self, task: TaskId) {
        self.calls.lock().unwrap().push(("close", task));
    }
}

#[test]
fn wait_indicator_only_for_tasks_started_on_the_interactive_thread() {
    let indicator = Arc::new(RecordingIndicator::default());
    let runner = TaskRunner::with_ports(8, None, Some(indicator.clone()));

    let local = runner.task(FailingTask).go(Some(())).unwrap();
    let remote_runner = runner.clone();
    let remote = thread::spawn(move || remote_runner.task(FailingTask).go(Some(())).unwrap())
        .join()
        .unwrap();
    assert!(runner.wait_idle(TIMEOUT));

    let calls = indicator.calls.lock().unwrap();
    assert_eq!(*calls, vec![("show", local.id()), ("close", local.id())]);
    assert!(!calls.iter().any(|(_, id)| *id == remote.id()));
}

#[test]
fn status_controller_sees_start_and_finish() {
    let tracker = Arc::new(QueueTracker::new());
    let runner = TaskRunner::with_ports(8, Some(tracker.clone()), None);
    let ran = Arc::new(AtomicBool::new(false));

    let handle = runner.task(SumTask { ran }).go(Some(vec![4])).unwrap();
    assert!(tracker.running().iter().any(|t| t.id == handle.id()));

    assert!(runner.wait_idle(TIMEOUT));
    assert!(tracker.running().is_empty());
}

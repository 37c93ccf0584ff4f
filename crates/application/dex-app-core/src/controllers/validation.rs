use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dex_core::{Findings, ModelRef, ModelStore, Property};
use dex_events::{ControllerId, DexController, DexEvent, EventNode, EventType};
use dex_tasks::{TaskHandle, TaskOutcome, TaskRunner, TaskRunnerError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::UnresolvedType;
use crate::tasks::{ResolveTypesTask, ValidateModelTask};

const PUBLISHED: &[EventType] = &[EventType::ValidationCompleted, EventType::TypesResolved];
const SUBSCRIBED: &[EventType] = &[EventType::Modification];

#[derive(Default)]
struct BoardState {
    findings: Findings,
    unresolved: Vec<UnresolvedType>,
}

/// Latest results of background validation and type resolution, shared by the
/// controllers that display them.
#[derive(Clone, Default)]
pub struct ValidationBoard {
    inner: Arc<Mutex<BoardState>>,
}

impl ValidationBoard {
    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn findings(&self) -> Findings {
        self.lock().findings.clone()
    }

    pub fn unresolved(&self) -> Vec<UnresolvedType> {
        self.lock().unresolved.clone()
    }
}

/// Runs model validation and type resolution in the background and publishes the
/// results.
pub struct ValidationController {
    id: ControllerId,
    node: EventNode,
    store: Arc<dyn ModelStore>,
    runner: TaskRunner,
    board: ValidationBoard,
    validate_on_change: bool,
    progress: Property<f64>,
    status: Property<String>,
}

impl ValidationController {
    pub fn new(
        store: Arc<dyn ModelStore>,
        runner: TaskRunner,
        board: ValidationBoard,
        validate_on_change: bool,
    ) -> Arc<Self> {
        let id = Uuid::new_v4();
        Arc::new(Self {
            id,
            node: EventNode::new(id),
            store,
            runner,
            board,
            validate_on_change,
            progress: Property::new(0.0),
            status: Property::new(String::new()),
        })
    }

    pub fn board(&self) -> &ValidationBoard {
        &self.board
    }

    pub fn progress(&self) -> Property<f64> {
        self.progress.clone()
    }

    pub fn status(&self) -> Property<String> {
        self.status.clone()
    }

    /// Start a validation pass, superseding one that is still running.
    pub fn validate(&self) -> Result<TaskHandle, TaskRunnerError> {
        let board = self.board.clone();
        let node = self.node.clone();
        self.runner
            .task(ValidateModelTask::new(self.store.clone()))
            .with_progress(&self.progress)
            .with_status(&self.status)
            .on_complete(move |outcome| {
                if let TaskOutcome::Succeeded(Some(findings)) = outcome {
                    debug!(
                        errors = findings.error_count(),
                        warnings = findings.warning_count(),
                        "validation completed"
                    );
                    board.lock().findings = findings;
                    node.publish(EventType::ValidationCompleted, ModelRef::Model);
                }
            })
            .go(Some(()))
    }

    pub fn resolve_types(&self) -> Result<TaskHandle, TaskRunnerError> {
        let board = self.board.clone();
        let node = self.node.clone();
        self.runner
            .task(ResolveTypesTask::new(self.store.clone()))
            .with_progress(&self.progress)
            .with_status(&self.status)
            .on_complete(move |outcome| {
                if let TaskOutcome::Succeeded(Some(unresolved)) = outcome {
                    board.lock().unresolved = unresolved;
                    node.publish(EventType::TypesResolved, ModelRef::Model);
                }
            })
            .go(Some(()))
    }
}

impl DexController for ValidationController {
    fn id(&self) -> ControllerId {
        self.id
    }

    fn name(&self) -> &str {
        "validation"
    }

    fn published_events(&self) -> &[EventType] {
        PUBLISHED
    }

    fn subscribed_events(&self) -> &[EventType] {
        SUBSCRIBED
    }

    fn event_node(&self) -> &EventNode {
        &self.node
    }

    fn handle_event(&self, event: &DexEvent) {
        if !self.validate_on_change {
            return;
        }
        debug!(event = %event.event_type(), "model changed; revalidating");
        if let Err(e) = self.validate() {
            warn!(error = %e, "could not start validation");
        }
    }
}

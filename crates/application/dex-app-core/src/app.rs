use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dex_actions::{ActionKind, ActionManager, ActionOutcome, AddMemberCommand, DeleteMemberCommand};
use dex_core::{Findings, Member, MemberId, ModelStore, Value};
use dex_events::SubscriptionManager;
use dex_tasks::{QueueTracker, TaskHandle, TaskRunner, WaitIndicator};
use tracing::info;

use crate::controllers::{
    MemberDetailsController, MemberTreeController, ValidationBoard, ValidationController,
};
use crate::domain::{AppSettings, MemberRow, UnresolvedType};

/// One editing session over a model: controllers wired through a subscription
/// manager, a shared undo history and a task runner.
///
/// Create it on the interactive thread and call [`DexApplication::pump`] from that
/// thread to deliver background results.
pub struct DexApplication {
    settings: AppSettings,
    store: Arc<dyn ModelStore>,
    subscriptions: SubscriptionManager,
    actions: ActionManager,
    runner: TaskRunner,
    queue: Arc<QueueTracker>,
    tree: Arc<MemberTreeController>,
    details: Arc<MemberDetailsController>,
    validation: Arc<ValidationController>,
}

impl DexApplication {
    pub fn new(store: Arc<dyn ModelStore>, settings: AppSettings) -> Self {
        Self::with_wait_indicator(store, settings, None)
    }

    pub fn with_wait_indicator(
        store: Arc<dyn ModelStore>,
        settings: AppSettings,
        wait: Option<Arc<dyn WaitIndicator>>,
    ) -> Self {
        let queue = Arc::new(QueueTracker::new());
        let runner = TaskRunner::with_ports(
            settings.task_channel_capacity,
            Some(queue.clone()),
            wait,
        );
        let actions = ActionManager::new(store.clone(), settings.undo_limit);
        let board = ValidationBoard::default();

        let tree = MemberTreeController::new(store.clone(), board.clone());
        let details = MemberDetailsController::new(actions.clone());
        let validation = ValidationController::new(
            store.clone(),
            runner.clone(),
            board,
            settings.validate_on_change,
        );

        let mut subscriptions = SubscriptionManager::new();
        subscriptions.register(tree.clone());
        subscriptions.register(details.clone());
        subscriptions.register(validation.clone());
        let handlers = subscriptions.configure_event_handlers();
        info!(handlers, members = store.members().len(), "editor session started");

        Self {
            settings,
            store,
            subscriptions,
            actions,
            runner,
            queue,
            tree,
            details,
            validation,
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn ModelStore> {
        &self.store
    }

    pub fn actions(&self) -> &ActionManager {
        &self.actions
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    pub fn queue(&self) -> &QueueTracker {
        &self.queue
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    pub fn tree(&self) -> &MemberTreeController {
        &self.tree
    }

    pub fn details(&self) -> &MemberDetailsController {
        &self.details
    }

    pub fn validation(&self) -> &ValidationController {
        &self.validation
    }

    pub fn rows(&self) -> Vec<MemberRow> {
        self.tree.rows()
    }

    pub fn find_member(&self, name: &str) -> Result<Member> {
        self.store
            .find_member_by_name(name)
            .with_context(|| format!("No member named '{name}'"))
    }

    /// Select a member in the tree; the details controller follows the selection.
    pub fn select(&self, id: MemberId) -> bool {
        self.tree.select(id)
    }

    pub fn apply(&self, id: MemberId, kind: ActionKind, value: Value) -> Result<ActionOutcome> {
        self.actions
            .run(kind, id, value)
            .with_context(|| format!("Failed to {kind}"))
    }

    pub fn add_member(&self, member: Member) -> Result<MemberId> {
        let name = member.name.clone();
        self.actions
            .execute(AddMemberCommand::new(member))
            .with_context(|| format!("Failed to add member '{name}'"))
    }

    pub fn delete_member(&self, id: MemberId) -> Result<Member> {
        let removed = self
            .actions
            .execute(DeleteMemberCommand::new(id))
            .context("Failed to delete member")?;
        if self.details.member() == Some(id) {
            self.details.clear();
        }
        Ok(removed)
    }

    pub fn undo(&self) -> Result<bool> {
        self.actions.undo().context("Undo failed")
    }

    pub fn redo(&self) -> Result<bool> {
        self.actions.redo().context("Redo failed")
    }

    pub fn validate(&self) -> Result<TaskHandle> {
        self.validation
            .validate()
            .context("Failed to start validation")
    }

    pub fn resolve_types(&self) -> Result<TaskHandle> {
        self.validation
            .resolve_types()
            .context("Failed to start type resolution")
    }

    pub fn findings(&self) -> Findings {
        self.validation.board().findings()
    }

    pub fn unresolved_types(&self) -> Vec<UnresolvedType> {
        self.validation.board().unresolved()
    }

    /// Deliver queued background updates. Call regularly from the interactive thread.
    pub fn pump(&self) -> usize {
        self.runner.pump()
    }

    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.runner.wait_idle(timeout)
    }

    /// Cancel background work and detach every controller.
    pub fn shutdown(&mut self) {
        self.runner.cancel_all();
        self.subscriptions.remove(self.tree.as_ref());
        self.subscriptions.remove(self.details.as_ref());
        self.subscriptions.remove(self.validation.as_ref());
        info!("editor session closed");
    }
}

use std::sync::{Arc, Mutex, PoisonError};

use dex_core::{MemberId, ModelRef, ModelStore};
use dex_events::{ControllerId, DexController, DexEvent, EventNode, EventType};
use tracing::debug;
use uuid::Uuid;

use super::ValidationBoard;
use crate::domain::MemberRow;

const PUBLISHED: &[EventType] = &[EventType::MemberSelected];
const SUBSCRIBED: &[EventType] = &[EventType::Modification, EventType::ValidationCompleted];

/// Navigation tree over the model's members. Selecting a row publishes
/// [`EventType::MemberSelected`].
pub struct MemberTreeController {
    id: ControllerId,
    node: EventNode,
    store: Arc<dyn ModelStore>,
    board: ValidationBoard,
    rows: Mutex<Vec<MemberRow>>,
    selected: Mutex<Option<MemberId>>,
}

impl MemberTreeController {
    pub fn new(store: Arc<dyn ModelStore>, board: ValidationBoard) -> Arc<Self> {
        let id = Uuid::new_v4();
        let controller = Arc::new(Self {
            id,
            node: EventNode::new(id),
            store,
            board,
            rows: Mutex::new(Vec::new()),
            selected: Mutex::new(None),
        });
        controller.refresh();
        controller
    }

    pub fn rows(&self) -> Vec<MemberRow> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn selected(&self) -> Option<MemberId> {
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Select a member and tell the rest of the editor about it.
    pub fn select(&self, id: MemberId) -> bool {
        if self.store.member(id).is_none() {
            return false;
        }
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
        self.node.publish(EventType::MemberSelected, ModelRef::Member(id));
        true
    }

    /// Rebuild rows from the store, sorted by library and name.
    pub fn refresh(&self) {
        let libraries = self.store.libraries();
        let findings = self.board.findings();
        let mut rows: Vec<MemberRow> = self
            .store
            .members()
            .into_iter()
            .map(|m| {
                let library = libraries.iter().find(|l| l.id == m.library);
                MemberRow {
                    id: m.id,
                    kind: m.kind.label(),
                    library: library
                        .map(|l| format!("{} {}", l.name, l.version))
                        .unwrap_or_default(),
                    editable: library.is_some_and(|l| l.editable),
                    deprecated: m.deprecation.is_some(),
                    findings: findings.count_for(m.id),
                    name: m.name,
                }
            })
            .collect();
        rows.sort_by(|a, b| a.library.cmp(&b.library).then_with(|| a.name.cmp(&b.name)));

        let mut selected = self.selected.lock().unwrap_or_else(PoisonError::into_inner);
        if selected.is_some_and(|id| !rows.iter().any(|r| r.id == id)) {
            *selected = None;
        }
        drop(selected);

        debug!(rows = rows.len(), "member tree refreshed");
        *self.rows.lock().unwrap_or_else(PoisonError::into_inner) = rows;
    }
}

impl DexController for MemberTreeController {
    fn id(&self) -> ControllerId {
        self.id
    }

    fn name(&self) -> &str {
        "member-tree"
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

    fn handle_event(&self, _event: &DexEvent) {
        self.refresh();
    }
}

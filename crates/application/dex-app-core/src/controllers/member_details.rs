use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dex_actions::{ActionKind, ActionManager};
use dex_core::{MemberId, Property, Value};
use dex_events::{ControllerId, DexController, DexEvent, EventNode, EventType};
use tracing::{debug, warn};
use uuid::Uuid;

const PUBLISHED: &[EventType] = &[EventType::Modification];
const SUBSCRIBED: &[EventType] = &[EventType::MemberSelected];

#[derive(Default)]
struct Bound {
    member: Option<MemberId>,
    fields: BTreeMap<ActionKind, Property<Value>>,
}

/// Field editor for the selected member.
///
/// Every field applicable to the member is exposed as a property bound through the
/// action manager, so writing a property is an undoable edit. The action manager
/// fires its modification events on this controller's node.
pub struct MemberDetailsController {
    id: ControllerId,
    node: EventNode,
    actions: ActionManager,
    bound: Mutex<Bound>,
}

impl MemberDetailsController {
    pub fn new(actions: ActionManager) -> Arc<Self> {
        let id = Uuid::new_v4();
        let node = EventNode::new(id);
        actions.set_publisher(node.clone());
        Arc::new(Self {
            id,
            node,
            actions,
            bound: Mutex::new(Bound::default()),
        })
    }

    fn bound(&self) -> MutexGuard<'_, Bound> {
        self.bound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn member(&self) -> Option<MemberId> {
        self.bound().member
    }

    pub fn field(&self, kind: ActionKind) -> Option<Property<Value>> {
        self.bound().fields.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<ActionKind> {
        self.bound().fields.keys().copied().collect()
    }

    /// Write a field of the bound member as if the user typed it.
    pub fn edit(&self, kind: ActionKind, value: Value) -> bool {
        match self.field(kind) {
            Some(property) => {
                property.set(value);
                true
            }
            None => false,
        }
    }

    pub fn show(&self, id: MemberId) {
        let store = self.actions.store();
        let Some(member) = store.member(id) else {
            self.clear();
            return;
        };

        let mut fields = BTreeMap::new();
        for kind in ActionKind::ALL.into_iter().filter(|k| k.accepts(&member)) {
            match self.actions.bind(kind, id) {
                Ok(property) => {
                    fields.insert(kind, property);
                }
                Err(e) => warn!(%kind, member = %id, error = %e, "field not bound"),
            }
        }
        debug!(member = %id, fields = fields.len(), "details bound");
        *self.bound() = Bound {
            member: Some(id),
            fields,
        };
    }

    pub fn clear(&self) {
        *self.bound() = Bound::default();
    }
}

impl DexController for MemberDetailsController {
    fn id(&self) -> ControllerId {
        self.id
    }

    fn name(&self) -> &str {
        "member-details"
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
        if let Some(id) = event.subject().member() {
            self.show(id);
        }
    }
}

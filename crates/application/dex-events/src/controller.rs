use uuid::Uuid;

use crate::{DexEvent, EventNode, EventType};

pub type ControllerId = Uuid;

/// A participant in event routing.
///
/// Published and subscribed types are read once, at registration; they must not
/// change for the lifetime of the registration.
pub trait DexController: Send + Sync {
    fn id(&self) -> ControllerId;

    fn name(&self) -> &str {
        "controller"
    }

    fn published_events(&self) -> &[EventType] {
        &[]
    }

    fn subscribed_events(&self) -> &[EventType] {
        &[]
    }

    /// Node this controller fires its published events on.
    fn event_node(&self) -> &EventNode;

    fn handle_event(&self, _event: &DexEvent) {}
}

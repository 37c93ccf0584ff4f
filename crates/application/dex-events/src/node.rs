use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dex_core::ModelRef;
use tracing::trace;

use crate::{ControllerId, DexEvent, EventType};

pub type HandlerId = u64;

type EventCallback = Arc<dyn Fn(&DexEvent) + Send + Sync>;

struct InstalledHandler {
    id: HandlerId,
    event_type: EventType,
    subscriber: ControllerId,
    callback: EventCallback,
}

/// Dispatch point owned by a publishing controller.
///
/// Handlers run synchronously, depth-first, on the thread that fires. The handler
/// list is not locked while they run, so a handler may fire further events.
#[derive(Clone)]
pub struct EventNode {
    owner: ControllerId,
    handlers: Arc<Mutex<Vec<InstalledHandler>>>,
    next_id: Arc<AtomicU64>,
}

impl EventNode {
    pub fn new(owner: ControllerId) -> Self {
        Self {
            owner,
            handlers: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn owner(&self) -> ControllerId {
        self.owner
    }

    pub fn add_handler(
        &self,
        event_type: EventType,
        subscriber: ControllerId,
        callback: impl Fn(&DexEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(InstalledHandler {
                id,
                event_type,
                subscriber,
                callback: Arc::new(callback),
            });
        id
    }

    pub fn remove_handler(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|h| h.id != id);
        handlers.len() != before
    }

    pub fn handler_count(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn has_handler(&self, event_type: EventType, subscriber: ControllerId) -> bool {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|h| h.event_type == event_type && h.subscriber == subscriber)
    }

    /// Deliver `event` to every handler whose type the event is-a. Handlers belonging
    /// to the event's own source are skipped. Returns the number of deliveries.
    pub fn fire(&self, event: &DexEvent) -> usize {
        let targets: Vec<EventCallback> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| event.event_type().is_a(h.event_type) && h.subscriber != event.source())
            .map(|h| h.callback.clone())
            .collect();

        trace!(
            event = %event.event_type(),
            source = %event.source(),
            targets = targets.len(),
            "dispatching event"
        );
        for callback in &targets {
            callback(event);
        }
        targets.len()
    }

    /// Fire an event sourced from this node's owner.
    pub fn publish(&self, event_type: EventType, subject: ModelRef) -> usize {
        self.fire(&DexEvent::new(event_type, self.owner, subject))
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::{ControllerId, DexController, EventNode, EventType, HandlerId};

struct Installation {
    publisher: ControllerId,
    event_type: EventType,
    subscriber: ControllerId,
    node: EventNode,
    handler: HandlerId,
}

/// Registry wiring publishing controllers to subscribing controllers.
///
/// One manager belongs to one editor session. None of its operations fail: a type
/// with subscribers but no publisher (or the reverse) simply has no dispatch path.
#[derive(Default)]
pub struct SubscriptionManager {
    publishers: HashMap<EventType, Vec<Arc<dyn DexController>>>,
    subscribers: HashMap<EventType, Vec<Arc<dyn DexController>>>,
    installed: Vec<Installation>,
    dirty: bool,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, controller: Arc<dyn DexController>) {
        let published = controller.published_events();
        let subscribed = controller.subscribed_events();
        if published.is_empty() && subscribed.is_empty() {
            return;
        }

        for t in published {
            add_unique(self.publishers.entry(*t).or_default(), &controller);
        }
        for t in subscribed {
            add_unique(self.subscribers.entry(*t).or_default(), &controller);
        }
        self.dirty = true;
        debug!(
            controller = controller.name(),
            published = published.len(),
            subscribed = subscribed.len(),
            "controller registered"
        );
    }

    /// Drop `controller` from both maps and detach every handler installed for it,
    /// whether it was the publisher or the subscriber side of the route.
    pub fn remove(&mut self, controller: &dyn DexController) {
        let id = controller.id();
        for t in controller.published_events() {
            remove_from(&mut self.publishers, *t, id);
        }
        for t in controller.subscribed_events() {
            remove_from(&mut self.subscribers, *t, id);
        }

        let mut detached = 0;
        self.installed.retain(|i| {
            if i.publisher == id || i.subscriber == id {
                i.node.remove_handler(i.handler);
                detached += 1;
                false
            } else {
                true
            }
        });
        debug!(controller = controller.name(), detached, "controller removed");
    }

    /// Install dispatch handlers for every type having at least one publisher and one
    /// subscriber. Does nothing unless a registration happened since the last wiring.
    /// Returns the number of handlers installed by this call.
    pub fn configure_event_handlers(&mut self) -> usize {
        if !self.dirty {
            return 0;
        }
        if self.publishers.is_empty() || self.subscribers.is_empty() {
            self.dirty = false;
            return 0;
        }

        let mut added = 0;
        for (event_type, publishers) in &self.publishers {
            let Some(subscribers) = self.subscribers.get(event_type) else {
                continue;
            };
            for publisher in publishers {
                for subscriber in subscribers {
                    let exists = self.installed.iter().any(|i| {
                        i.publisher == publisher.id()
                            && i.event_type == *event_type
                            && i.subscriber == subscriber.id()
                    });
                    if exists {
                        continue;
                    }

                    let target = Arc::downgrade(subscriber);
                    let node = publisher.event_node().clone();
                    let handler = node.add_handler(*event_type, subscriber.id(), move |ev| {
                        if let Some(target) = target.upgrade() {
                            target.handle_event(ev);
                        }
                    });
                    debug!(
                        event = %event_type,
                        publisher = publisher.name(),
                        subscriber = subscriber.name(),
                        "dispatch handler installed"
                    );
                    self.installed.push(Installation {
                        publisher: publisher.id(),
                        event_type: *event_type,
                        subscriber: subscriber.id(),
                        node,
                        handler,
                    });
                    added += 1;
                }
            }
        }

        self.dirty = false;
        added
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn publishers_of(&self, event_type: EventType) -> Vec<ControllerId> {
        ids(self.publishers.get(&event_type))
    }

    pub fn subscribers_of(&self, event_type: EventType) -> Vec<ControllerId> {
        ids(self.subscribers.get(&event_type))
    }

    pub fn installed_handler_count(&self) -> usize {
        self.installed.len()
    }
}

fn add_unique(list: &mut Vec<Arc<dyn DexController>>, controller: &Arc<dyn DexController>) {
    if !list.iter().any(|c| c.id() == controller.id()) {
        list.push(controller.clone());
    }
}

fn remove_from(
    map: &mut HashMap<EventType, Vec<Arc<dyn DexController>>>,
    event_type: EventType,
    id: ControllerId,
) {
    if let Some(list) = map.get_mut(&event_type) {
        list.retain(|c| c.id() != id);
        if list.is_empty() {
            map.remove(&event_type);
        }
    }
}

fn ids(list: Option<&Vec<Arc<dyn DexController>>>) -> Vec<ControllerId> {
    list.map(|l| l.iter().map(|c| c.id()).collect())
        .unwrap_or_default()
}

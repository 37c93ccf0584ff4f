//! Event routing between editor controllers.
//!
//! Controllers declare which [`EventType`]s they publish and subscribe to and are
//! registered with a per-session [`SubscriptionManager`]. Once
//! [`SubscriptionManager::configure_event_handlers`] has run, firing an event on a
//! publisher's [`EventNode`] reaches every subscriber of a matching type without the
//! controllers knowing about each other.

pub mod controller;
pub mod event;
pub mod manager;
pub mod node;

pub use controller::{ControllerId, DexController};
pub use event::{DexEvent, EventType};
pub use manager::SubscriptionManager;
pub use node::{EventNode, HandlerId};

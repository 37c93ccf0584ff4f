use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use dex_core::{Finding, MemberId, ModelRef, ModelStore, Property, PropertyId, Value};
use dex_events::{DexEvent, EventNode, EventType};
use tracing::{debug, warn};

use crate::action::{ActionPhase, DexAction};
use crate::command::{DexCommand, UndoableCommand};
use crate::{ActionError, ActionKind};

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The edit was applied and recorded; carries the committed value.
    Applied(Option<Value>),
    /// Domain validation rejected the prospective value.
    Vetoed(Finding),
    /// The action is not enabled for this subject.
    Disabled,
    /// Dropped: the observable already had a change in flight, or the edit had
    /// no target to apply to.
    Ignored,
}

enum HistoryEntry {
    Field {
        action: Arc<dyn DexAction>,
        observable: Option<PropertyId>,
    },
    Command(Box<dyn UndoableCommand>),
}

impl HistoryEntry {
    fn label(&self) -> &'static str {
        match self {
            HistoryEntry::Field { action, .. } => action.kind().label(),
            HistoryEntry::Command(cmd) => cmd.label(),
        }
    }

    fn observable(&self) -> Option<PropertyId> {
        match self {
            HistoryEntry::Field { observable, .. } => *observable,
            HistoryEntry::Command(_) => None,
        }
    }

    fn undo(&mut self, store: &dyn ModelStore) -> Result<(EventType, Option<MemberId>), ActionError> {
        match self {
            HistoryEntry::Field { action, .. } => {
                action.undo_it()?;
                Ok((action.kind().event_type(), action.subject()))
            }
            HistoryEntry::Command(cmd) => {
                cmd.revert(store)?;
                Ok((cmd.undo_event_type(), cmd.subject()))
            }
        }
    }

    fn redo(&mut self, store: &dyn ModelStore) -> Result<(EventType, Option<MemberId>), ActionError> {
        match self {
            HistoryEntry::Field { action, .. } => {
                action.redo_it()?;
                Ok((action.kind().event_type(), action.subject()))
            }
            HistoryEntry::Command(cmd) => {
                cmd.replay(store)?;
                Ok((cmd.event_type(), cmd.subject()))
            }
        }
    }
}

struct History {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    limit: usize,
}

impl History {
    fn record(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        self.undo.push_back(entry);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }
}

struct ManagerInner {
    store: Arc<dyn ModelStore>,
    history: Mutex<History>,
    in_flight: Mutex<HashSet<PropertyId>>,
    publisher: Mutex<Option<EventNode>>,
}

/// Removes a property from the in-flight set when dropped.
struct FlightGuard<'a> {
    set: &'a Mutex<HashSet<PropertyId>>,
    id: PropertyId,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl ManagerInner {
    fn history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_flight(&self, id: PropertyId) -> Option<FlightGuard<'_>> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        inserted.then_some(FlightGuard {
            set: &self.in_flight,
            id,
        })
    }

    fn fire(&self, event_type: EventType, subject: Option<MemberId>, detail: &str) {
        let node = self
            .publisher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(node) = node {
            let subject = subject.map(ModelRef::Member).unwrap_or(ModelRef::Model);
            node.fire(&DexEvent::new(event_type, node.owner(), subject).with_detail(detail));
        }
    }

    fn new_action(&self, kind: ActionKind, id: MemberId) -> Result<Arc<dyn DexAction>, ActionError> {
        let member = self.store.member(id).ok_or(ActionError::UnknownMember(id))?;
        let action = kind.instantiate(self.store.clone());
        if !action.set_subject(&member) {
            return Err(ActionError::IncompatibleSubject {
                kind,
                subject_kind: member.kind.label(),
            });
        }
        Ok(action)
    }

    fn apply(
        &self,
        kind: ActionKind,
        id: MemberId,
        value: Value,
        observable: Option<&Property<Value>>,
    ) -> Result<ActionOutcome, ActionError> {
        let _flight = match observable {
            Some(p) => match self.begin_flight(p.id()) {
                Some(guard) => Some(guard),
                None => return Ok(ActionOutcome::Ignored),
            },
            None => None,
        };

        let member = self.store.member(id).ok_or(ActionError::UnknownMember(id))?;
        if !kind.is_enabled(self.store.as_ref(), &member) {
            return Ok(ActionOutcome::Disabled);
        }
        if let Some(finding) = self.store.check_change(id, kind.field(), &value) {
            debug!(%kind, member = %id, code = %finding.code, "edit vetoed");
            return Ok(ActionOutcome::Vetoed(finding));
        }

        let action = self.new_action(kind, id)?;
        let committed = action.do_it(observable, Some(value))?;
        if action.phase() != ActionPhase::Applied {
            return Ok(ActionOutcome::Ignored);
        }

        let subject = action.subject();
        self.history().record(HistoryEntry::Field {
            action,
            observable: observable.map(Property::id),
        });
        debug!(%kind, member = %id, "edit applied");
        self.fire(kind.event_type(), subject, "do");
        Ok(ActionOutcome::Applied(committed))
    }

    /// Put the committed model value back into a property after a rejected gesture.
    fn resync(&self, property: &Property<Value>, kind: ActionKind, id: MemberId) {
        let Some(_flight) = self.begin_flight(property.id()) else {
            return;
        };
        if let Ok(value) = self.store.get_field(id, kind.field()) {
            property.set(value.unwrap_or_else(Value::empty));
        }
    }
}

/// Owns the undo/redo history of one editing session and routes edits to actions.
#[derive(Clone)]
pub struct ActionManager {
    inner: Arc<ManagerInner>,
}

impl ActionManager {
    pub fn new(store: Arc<dyn ModelStore>, undo_limit: usize) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                store,
                history: Mutex::new(History {
                    undo: VecDeque::new(),
                    redo: Vec::new(),
                    limit: dex_config::clamp_undo_limit(undo_limit),
                }),
                in_flight: Mutex::new(HashSet::new()),
                publisher: Mutex::new(None),
            }),
        }
    }

    /// Fire modification events on `node` after every applied, undone or redone edit.
    pub fn set_publisher(&self, node: EventNode) {
        *self
            .inner
            .publisher
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(node);
    }

    pub fn store(&self) -> Arc<dyn ModelStore> {
        self.inner.store.clone()
    }

    /// A fresh action of `kind` bound to member `id`.
    pub fn action(&self, kind: ActionKind, id: MemberId) -> Result<Arc<dyn DexAction>, ActionError> {
        self.inner.new_action(kind, id)
    }

    pub fn is_enabled(&self, kind: ActionKind, id: MemberId) -> bool {
        self.inner
            .store
            .member(id)
            .is_some_and(|m| kind.is_enabled(self.inner.store.as_ref(), &m))
    }

    /// Apply one edit outside of any bound control.
    pub fn run(&self, kind: ActionKind, id: MemberId, value: Value) -> Result<ActionOutcome, ActionError> {
        self.inner.apply(kind, id, value, None)
    }

    /// A property initialised with the field's committed value; every change made to
    /// it is routed through an action of `kind`.
    pub fn bind(&self, kind: ActionKind, id: MemberId) -> Result<Property<Value>, ActionError> {
        let initial = self.inner.new_action(kind, id)?.get()?.unwrap_or_else(Value::empty);
        let property = Property::new(initial);

        let manager: Weak<ManagerInner> = Arc::downgrade(&self.inner);
        let weak_property = property.downgrade();
        property.add_listener(move |_, new| {
            let (Some(inner), Some(property)) = (manager.upgrade(), weak_property.upgrade()) else {
                return;
            };
            match inner.apply(kind, id, new.clone(), Some(&property)) {
                Ok(ActionOutcome::Applied(_)) | Ok(ActionOutcome::Ignored) => {}
                Ok(ActionOutcome::Vetoed(finding)) => {
                    warn!(%kind, member = %id, reason = %finding.message, "edit rejected");
                    inner.resync(&property, kind, id);
                }
                Ok(ActionOutcome::Disabled) => inner.resync(&property, kind, id),
                Err(e) => {
                    warn!(%kind, member = %id, error = %e, "edit failed");
                    inner.resync(&property, kind, id);
                }
            }
        });
        Ok(property)
    }

    pub fn execute<C: DexCommand>(&self, mut command: C) -> Result<C::Output, ActionError> {
        let output = command.execute(self.inner.store.as_ref())?;
        let event_type = command.event_type();
        let subject = command.subject();
        debug!(command = command.label(), "command executed");
        self.inner
            .history()
            .record(HistoryEntry::Command(Box::new(command)));
        self.inner.fire(event_type, subject, "do");
        Ok(output)
    }

    /// Revert the most recent edit. Returns `false` when there is nothing to undo.
    pub fn undo(&self) -> Result<bool, ActionError> {
        let Some(mut entry) = self.inner.history().undo.pop_back() else {
            return Ok(false);
        };
        let _flight = entry.observable().and_then(|id| self.inner.begin_flight(id));

        match entry.undo(self.inner.store.as_ref()) {
            Ok((event_type, subject)) => {
                debug!(edit = entry.label(), "edit undone");
                self.inner.history().redo.push(entry);
                self.inner.fire(event_type, subject, "undo");
                Ok(true)
            }
            Err(e) => {
                self.inner.history().undo.push_back(entry);
                Err(e)
            }
        }
    }

    /// Re-apply the most recently undone edit. Returns `false` when there is nothing to redo.
    pub fn redo(&self) -> Result<bool, ActionError> {
        let Some(mut entry) = self.inner.history().redo.pop() else {
            return Ok(false);
        };
        let _flight = entry.observable().and_then(|id| self.inner.begin_flight(id));

        match entry.redo(self.inner.store.as_ref()) {
            Ok((event_type, subject)) => {
                debug!(edit = entry.label(), "edit redone");
                self.inner.history().undo.push_back(entry);
                self.inner.fire(event_type, subject, "redo");
                Ok(true)
            }
            Err(e) => {
                self.inner.history().redo.push(entry);
                Err(e)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.inner.history().undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.inner.history().redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.inner.history().undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.inner.history().redo.len()
    }

    pub fn peek_undo_label(&self) -> Option<&'static str> {
        self.inner.history().undo.back().map(HistoryEntry::label)
    }

    pub fn clear(&self) {
        let mut history = self.inner.history();
        history.undo.clear();
        history.redo.clear();
    }
}

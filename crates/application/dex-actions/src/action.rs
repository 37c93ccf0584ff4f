use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dex_core::{Field, Member, MemberId, ModelError, ModelStore, Property, Value};
use tracing::debug;

use crate::{ActionError, ActionKind};

/// Lifecycle of a single action instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionPhase {
    #[default]
    Created,
    SubjectBound,
    Applied,
    Undone,
}

/// A subject redirected to an editable counterpart in a later version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    pub original: MemberId,
    /// The counterpart was created by the redirect and is removed again on undo.
    pub created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditTarget {
    pub subject: MemberId,
    pub redirect: Option<Redirect>,
}

impl EditTarget {
    pub fn new(subject: MemberId) -> Self {
        Self {
            subject,
            redirect: None,
        }
    }
}

/// One atomic, reversible change to one field of one model member.
pub trait DexAction: Send + Sync {
    fn kind(&self) -> ActionKind;
    fn phase(&self) -> ActionPhase;

    /// Member the edit is (or will be) applied to, after any redirect.
    fn subject(&self) -> Option<MemberId>;
    /// Member the action was bound to with [`DexAction::set_subject`].
    fn original_subject(&self) -> Option<MemberId>;

    /// Bind the subject. Returns `false` when the member's type is incompatible.
    fn set_subject(&self, member: &Member) -> bool;
    fn is_enabled(&self, member: &Member) -> bool;
    fn is_busy(&self) -> bool;

    fn get(&self) -> Result<Option<Value>, ActionError>;
    fn old_value(&self) -> Option<Value>;
    fn new_value(&self) -> Option<Value>;

    /// Apply `new_value`. Returns `Ok(None)` without touching the model when
    /// `new_value` is `None` or the action is already applying a change.
    fn do_it(
        &self,
        observable: Option<&Property<Value>>,
        new_value: Option<Value>,
    ) -> Result<Option<Value>, ActionError>;
    fn undo_it(&self) -> Result<Option<Value>, ActionError>;
    fn redo_it(&self) -> Result<Option<Value>, ActionError>;
}

/// Field-specific half of an action: which field, which subjects, how to read and write.
pub trait FieldEdit: Send + Sync + 'static {
    fn kind(&self) -> ActionKind;

    fn field(&self) -> Field {
        self.kind().field()
    }

    fn accepts(member: &Member) -> bool
    where
        Self: Sized;

    fn is_enabled(store: &dyn ModelStore, member: &Member) -> bool
    where
        Self: Sized,
    {
        Self::accepts(member) && store.is_editable(member.id)
    }

    /// Settle the member the edit applies to. Returning `false` turns the action
    /// into a no-op.
    fn resolve(
        &self,
        _store: &dyn ModelStore,
        _target: &mut EditTarget,
    ) -> Result<bool, ModelError> {
        Ok(true)
    }

    fn get(&self, store: &dyn ModelStore, target: &EditTarget) -> Result<Option<Value>, ModelError> {
        store.get_field(target.subject, self.field())
    }

    fn set(&self, store: &dyn ModelStore, target: &EditTarget, value: &Value) -> Result<(), ModelError> {
        store.set_field(target.subject, self.field(), value)
    }
}

#[derive(Default)]
struct ActionState {
    phase: ActionPhase,
    target: Option<EditTarget>,
    original: Option<MemberId>,
    old_value: Option<Value>,
    new_value: Option<Value>,
    observable: Option<Property<Value>>,
}

/// Clears the busy flag when dropped, including on early error returns.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The shared do/undo/redo state machine, parameterised by a [`FieldEdit`].
///
/// No internal lock is held while the model is written or the observable is
/// updated, so reentrant notifications reach the busy check instead of deadlocking.
pub struct FieldAction<E> {
    edit: E,
    store: Arc<dyn ModelStore>,
    busy: AtomicBool,
    state: Mutex<ActionState>,
}

impl<E: FieldEdit> FieldAction<E> {
    pub fn new(edit: E, store: Arc<dyn ModelStore>) -> Self {
        Self {
            edit,
            store,
            busy: AtomicBool::new(false),
            state: Mutex::new(ActionState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ActionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sync_observable(&self, value: Value) {
        let observable = self.state().observable.clone();
        if let Some(observable) = observable {
            observable.set(value);
        }
    }

    fn committed(&self, target: &EditTarget) -> Result<Option<Value>, ActionError> {
        Ok(self.edit.get(self.store.as_ref(), target)?)
    }
}

impl<E: FieldEdit> DexAction for FieldAction<E> {
    fn kind(&self) -> ActionKind {
        self.edit.kind()
    }

    fn phase(&self) -> ActionPhase {
        self.state().phase
    }

    fn subject(&self) -> Option<MemberId> {
        self.state().target.map(|t| t.subject)
    }

    fn original_subject(&self) -> Option<MemberId> {
        self.state().original
    }

    fn set_subject(&self, member: &Member) -> bool {
        if !E::accepts(member) {
            return false;
        }
        let mut state = self.state();
        if !matches!(state.phase, ActionPhase::Created | ActionPhase::SubjectBound) {
            return false;
        }
        state.target = Some(EditTarget::new(member.id));
        state.original = Some(member.id);
        state.phase = ActionPhase::SubjectBound;
        true
    }

    fn is_enabled(&self, member: &Member) -> bool {
        E::is_enabled(self.store.as_ref(), member)
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn get(&self) -> Result<Option<Value>, ActionError> {
        let target = self.state().target.ok_or(ActionError::NoSubject(self.kind()))?;
        self.committed(&target)
    }

    fn old_value(&self) -> Option<Value> {
        self.state().old_value.clone()
    }

    fn new_value(&self) -> Option<Value> {
        self.state().new_value.clone()
    }

    fn do_it(
        &self,
        observable: Option<&Property<Value>>,
        new_value: Option<Value>,
    ) -> Result<Option<Value>, ActionError> {
        let Some(new_value) = new_value else {
            return Ok(None);
        };
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            debug!(kind = %self.kind(), "change ignored while action is busy");
            return Ok(None);
        };

        let mut target = self.state().target.ok_or(ActionError::NoSubject(self.kind()))?;
        if !self.edit.resolve(self.store.as_ref(), &mut target)? {
            debug!(kind = %self.kind(), subject = %target.subject, "no editable target; edit skipped");
            return Ok(None);
        }

        let old_value = self
            .edit
            .get(self.store.as_ref(), &target)?
            .unwrap_or_else(Value::empty);
        {
            let mut state = self.state();
            state.target = Some(target);
            state.old_value = Some(old_value);
            state.new_value = Some(new_value.clone());
            if let Some(observable) = observable {
                state.observable = Some(observable.clone());
            }
        }

        self.edit.set(self.store.as_ref(), &target, &new_value)?;
        let committed = self.committed(&target)?;
        self.sync_observable(committed.clone().unwrap_or_else(Value::empty));

        self.state().phase = ActionPhase::Applied;
        Ok(committed)
    }

    fn undo_it(&self) -> Result<Option<Value>, ActionError> {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            return Ok(None);
        };

        let (target, old_value) = {
            let state = self.state();
            if state.phase != ActionPhase::Applied {
                return Ok(None);
            }
            let target = state.target.ok_or(ActionError::NoSubject(self.kind()))?;
            (target, state.old_value.clone().unwrap_or_else(Value::empty))
        };

        let restored = match target.redirect {
            Some(Redirect {
                original,
                created: true,
            }) => {
                self.store.remove_member(target.subject)?;
                debug!(counterpart = %target.subject, "removed counterpart created by edit");
                EditTarget::new(original)
            }
            _ => {
                self.edit.set(self.store.as_ref(), &target, &old_value)?;
                target
            }
        };

        {
            let mut state = self.state();
            state.target = Some(restored);
            state.phase = ActionPhase::Undone;
        }
        self.sync_observable(old_value.clone());
        Ok(Some(old_value))
    }

    fn redo_it(&self) -> Result<Option<Value>, ActionError> {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            return Ok(None);
        };

        let (mut target, new_value) = {
            let state = self.state();
            if state.phase != ActionPhase::Undone {
                return Ok(None);
            }
            let target = state.target.ok_or(ActionError::NoSubject(self.kind()))?;
            match state.new_value.clone() {
                Some(v) => (target, v),
                None => return Ok(None),
            }
        };

        if !self.edit.resolve(self.store.as_ref(), &mut target)? {
            return Ok(None);
        }
        self.edit.set(self.store.as_ref(), &target, &new_value)?;
        let committed = self.committed(&target)?;

        {
            let mut state = self.state();
            state.target = Some(target);
            state.phase = ActionPhase::Applied;
        }
        self.sync_observable(committed.clone().unwrap_or_else(Value::empty));
        Ok(committed)
    }
}

use dex_core::{Member, MemberId, ModelStore};
use dex_events::EventType;

use crate::ActionError;

/// An explicitly invoked, undoable edit that returns a typed result.
pub trait DexCommand: Send + 'static {
    type Output;

    fn label(&self) -> &'static str;
    fn subject(&self) -> Option<MemberId>;
    fn event_type(&self) -> EventType;

    /// Event fired when the command is undone.
    fn undo_event_type(&self) -> EventType {
        self.event_type()
    }

    fn execute(&mut self, store: &dyn ModelStore) -> Result<Self::Output, ActionError>;
    fn revert(&mut self, store: &dyn ModelStore) -> Result<(), ActionError>;
}

/// Object-safe view of a command kept in the undo history.
pub(crate) trait UndoableCommand: Send {
    fn label(&self) -> &'static str;
    fn subject(&self) -> Option<MemberId>;
    fn event_type(&self) -> EventType;
    fn undo_event_type(&self) -> EventType;
    fn revert(&mut self, store: &dyn ModelStore) -> Result<(), ActionError>;
    fn replay(&mut self, store: &dyn ModelStore) -> Result<(), ActionError>;
}

impl<C: DexCommand> UndoableCommand for C {
    fn label(&self) -> &'static str {
        DexCommand::label(self)
    }

    fn subject(&self) -> Option<MemberId> {
        DexCommand::subject(self)
    }

    fn event_type(&self) -> EventType {
        DexCommand::event_type(self)
    }

    fn undo_event_type(&self) -> EventType {
        DexCommand::undo_event_type(self)
    }

    fn revert(&mut self, store: &dyn ModelStore) -> Result<(), ActionError> {
        DexCommand::revert(self, store)
    }

    fn replay(&mut self, store: &dyn ModelStore) -> Result<(), ActionError> {
        self.execute(store).map(|_| ())
    }
}

pub struct AddMemberCommand {
    member: Member,
}

impl AddMemberCommand {
    pub fn new(member: Member) -> Self {
        Self { member }
    }
}

impl DexCommand for AddMemberCommand {
    type Output = MemberId;

    fn label(&self) -> &'static str {
        "add member"
    }

    fn subject(&self) -> Option<MemberId> {
        Some(self.member.id)
    }

    fn event_type(&self) -> EventType {
        EventType::MemberAdded
    }

    fn undo_event_type(&self) -> EventType {
        EventType::MemberDeleted
    }

    fn execute(&mut self, store: &dyn ModelStore) -> Result<MemberId, ActionError> {
        Ok(store.add_member(self.member.clone())?)
    }

    fn revert(&mut self, store: &dyn ModelStore) -> Result<(), ActionError> {
        store.remove_member(self.member.id)?;
        Ok(())
    }
}

pub struct DeleteMemberCommand {
    id: MemberId,
    removed: Option<Member>,
}

impl DeleteMemberCommand {
    pub fn new(id: MemberId) -> Self {
        Self { id, removed: None }
    }
}

impl DexCommand for DeleteMemberCommand {
    type Output = Member;

    fn label(&self) -> &'static str {
        "delete member"
    }

    fn subject(&self) -> Option<MemberId> {
        Some(self.id)
    }

    fn event_type(&self) -> EventType {
        EventType::MemberDeleted
    }

    fn undo_event_type(&self) -> EventType {
        EventType::MemberAdded
    }

    fn execute(&mut self, store: &dyn ModelStore) -> Result<Member, ActionError> {
        let removed = store.remove_member(self.id)?;
        self.removed = Some(removed.clone());
        Ok(removed)
    }

    fn revert(&mut self, store: &dyn ModelStore) -> Result<(), ActionError> {
        if let Some(member) = self.removed.take() {
            store.add_member(member)?;
        }
        Ok(())
    }
}

//! Undoable edits of the schema model.
//!
//! Every user gesture that changes a model field becomes one [`DexAction`]: a
//! reversible change to one field of one member. The [`ActionManager`] vetoes
//! invalid values, keeps the undo/redo history and fires modification events so
//! other controllers can refresh.

pub mod action;
pub mod command;
pub mod edits;
pub mod error;
pub mod kind;
pub mod manager;

pub use action::{ActionPhase, DexAction, EditTarget, FieldAction, FieldEdit, Redirect};
pub use command::{AddMemberCommand, DeleteMemberCommand, DexCommand};
pub use error::ActionError;
pub use kind::ActionKind;
pub use manager::{ActionManager, ActionOutcome};

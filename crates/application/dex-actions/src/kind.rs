use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dex_core::{Field, Member, ModelStore};
use dex_events::EventType;

use crate::action::{DexAction, FieldAction, FieldEdit};
use crate::edits::{DeprecationEdit, DescriptionEdit, ExampleEdit, FacetEdit, NameEdit};

/// Closed set of field-level edits the editor offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    SetName,
    SetDescription,
    SetExample,
    SetDeprecation,
    SetPattern,
    SetMinLength,
    SetMaxLength,
    SetFractionDigits,
    SetTotalDigits,
}

impl ActionKind {
    pub const ALL: [ActionKind; 9] = [
        ActionKind::SetName,
        ActionKind::SetDescription,
        ActionKind::SetExample,
        ActionKind::SetDeprecation,
        ActionKind::SetPattern,
        ActionKind::SetMinLength,
        ActionKind::SetMaxLength,
        ActionKind::SetFractionDigits,
        ActionKind::SetTotalDigits,
    ];

    pub fn field(&self) -> Field {
        match self {
            ActionKind::SetName => Field::Name,
            ActionKind::SetDescription => Field::Description,
            ActionKind::SetExample => Field::Example,
            ActionKind::SetDeprecation => Field::Deprecation,
            ActionKind::SetPattern => Field::Pattern,
            ActionKind::SetMinLength => Field::MinLength,
            ActionKind::SetMaxLength => Field::MaxLength,
            ActionKind::SetFractionDigits => Field::FractionDigits,
            ActionKind::SetTotalDigits => Field::TotalDigits,
        }
    }

    /// Command-line style key, e.g. `set-min-length`.
    pub fn key(&self) -> &'static str {
        match self {
            ActionKind::SetName => "set-name",
            ActionKind::SetDescription => "set-description",
            ActionKind::SetExample => "set-example",
            ActionKind::SetDeprecation => "set-deprecation",
            ActionKind::SetPattern => "set-pattern",
            ActionKind::SetMinLength => "set-min-length",
            ActionKind::SetMaxLength => "set-max-length",
            ActionKind::SetFractionDigits => "set-fraction-digits",
            ActionKind::SetTotalDigits => "set-total-digits",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::SetName => "set name",
            ActionKind::SetDescription => "set description",
            ActionKind::SetExample => "set example",
            ActionKind::SetDeprecation => "set deprecation",
            ActionKind::SetPattern => "set constraint pattern",
            ActionKind::SetMinLength => "set min length",
            ActionKind::SetMaxLength => "set max length",
            ActionKind::SetFractionDigits => "set fraction digits",
            ActionKind::SetTotalDigits => "set total digits",
        }
    }

    /// Event fired after an edit of this kind is applied, undone or redone.
    pub fn event_type(&self) -> EventType {
        match self {
            ActionKind::SetName => EventType::NameModified,
            ActionKind::SetDescription => EventType::DescriptionModified,
            ActionKind::SetExample => EventType::ExampleModified,
            ActionKind::SetDeprecation => EventType::DeprecationModified,
            ActionKind::SetPattern
            | ActionKind::SetMinLength
            | ActionKind::SetMaxLength
            | ActionKind::SetFractionDigits
            | ActionKind::SetTotalDigits => EventType::FacetModified,
        }
    }

    pub fn instantiate(&self, store: Arc<dyn ModelStore>) -> Arc<dyn DexAction> {
        match self {
            ActionKind::SetName => Arc::new(FieldAction::new(NameEdit, store)),
            ActionKind::SetDescription => Arc::new(FieldAction::new(DescriptionEdit, store)),
            ActionKind::SetExample => Arc::new(FieldAction::new(ExampleEdit, store)),
            ActionKind::SetDeprecation => Arc::new(FieldAction::new(DeprecationEdit, store)),
            ActionKind::SetPattern
            | ActionKind::SetMinLength
            | ActionKind::SetMaxLength
            | ActionKind::SetFractionDigits
            | ActionKind::SetTotalDigits => Arc::new(FieldAction::new(FacetEdit::new(*self), store)),
        }
    }

    /// Whether a member's type is compatible with this kind of edit.
    pub fn accepts(&self, member: &Member) -> bool {
        match self {
            ActionKind::SetName => NameEdit::accepts(member),
            ActionKind::SetDescription => DescriptionEdit::accepts(member),
            ActionKind::SetExample => ExampleEdit::accepts(member),
            ActionKind::SetDeprecation => DeprecationEdit::accepts(member),
            _ => FacetEdit::accepts(member),
        }
    }

    pub fn is_enabled(&self, store: &dyn ModelStore, member: &Member) -> bool {
        match self {
            ActionKind::SetName => NameEdit::is_enabled(store, member),
            ActionKind::SetDescription => DescriptionEdit::is_enabled(store, member),
            ActionKind::SetExample => ExampleEdit::is_enabled(store, member),
            ActionKind::SetDeprecation => DeprecationEdit::is_enabled(store, member),
            _ => FacetEdit::is_enabled(store, member),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|k| k.key() == s)
            .ok_or_else(|| format!("unknown action '{s}'"))
    }
}

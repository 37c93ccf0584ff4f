//! Concrete field edits.

use dex_core::{Member, MemberKind, ModelError, ModelStore};
use tracing::debug;

use crate::action::{EditTarget, FieldEdit, Redirect};
use crate::ActionKind;

pub struct NameEdit;

impl FieldEdit for NameEdit {
    fn kind(&self) -> ActionKind {
        ActionKind::SetName
    }

    fn accepts(_member: &Member) -> bool {
        true
    }
}

pub struct DescriptionEdit;

impl FieldEdit for DescriptionEdit {
    fn kind(&self) -> ActionKind {
        ActionKind::SetDescription
    }

    fn accepts(_member: &Member) -> bool {
        true
    }
}

/// Examples only make sense for members describing a value.
pub struct ExampleEdit;

impl FieldEdit for ExampleEdit {
    fn kind(&self) -> ActionKind {
        ActionKind::SetExample
    }

    fn accepts(member: &Member) -> bool {
        matches!(
            member.kind,
            MemberKind::Simple(_)
                | MemberKind::Core { .. }
                | MemberKind::Enumeration { .. }
                | MemberKind::ValueWithAttributes { .. }
        )
    }
}

/// Pattern, length and digit facets of simple and core objects.
pub struct FacetEdit {
    kind: ActionKind,
}

impl FacetEdit {
    pub fn new(kind: ActionKind) -> Self {
        debug_assert!(kind.field().is_facet());
        Self { kind }
    }
}

impl FieldEdit for FacetEdit {
    fn kind(&self) -> ActionKind {
        self.kind
    }

    fn accepts(member: &Member) -> bool {
        member.has_facets()
    }
}

/// Deprecating a member of a released (read-only) version edits its counterpart in
/// the next editable minor version instead, creating that counterpart if needed.
pub struct DeprecationEdit;

impl FieldEdit for DeprecationEdit {
    fn kind(&self) -> ActionKind {
        ActionKind::SetDeprecation
    }

    fn accepts(member: &Member) -> bool {
        !matches!(member.kind, MemberKind::Service)
    }

    fn is_enabled(store: &dyn ModelStore, member: &Member) -> bool {
        Self::accepts(member)
            && (store.is_editable(member.id) || store.has_editable_successor(member.id))
    }

    fn resolve(&self, store: &dyn ModelStore, target: &mut EditTarget) -> Result<bool, ModelError> {
        if let Some(redirect) = target.redirect {
            if store.member(target.subject).is_some() {
                return Ok(true);
            }
            // The counterpart was removed and recreated under a new id since this
            // edit last ran; look it up again from the original member.
            *target = EditTarget::new(redirect.original);
        }
        if store.is_editable(target.subject) {
            return Ok(true);
        }
        match store.next_editable_version(target.subject)? {
            Some(next) => {
                debug!(
                    original = %target.subject,
                    counterpart = %next.member,
                    created = next.created,
                    "deprecation redirected to editable version"
                );
                target.redirect = Some(Redirect {
                    original: target.subject,
                    created: next.created,
                });
                target.subject = next.member;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

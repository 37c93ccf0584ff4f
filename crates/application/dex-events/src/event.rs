use std::fmt;

use dex_core::ModelRef;

use crate::ControllerId;

/// Classification of editor events.
///
/// Types form a tree rooted at [`EventType::Any`]; a handler installed for a type
/// also receives events of every descendant type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    Any,

    Selection,
    MemberSelected,
    LibrarySelected,

    Modification,
    MemberAdded,
    MemberDeleted,
    MemberModified,
    NameModified,
    DescriptionModified,
    ExampleModified,
    DeprecationModified,
    FacetModified,

    Lifecycle,
    ModelLoaded,
    ValidationCompleted,
    TypesResolved,
}

impl EventType {
    pub fn parent(&self) -> Option<EventType> {
        use EventType::*;
        match self {
            Any => None,
            Selection | Modification | Lifecycle => Some(Any),
            MemberSelected | LibrarySelected => Some(Selection),
            MemberAdded | MemberDeleted | MemberModified => Some(Modification),
            NameModified | DescriptionModified | ExampleModified | DeprecationModified
            | FacetModified => Some(MemberModified),
            ModelLoaded | ValidationCompleted | TypesResolved => Some(Lifecycle),
        }
    }

    /// `true` when `self` equals `other` or descends from it.
    pub fn is_a(&self, other: EventType) -> bool {
        let mut current = Some(*self);
        while let Some(t) = current {
            if t == other {
                return true;
            }
            current = t.parent();
        }
        false
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An immutable notification about a change to a model element.
#[derive(Debug, Clone, PartialEq)]
pub struct DexEvent {
    event_type: EventType,
    source: ControllerId,
    subject: ModelRef,
    detail: Option<String>,
}

impl DexEvent {
    pub fn new(event_type: EventType, source: ControllerId, subject: ModelRef) -> Self {
        Self {
            event_type,
            source,
            subject,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn source(&self) -> ControllerId {
        self.source
    }

    pub fn subject(&self) -> ModelRef {
        self.subject
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

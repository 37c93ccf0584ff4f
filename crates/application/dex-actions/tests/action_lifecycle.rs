use std::sync::{Arc, Mutex, OnceLock, Weak};

use dex_actions::{ActionError, ActionKind, ActionPhase, DexAction, EditTarget, FieldAction, FieldEdit};
use dex_core::{
    Field, InMemoryModelStore, Library, Member, MemberKind, ModelError, ModelStore, Property,
    PropertyDef, SimpleFacets, Value, Version,
};

const NS: &str = "http://example.com/ns/common";

fn core_member(library: uuid::Uuid) -> Member {
    Member::new(
        library,
        "Code",
        MemberKind::Core {
            properties: vec![PropertyDef::new("value", Some("String"))],
            simple: SimpleFacets {
                min_length: Some(2),
                max_length: Some(8),
                ..Default::default()
            },
        },
    )
    .with_description("a code")
}

fn editable_store() -> (Arc<InMemoryModelStore>, Member) {
    let store = InMemoryModelStore::new();
    let lib = store.add_library(Library::new("Common", NS, Version::new(1, 0, 0), true));
    let member = core_member(lib);
    store.add_member(member.clone()).unwrap();
    (Arc::new(store), member)
}

/// A released 1.0 library followed by an editable 1.1, with one member in 1.0.
fn released_store(with_successor: bool) -> (Arc<InMemoryModelStore>, Member) {
    let store = InMemoryModelStore::new();
    let v1 = store.add_library(Library::new("Common", NS, Version::new(1, 0, 0), false));
    if with_successor {
        store.add_library(Library::new("Common", NS, Version::new(1, 1, 0), true));
    }
    let member = Member::new(v1, "Amount", MemberKind::Simple(SimpleFacets::default()));
    let mut snapshot = store.snapshot();
    snapshot.members.push(member.clone());
    (Arc::new(InMemoryModelStore::from_snapshot(snapshot)), member)
}

/// Writes the field, then tries to apply a second change through the same action.
struct ReentrantEdit {
    me: Arc<OnceLock<Weak<FieldAction<ReentrantEdit>>>>,
    nested: Arc<Mutex<Vec<Result<Option<Value>, String>>>>,
}

impl FieldEdit for ReentrantEdit {
    fn kind(&self) -> ActionKind {
        ActionKind::SetMinLength
    }

    fn accepts(member: &Member) -> bool {
        member.has_facets()
    }

    fn set(&self, store: &dyn ModelStore, target: &EditTarget, value: &Value) -> Result<(), ModelError> {
        store.set_field(target.subject, self.field(), value)?;
        if let Some(action) = self.me.get().and_then(Weak::upgrade) {
            let nested = action
                .do_it(None, Some(Value::Number(99)))
                .map_err(|e| e.to_string());
            self.nested.lock().unwrap().push(nested);
        }
        Ok(())
    }
}

#[test]
fn reentrant_change_during_apply_is_ignored() {
    let (store, member) = editable_store();
    let me = Arc::new(OnceLock::new());
    let nested = Arc::new(Mutex::new(Vec::new()));
    let action = Arc::new(FieldAction::new(
        ReentrantEdit {
            me: me.clone(),
            nested: nested.clone(),
        },
        store.clone(),
    ));
    me.set(Arc::downgrade(&action)).unwrap();

    assert!(action.set_subject(&member));
    let committed = action.do_it(None, Some(Value::Number(4))).unwrap();

    assert_eq!(committed, Some(Value::Number(4)));
    assert_eq!(*nested.lock().unwrap(), vec![Ok(None)]);
    assert_eq!(
        store.get_field(member.id, Field::MinLength).unwrap(),
        Some(Value::Number(4))
    );
    assert_eq!(action.old_value(), Some(Value::Number(2)));
    assert_eq!(action.phase(), ActionPhase::Applied);
    assert!(!action.is_busy());
}

#[test]
fn observable_listener_writing_back_does_not_recurse() {
    let (store, member) = editable_store();
    let action = ActionKind::SetMaxLength.instantiate(store.clone());
    assert!(action.set_subject(&member));

    let property = Property::new(Value::Number(8));
    let weak_action = Arc::downgrade(&action);
    let nested = Arc::new(Mutex::new(Vec::new()));
    let seen = nested.clone();
    property.add_listener(move |_, new| {
        if let Some(action) = weak_action.upgrade() {
            let r = action.do_it(None, Some(new.clone())).map_err(|e| e.to_string());
            seen.lock().unwrap().push(r);
        }
    });

    action.do_it(Some(&property), Some(Value::Number(12))).unwrap();

    assert_eq!(property.get(), Value::Number(12));
    assert_eq!(*nested.lock().unwrap(), vec![Ok(None)]);
    assert_eq!(
        store.get_field(member.id, Field::MaxLength).unwrap(),
        Some(Value::Number(12))
    );
}

#[test]
fn every_kind_round_trips_through_do_and_undo() {
    let values = [
        (ActionKind::SetName, Value::from("RenamedCode")),
        (ActionKind::SetDescription, Value::from("documentation")),
        (ActionKind::SetExample, Value::from("AB12")),
        (ActionKind::SetDeprecation, Value::from("use Other")),
        (ActionKind::SetPattern, Value::from("[A-Z]+")),
        (ActionKind::SetMinLength, Value::Number(3)),
        (ActionKind::SetMaxLength, Value::Number(10)),
        (ActionKind::SetFractionDigits, Value::Number(1)),
        (ActionKind::SetTotalDigits, Value::Number(5)),
    ];
    assert_eq!(values.len(), ActionKind::ALL.len());

    for (kind, value) in values {
        let (store, member) = editable_store();
        let action = kind.instantiate(store.clone());
        assert!(action.set_subject(&member), "{kind} rejected a core member");

        let initial = action.get().unwrap().unwrap_or_else(Value::empty);
        let property = Property::new(initial.clone());

        let committed = action.do_it(Some(&property), Some(value.clone())).unwrap();
        assert_eq!(committed, Some(value.clone()), "{kind}");
        assert_eq!(property.get(), value, "{kind}");

        action.undo_it().unwrap();
        assert_eq!(store.member(member.id).unwrap(), member, "{kind}");
        assert_eq!(property.get(), initial, "{kind}");
        assert_eq!(action.phase(), ActionPhase::Undone);

        assert_eq!(action.redo_it().unwrap(), Some(value.clone()), "{kind}");
        assert_eq!(store.get_field(member.id, kind.field()).unwrap(), Some(value));
    }
}

#[test]
fn missing_new_value_is_a_no_op() {
    let (store, member) = editable_store();
    let action = ActionKind::SetDescription.instantiate(store.clone());
    action.set_subject(&member);

    assert_eq!(action.do_it(None, None).unwrap(), None);
    assert_eq!(action.phase(), ActionPhase::SubjectBound);
    assert_eq!(store.member(member.id).unwrap(), member);
}

#[test]
fn incompatible_subject_is_rejected() {
    let (store, _) = editable_store();
    let business = Member::new(
        store.libraries()[0].id,
        "Order",
        MemberKind::Business { properties: vec![] },
    );
    store.add_member(business.clone()).unwrap();

    let action = ActionKind::SetPattern.instantiate(store.clone());
    assert!(!action.set_subject(&business));
    assert_eq!(action.phase(), ActionPhase::Created);
    assert!(matches!(action.get(), Err(ActionError::NoSubject(ActionKind::SetPattern))));
}

#[test]
fn failed_write_releases_the_busy_flag() {
    let (store, member) = editable_store();
    let action = ActionKind::SetMinLength.instantiate(store.clone());
    action.set_subject(&member);
    store.remove_member(member.id).unwrap();

    let err = action.do_it(None, Some(Value::Number(3))).unwrap_err();
    assert!(matches!(err, ActionError::Model(ModelError::UnknownMember(_))));
    assert!(!action.is_busy());
}

#[test]
fn deprecating_a_released_member_creates_and_undo_removes_the_counterpart() {
    let (store, member) = released_store(true);
    let action = ActionKind::SetDeprecation.instantiate(store.clone());
    assert!(action.set_subject(&member));
    assert!(action.is_enabled(&member));

    action.do_it(None, Some(Value::from("use Amount2"))).unwrap();
    let counterpart = action.subject().unwrap();
    assert_ne!(counterpart, member.id);
    assert_eq!(action.original_subject(), Some(member.id));
    assert_eq!(store.members().len(), 2);
    assert_eq!(
        store.get_field(counterpart, Field::Deprecation).unwrap(),
        Some(Value::from("use Amount2"))
    );
    assert_eq!(store.get_field(member.id, Field::Deprecation).unwrap(), None);

    action.undo_it().unwrap();
    assert_eq!(store.members().len(), 1);
    assert!(store.member(counterpart).is_none());
    assert_eq!(action.subject(), Some(member.id));

    action.redo_it().unwrap();
    assert_eq!(store.members().len(), 2);
    let recreated = action.subject().unwrap();
    assert_eq!(
        store.get_field(recreated, Field::Deprecation).unwrap(),
        Some(Value::from("use Amount2"))
    );
}

#[test]
fn existing_counterpart_is_kept_on_undo() {
    let (store, member) = released_store(true);
    let existing = store.next_editable_version(member.id).unwrap().unwrap().member;

    let action = ActionKind::SetDeprecation.instantiate(store.clone());
    action.set_subject(&member);
    action.do_it(None, Some(Value::from("gone"))).unwrap();
    assert_eq!(action.subject(), Some(existing));

    action.undo_it().unwrap();
    assert!(store.member(existing).is_some());
    assert_eq!(store.get_field(existing, Field::Deprecation).unwrap(), None);
}

#[test]
fn deprecation_without_editable_successor_does_nothing() {
    let (store, member) = released_store(false);
    let action = ActionKind::SetDeprecation.instantiate(store.clone());
    assert!(action.set_subject(&member));
    assert!(!action.is_enabled(&member));

    assert_eq!(action.do_it(None, Some(Value::from("old"))).unwrap(), None);
    assert_eq!(action.phase(), ActionPhase::SubjectBound);
    assert_eq!(store.members().len(), 1);
}

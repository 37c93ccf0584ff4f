use std::sync::{Arc, Mutex};

use dex_actions::{
    ActionError, ActionKind, ActionManager, ActionOutcome, AddMemberCommand, DeleteMemberCommand,
};
use dex_core::{
    Field, InMemoryModelStore, Library, LibraryId, Member, MemberKind, ModelRef, ModelStore,
    SimpleFacets, Value, Version,
};
use dex_events::{DexEvent, EventNode, EventType};
use uuid::Uuid;

const NS: &str = "http://example.com/ns/common";

struct Fixture {
    store: Arc<InMemoryModelStore>,
    library: LibraryId,
    code: Member,
}

fn fixture() -> Fixture {
    let store = InMemoryModelStore::new();
    let library = store.add_library(Library::new("Common", NS, Version::new(1, 0, 0), true));
    let code = Member::new(
        library,
        "Code",
        MemberKind::Simple(SimpleFacets {
            min_length: Some(2),
            max_length: Some(8),
            ..Default::default()
        }),
    )
    .with_description("a code");
    store.add_member(code.clone()).unwrap();
    Fixture {
        store: Arc::new(store),
        library,
        code,
    }
}

fn manager(f: &Fixture) -> ActionManager {
    ActionManager::new(f.store.clone(), 100)
}

fn min_length(f: &Fixture) -> Option<Value> {
    f.store.get_field(f.code.id, Field::MinLength).unwrap()
}

#[test]
fn bound_property_edit_and_undo() {
    let f = fixture();
    let manager = manager(&f);
    let property = manager.bind(ActionKind::SetMinLength, f.code.id).unwrap();
    assert_eq!(property.get(), Value::Number(2));

    property.set(Value::Number(4));
    assert_eq!(min_length(&f), Some(Value::Number(4)));
    assert_eq!(manager.undo_len(), 1);
    assert_eq!(manager.peek_undo_label(), Some("set min length"));

    assert!(manager.undo().unwrap());
    assert_eq!(min_length(&f), Some(Value::Number(2)));
    assert_eq!(property.get(), Value::Number(2));
    assert_eq!(manager.undo_len(), 0);

    assert!(manager.redo().unwrap());
    assert_eq!(min_length(&f), Some(Value::Number(4)));
    assert_eq!(property.get(), Value::Number(4));
}

#[test]
fn vetoed_value_is_not_applied_or_recorded() {
    let f = fixture();
    let manager = manager(&f);

    let outcome = manager
        .run(ActionKind::SetMinLength, f.code.id, Value::Number(9))
        .unwrap();
    match outcome {
        ActionOutcome::Vetoed(finding) => assert_eq!(finding.code, "LENGTH_RANGE"),
        other => panic!("expected a veto, got {other:?}"),
    }
    assert_eq!(min_length(&f), Some(Value::Number(2)));
    assert!(!manager.can_undo());
}

#[test]
fn vetoed_bound_value_snaps_back() {
    let f = fixture();
    let manager = manager(&f);
    let property = manager.bind(ActionKind::SetMinLength, f.code.id).unwrap();

    property.set(Value::Number(9));

    assert_eq!(property.get(), Value::Number(2));
    assert_eq!(min_length(&f), Some(Value::Number(2)));
    assert_eq!(manager.undo_len(), 0);
}

#[test]
fn invalid_name_is_vetoed() {
    let f = fixture();
    let outcome = manager(&f)
        .run(ActionKind::SetName, f.code.id, Value::from("two words"))
        .unwrap();
    assert!(matches!(outcome, ActionOutcome::Vetoed(ref finding) if finding.code == "NAME_INVALID"));
}

#[test]
fn read_only_members_are_disabled() {
    let f = fixture();
    let released = f
        .store
        .add_library(Library::new("Legacy", "http://example.com/ns/legacy", Version::new(1, 0, 0), false));
    let mut snapshot = f.store.snapshot();
    let old = Member::new(released, "Old", MemberKind::Simple(SimpleFacets::default()));
    snapshot.members.push(old.clone());
    let store = Arc::new(InMemoryModelStore::from_snapshot(snapshot));
    let manager = ActionManager::new(store.clone(), 10);

    assert!(!manager.is_enabled(ActionKind::SetName, old.id));
    assert!(!manager.is_enabled(ActionKind::SetDeprecation, old.id));
    assert_eq!(
        manager.run(ActionKind::SetName, old.id, Value::from("New")).unwrap(),
        ActionOutcome::Disabled
    );
}

#[test]
fn incompatible_kind_is_an_error() {
    let f = fixture();
    let order = Member::new(f.library, "Order", MemberKind::Business { properties: vec![] });
    f.store.add_member(order.clone()).unwrap();
    let manager = manager(&f);

    assert!(!manager.is_enabled(ActionKind::SetMinLength, order.id));
    assert!(matches!(
        manager.bind(ActionKind::SetMinLength, order.id),
        Err(ActionError::IncompatibleSubject { .. })
    ));
    assert!(matches!(
        manager.run(ActionKind::SetName, Uuid::new_v4(), Value::from("X")),
        Err(ActionError::UnknownMember(_))
    ));
}

#[test]
fn new_edit_clears_redo() {
    let f = fixture();
    let manager = manager(&f);
    manager.run(ActionKind::SetMinLength, f.code.id, Value::Number(3)).unwrap();
    manager.run(ActionKind::SetMinLength, f.code.id, Value::Number(4)).unwrap();
    manager.undo().unwrap();
    assert_eq!(manager.redo_len(), 1);

    manager.run(ActionKind::SetMaxLength, f.code.id, Value::Number(6)).unwrap();
    assert!(!manager.can_redo());
    assert!(!manager.redo().unwrap());
    assert_eq!(manager.undo_len(), 2);
}

#[test]
fn history_is_bounded() {
    let f = fixture();
    let manager = ActionManager::new(f.store.clone(), 2);
    for n in 3..6 {
        manager.run(ActionKind::SetMinLength, f.code.id, Value::Number(n)).unwrap();
    }
    assert_eq!(manager.undo_len(), 2);

    while manager.undo().unwrap() {}
    assert_eq!(min_length(&f), Some(Value::Number(3)));
}

#[test]
fn undo_on_empty_history_reports_nothing_done() {
    let f = fixture();
    let manager = manager(&f);
    assert!(!manager.undo().unwrap());
    manager.run(ActionKind::SetDescription, f.code.id, Value::from("x")).unwrap();
    manager.clear();
    assert!(!manager.can_undo());
}

#[test]
fn modification_events_follow_do_and_undo() {
    let f = fixture();
    let manager = manager(&f);
    let node = EventNode::new(Uuid::new_v4());
    let received: Arc<Mutex<Vec<DexEvent>>> = Arc::default();
    let sink = received.clone();
    node.add_handler(EventType::MemberModified, Uuid::new_v4(), move |e| {
        sink.lock().unwrap().push(e.clone());
    });
    manager.set_publisher(node);

    manager.run(ActionKind::SetMinLength, f.code.id, Value::Number(5)).unwrap();
    manager.undo().unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].event_type(), EventType::FacetModified);
    assert_eq!(received[0].subject(), ModelRef::Member(f.code.id));
    assert_eq!(received[0].detail(), Some("do"));
    assert_eq!(received[1].detail(), Some("undo"));
}

#[test]
fn deprecation_of_released_member_goes_through_history() {
    let store = InMemoryModelStore::new();
    let v1 = store.add_library(Library::new("Common", NS, Version::new(1, 0, 0), false));
    store.add_library(Library::new("Common", NS, Version::new(1, 1, 0), true));
    let mut snapshot = store.snapshot();
    let amount = Member::new(v1, "Amount", MemberKind::Simple(SimpleFacets::default()));
    snapshot.members.push(amount.clone());
    let store = Arc::new(InMemoryModelStore::from_snapshot(snapshot));
    let manager = ActionManager::new(store.clone(), 10);

    assert!(manager.is_enabled(ActionKind::SetDeprecation, amount.id));
    let outcome = manager
        .run(ActionKind::SetDeprecation, amount.id, Value::from("use Money"))
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Applied(Some(Value::from("use Money"))));
    assert_eq!(store.members().len(), 2);

    manager.undo().unwrap();
    assert_eq!(store.members(), vec![amount]);
}

#[test]
fn deprecation_chain_on_released_member_redoes_onto_recreated_counterpart() {
    let store = InMemoryModelStore::new();
    let v1 = store.add_library(Library::new("Common", NS, Version::new(1, 0, 0), false));
    store.add_library(Library::new("Common", NS, Version::new(1, 1, 0), true));
    let mut snapshot = store.snapshot();
    let amount = Member::new(v1, "Amount", MemberKind::Simple(SimpleFacets::default()));
    snapshot.members.push(amount.clone());
    let store = Arc::new(InMemoryModelStore::from_snapshot(snapshot));
    let manager = ActionManager::new(store.clone(), 10);
    let counterpart_deprecation = |store: &InMemoryModelStore| {
        let counterpart = store
            .members()
            .into_iter()
            .find(|m| m.id != amount.id)
            .expect("counterpart exists");
        store.get_field(counterpart.id, Field::Deprecation).unwrap()
    };

    manager
        .run(ActionKind::SetDeprecation, amount.id, Value::from("first"))
        .unwrap();
    manager
        .run(ActionKind::SetDeprecation, amount.id, Value::from("second"))
        .unwrap();
    assert_eq!(store.members().len(), 2);
    assert_eq!(counterpart_deprecation(&store), Some(Value::from("second")));

    assert!(manager.undo().unwrap());
    assert!(manager.undo().unwrap());
    assert_eq!(store.members(), vec![amount.clone()]);

    assert!(manager.redo().unwrap());
    assert!(manager.redo().unwrap());
    assert_eq!(store.members().len(), 2);
    assert_eq!(counterpart_deprecation(&store), Some(Value::from("second")));
    assert_eq!(store.get_field(amount.id, Field::Deprecation).unwrap(), None);

    assert!(manager.undo().unwrap());
    assert_eq!(counterpart_deprecation(&store), Some(Value::from("first")));
    assert!(manager.undo().unwrap());
    assert_eq!(store.members(), vec![amount]);
}

#[test]
fn commands_are_undoable() {
    let f = fixture();
    let manager = manager(&f);

    let added = Member::new(f.library, "Amount", MemberKind::Simple(SimpleFacets::default()));
    let id = manager.execute(AddMemberCommand::new(added)).unwrap();
    assert!(f.store.member(id).is_some());
    assert_eq!(manager.peek_undo_label(), Some("add member"));

    manager.undo().unwrap();
    assert!(f.store.member(id).is_none());
    manager.redo().unwrap();
    assert!(f.store.member(id).is_some());

    let removed = manager.execute(DeleteMemberCommand::new(f.code.id)).unwrap();
    assert_eq!(removed.name, "Code");
    assert!(f.store.member(f.code.id).is_none());

    manager.undo().unwrap();
    assert_eq!(f.store.member(f.code.id), Some(f.code.clone()));
}

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use collnav_app::{
    FeedbackKind, FeedbackWindows, ListId, ListPatch, ListsSession, LoginField, LoginForm,
    RequestKind, Revision, SessionCommand, SessionEvent, ViewerContext,
};
use collnav_testkit::{
    ListsFaker, ManualTimers, MemoryLists, RecordingBackend, Request, abc_snapshot, ids,
    sample_collection,
};
use serde_json::json;
use std::time::Duration;

fn admin_session() -> ListsSession {
    ListsSession::mount(
        sample_collection(),
        abc_snapshot(1),
        ViewerContext::admin(),
        FeedbackWindows::default(),
    )
}

fn titles(session: &ListsSession) -> Vec<String> {
    session.lists().iter().map(|list| list.title.clone()).collect()
}

/// Dispatches a command, then refreshes the session from the store the way a
/// host would after every write.
fn run(
    session: &mut ListsSession,
    store: &mut MemoryLists,
    timers: &mut ManualTimers,
    command: SessionCommand,
) -> Vec<SessionEvent> {
    let mut events = session.dispatch(store, command);
    let snapshot = store.snapshot();
    if snapshot.revision > session.revision() {
        events.extend(session.dispatch(store, SessionCommand::ListsUpdated(snapshot)));
    }
    timers.observe(&events);
    events
}

#[test]
fn created_list_shows_confirmation_until_window_elapses() {
    let mut store = MemoryLists::new(sample_collection(), abc_snapshot(1));
    let mut timers = ManualTimers::new();
    let mut session = admin_session();

    run(
        &mut session,
        &mut store,
        &mut timers,
        SessionCommand::SetDraftTitle("Reading".to_owned()),
    );
    let events = run(
        &mut session,
        &mut store,
        &mut timers,
        SessionCommand::SubmitDraft,
    );

    assert!(events.contains(&SessionEvent::CreateConfirmed {
        title: "Reading".to_owned()
    }));
    assert_eq!(titles(&session), vec!["A", "B", "C", "Reading"]);
    assert!(session.just_created());
    assert_eq!(session.draft_title(), "");

    assert!(timers.advance(Duration::from_millis(2_999)).is_empty());
    assert!(session.just_created());

    for command in timers.advance(Duration::from_millis(1)) {
        session.dispatch(&mut store, command);
    }
    assert!(!session.just_created());
    assert!(session.create_state().is_idle());
}

#[test]
fn committed_drag_sends_local_order() {
    let mut backend = RecordingBackend::new();
    let mut session = admin_session();

    session.dispatch(&mut backend, SessionCommand::MoveLocal { from: 0, to: 2 });
    session.dispatch(&mut backend, SessionCommand::CommitOrder);

    assert_eq!(
        backend.requests,
        vec![Request::Reorder {
            key: sample_collection().key(),
            order: ids(&[2, 3, 1]),
        }]
    );
}

#[test]
fn reorder_round_trips_through_store() {
    let mut store = MemoryLists::new(sample_collection(), abc_snapshot(1));
    let mut timers = ManualTimers::new();
    let mut session = admin_session();

    run(
        &mut session,
        &mut store,
        &mut timers,
        SessionCommand::MoveLocal { from: 2, to: 0 },
    );
    let events = run(
        &mut session,
        &mut store,
        &mut timers,
        SessionCommand::CommitOrder,
    );

    assert!(events.contains(&SessionEvent::ListsReseeded {
        revision: Revision::new(2),
        count: 3
    }));
    assert_eq!(titles(&session), vec!["C", "A", "B"]);
    assert_eq!(store.snapshot().ids(), ids(&[3, 1, 2]));
}

#[test]
fn random_drags_preserve_membership() -> Result<()> {
    let mut faker = ListsFaker::new(42);
    let snapshot = faker.snapshot(1, 8);
    let expected = snapshot.id_set();
    let mut session = ListsSession::mount(
        sample_collection(),
        snapshot,
        ViewerContext::admin(),
        FeedbackWindows::default(),
    );
    let mut backend = RecordingBackend::new();

    for _ in 0..50 {
        let (from, to) = faker.drag(session.lists().len())?;
        session.dispatch(&mut backend, SessionCommand::MoveLocal { from, to });
        let held: std::collections::BTreeSet<ListId> = session.list_ids().into_iter().collect();
        assert_eq!(held, expected);
    }
    assert!(backend.requests.is_empty());
    Ok(())
}

#[test]
fn edit_race_keeps_feedback_on_latest_list() {
    let mut store = MemoryLists::new(sample_collection(), abc_snapshot(1));
    let mut timers = ManualTimers::new();
    let mut session = admin_session();

    // Both requests go out before either confirmation lands.
    session.dispatch(
        &mut store,
        SessionCommand::EditList {
            id: ListId::new(1),
            patch: ListPatch::title("A2"),
        },
    );
    let events = session.dispatch(
        &mut store,
        SessionCommand::EditList {
            id: ListId::new(2),
            patch: ListPatch::title("B2"),
        },
    );
    assert_eq!(
        events[0],
        SessionEvent::EditSuperseded {
            previous: ListId::new(1)
        }
    );

    let snapshot = store.snapshot();
    let confirmed = session.dispatch(&mut store, SessionCommand::ListsUpdated(snapshot));
    timers.observe(&confirmed);
    assert!(session.just_edited(ListId::new(2)));
    assert!(!session.just_edited(ListId::new(1)));
    assert_eq!(titles(&session), vec!["A2", "B2", "C"]);

    for command in timers.advance(Duration::from_secs(5)) {
        session.dispatch(&mut store, command);
    }
    assert!(session.edit_state().is_idle());
}

#[test]
fn failed_create_can_be_retried_after_dismissal() {
    let mut backend = RecordingBackend::new();
    backend.fail_next(
        RequestKind::Create,
        collnav_app::BackendError::rejected(RequestKind::Create, "title taken"),
    );
    let mut session = admin_session();

    session.dispatch(&mut backend, SessionCommand::SetDraftTitle("Reading".to_owned()));
    let events = session.dispatch(&mut backend, SessionCommand::SubmitDraft);
    assert_eq!(
        events,
        vec![SessionEvent::RequestFailed {
            kind: RequestKind::Create,
            message: "create request rejected: title taken".to_owned(),
        }]
    );
    assert_eq!(session.draft_title(), "Reading");

    session.dispatch(&mut backend, SessionCommand::DismissFailure(FeedbackKind::Create));
    let retried = session.dispatch(&mut backend, SessionCommand::SubmitDraft);
    assert_eq!(
        retried,
        vec![SessionEvent::CreateRequested {
            title: "Reading".to_owned()
        }]
    );
    assert_eq!(backend.count(RequestKind::Create), 2);
}

#[test]
fn public_visitor_never_sees_private_lists_after_update() {
    let mut backend = RecordingBackend::new();
    let mut session = ListsSession::mount(
        sample_collection(),
        abc_snapshot(1),
        ViewerContext::public_visitor(),
        FeedbackWindows::default(),
    );
    let mut updated = abc_snapshot(2);
    updated.lists[0].public = false;

    session.dispatch(&mut backend, SessionCommand::ListsUpdated(updated));
    assert_eq!(titles(&session), vec!["B", "C"]);
    assert!(!session.page_index_visible());
}

#[test]
fn events_serialize_with_event_tag() -> Result<()> {
    let mut backend = RecordingBackend::new();
    let mut session = admin_session();
    let events = session.dispatch(&mut backend, SessionCommand::MoveLocal { from: 0, to: 9 });

    assert_eq!(
        serde_json::to_value(&events[0])?,
        json!({"event": "move_rejected", "from": 0, "to": 9, "len": 3})
    );

    session.dispatch(&mut backend, SessionCommand::MoveLocal { from: 0, to: 1 });
    let committed = session.dispatch(&mut backend, SessionCommand::CommitOrder);
    assert_eq!(
        serde_json::to_value(&committed[0])?,
        json!({"event": "reorder_requested", "order": [2, 1, 3]})
    );
    Ok(())
}

#[test]
fn login_payload_uses_collaborator_field_names() -> Result<()> {
    let mut form = LoginForm::default();
    form.set_text(LoginField::Username, "alice");
    form.set_text(LoginField::Password, "hunter2");
    form.toggle_remember_me();
    form.toggle_move_temp();
    form.set_text(LoginField::ToColl, "Imported");

    assert_eq!(
        serde_json::to_value(form.submit()?)?,
        json!({
            "username": "alice",
            "password": "hunter2",
            "remember_me": "1",
            "moveTemp": true,
            "toColl": "Imported",
        })
    );
    Ok(())
}

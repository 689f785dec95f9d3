// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

use crate::backend::ListsBackend;
use crate::feedback::{FeedbackSlot, FeedbackTimers, FeedbackToken, SlotState};
use crate::forms::normalize_list_title;
use crate::{
    Collection, FeedbackKind, FeedbackWindows, ListEntry, ListId, ListPatch, ListsSnapshot,
    RequestKind, Revision, ViewerContext,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    SetDraftTitle(String),
    ClearDraft,
    SubmitDraft,
    CreateList(String),
    EditList { id: ListId, patch: ListPatch },
    DeleteList(ListId),
    MoveLocal { from: usize, to: usize },
    CommitOrder,
    ToggleIndexVisibility,
    ListsUpdated(ListsSnapshot),
    CollectionUpdated(Collection),
    FeedbackElapsed(FeedbackToken),
    RequestFailed { kind: RequestKind, message: String },
    DismissFailure(FeedbackKind),
    TogglePanel,
    SetPanelOpen(bool),
    OpenEditModal,
    CloseEditModal,
    SetActiveList(Option<ListId>),
}

impl SessionCommand {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetDraftTitle(_) => "set_draft_title",
            Self::ClearDraft => "clear_draft",
            Self::SubmitDraft => "submit_draft",
            Self::CreateList(_) => "create_list",
            Self::EditList { .. } => "edit_list",
            Self::DeleteList(_) => "delete_list",
            Self::MoveLocal { .. } => "move_local",
            Self::CommitOrder => "commit_order",
            Self::ToggleIndexVisibility => "toggle_index_visibility",
            Self::ListsUpdated(_) => "lists_updated",
            Self::CollectionUpdated(_) => "collection_updated",
            Self::FeedbackElapsed(_) => "feedback_elapsed",
            Self::RequestFailed { .. } => "request_failed",
            Self::DismissFailure(_) => "dismiss_failure",
            Self::TogglePanel => "toggle_panel",
            Self::SetPanelOpen(_) => "set_panel_open",
            Self::OpenEditModal => "open_edit_modal",
            Self::CloseEditModal => "close_edit_modal",
            Self::SetActiveList(_) => "set_active_list",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NotLoaded,
    NotPermitted,
    CreateInFlight,
    UnknownList(ListId),
    InvalidInput(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    DraftChanged { title: String },
    CreateRequested { title: String },
    EditRequested { id: ListId },
    EditSuperseded { previous: ListId },
    DeleteRequested { id: ListId },
    ReorderRequested { order: Vec<ListId> },
    VisibilityRequested { public_index: bool },
    LocalMoved { from: usize, to: usize },
    MoveRejected { from: usize, to: usize, len: usize },
    ReorderAbandoned,
    ListsReseeded { revision: Revision, count: usize },
    ListsMerged { revision: Revision },
    SnapshotIgnored { revision: Revision },
    CreateConfirmed { title: String },
    EditConfirmed { id: ListId },
    FeedbackScheduled { token: FeedbackToken, after_ms: u64 },
    FeedbackCleared { kind: FeedbackKind },
    RequestFailed { kind: RequestKind, message: String },
    FailureDismissed { kind: FeedbackKind },
    Rejected { reason: RejectReason },
    CollectionChanged { public_index: bool },
    PanelOpenChanged { open: bool },
    EditModalChanged { open: bool },
    ActiveListChanged { id: Option<ListId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderState {
    Idle,
    Dragging,
}

/// Client-side controller for the collection's lists panel.
///
/// Holds the locally visible list order and the create/edit feedback slots, and
/// reconciles them against authoritative snapshots as they arrive. Nothing is
/// guessed ahead of confirmation except drag reordering, which only permutes the
/// local sequence until [`SessionCommand::CommitOrder`].
#[derive(Debug, Clone)]
pub struct ListsSession {
    collection: Collection,
    viewer: ViewerContext,
    active_list: Option<ListId>,
    revision: Revision,
    lists: Vec<ListEntry>,
    reorder: ReorderState,
    create: FeedbackSlot<String>,
    edit: FeedbackSlot<ListId>,
    timers: FeedbackTimers,
    draft_title: String,
    panel_collapsed: bool,
    edit_modal_open: bool,
}

impl ListsSession {
    pub fn mount(
        collection: Collection,
        snapshot: ListsSnapshot,
        viewer: ViewerContext,
        windows: FeedbackWindows,
    ) -> Self {
        let lists = visible_lists(viewer, snapshot.lists);
        debug!(
            owner = %collection.owner,
            collection = %collection.id,
            revision = %snapshot.revision,
            count = lists.len(),
            "mounted lists session"
        );
        Self {
            collection,
            viewer,
            active_list: None,
            revision: snapshot.revision,
            lists,
            reorder: ReorderState::Idle,
            create: FeedbackSlot::new(),
            edit: FeedbackSlot::new(),
            timers: FeedbackTimers::new(windows),
            draft_title: String::new(),
            panel_collapsed: false,
            edit_modal_open: false,
        }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn viewer(&self) -> ViewerContext {
        self.viewer
    }

    pub fn lists(&self) -> &[ListEntry] {
        &self.lists
    }

    pub fn list_ids(&self) -> Vec<ListId> {
        self.lists.iter().map(|list| list.id).collect()
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn windows(&self) -> FeedbackWindows {
        self.timers.windows()
    }

    pub fn draft_title(&self) -> &str {
        &self.draft_title
    }

    pub fn create_state(&self) -> &SlotState<String> {
        self.create.state()
    }

    pub fn edit_state(&self) -> &SlotState<ListId> {
        self.edit.state()
    }

    pub fn is_creating(&self) -> bool {
        self.create.state().is_pending()
    }

    pub fn just_created(&self) -> bool {
        self.create.state().is_confirmed()
    }

    pub fn editing_id(&self) -> Option<ListId> {
        match self.edit.state() {
            SlotState::Pending(id) => Some(*id),
            _ => None,
        }
    }

    pub fn just_edited(&self, id: ListId) -> bool {
        matches!(self.edit.state(), SlotState::Confirmed { key, .. } if *key == id)
    }

    pub fn reorder_state(&self) -> ReorderState {
        self.reorder
    }

    pub fn panel_collapsed(&self) -> bool {
        self.panel_collapsed
    }

    pub fn edit_modal_open(&self) -> bool {
        self.edit_modal_open
    }

    pub fn active_list(&self) -> Option<ListId> {
        self.active_list
    }

    /// Nothing is shown until the collection record has finished loading.
    pub fn is_ready(&self) -> bool {
        self.collection.loaded
    }

    pub fn is_selected(&self, id: ListId) -> bool {
        self.active_list == Some(id)
    }

    pub fn page_index_visible(&self) -> bool {
        self.collection.public_index || self.viewer.can_admin
    }

    pub fn can_submit_draft(&self) -> bool {
        normalize_list_title(&self.draft_title).is_some() && !self.is_creating()
    }

    pub fn dispatch<B>(&mut self, backend: &mut B, command: SessionCommand) -> Vec<SessionEvent>
    where
        B: ListsBackend + ?Sized,
    {
        debug!(command = command.name(), "lists session dispatch");
        match command {
            SessionCommand::SetDraftTitle(title) => {
                self.draft_title = title;
                vec![self.draft_changed()]
            }
            SessionCommand::ClearDraft => {
                self.draft_title.clear();
                vec![self.draft_changed()]
            }
            SessionCommand::SubmitDraft => {
                if self.is_creating() {
                    return vec![reject(RejectReason::CreateInFlight)];
                }
                let title = self.draft_title.clone();
                self.create_list(backend, &title)
            }
            SessionCommand::CreateList(title) => self.create_list(backend, &title),
            SessionCommand::EditList { id, patch } => self.edit_list(backend, id, patch),
            SessionCommand::DeleteList(id) => self.delete_list(backend, id),
            SessionCommand::MoveLocal { from, to } => self.move_local(from, to),
            SessionCommand::CommitOrder => self.commit_order(backend),
            SessionCommand::ToggleIndexVisibility => self.toggle_index_visibility(backend),
            SessionCommand::ListsUpdated(snapshot) => self.apply_snapshot(snapshot),
            SessionCommand::CollectionUpdated(collection) => {
                self.collection = collection;
                vec![SessionEvent::CollectionChanged {
                    public_index: self.collection.public_index,
                }]
            }
            SessionCommand::FeedbackElapsed(token) => self.expire_feedback(token),
            SessionCommand::RequestFailed { kind, message } => self.request_failed(kind, message),
            SessionCommand::DismissFailure(kind) => {
                let dismissed = match kind {
                    FeedbackKind::Create => self.create.dismiss(),
                    FeedbackKind::Edit => self.edit.dismiss(),
                };
                if dismissed {
                    vec![SessionEvent::FailureDismissed { kind }]
                } else {
                    Vec::new()
                }
            }
            SessionCommand::TogglePanel => {
                let open = self.panel_collapsed;
                self.set_panel_open(backend, open)
            }
            SessionCommand::SetPanelOpen(open) => {
                if self.panel_collapsed != open {
                    return Vec::new();
                }
                self.set_panel_open(backend, open)
            }
            SessionCommand::OpenEditModal => {
                if !self.viewer.can_admin {
                    return vec![reject(RejectReason::NotPermitted)];
                }
                self.edit_modal_open = true;
                vec![SessionEvent::EditModalChanged { open: true }]
            }
            SessionCommand::CloseEditModal => {
                self.edit_modal_open = false;
                vec![SessionEvent::EditModalChanged { open: false }]
            }
            SessionCommand::SetActiveList(id) => {
                self.active_list = id;
                vec![SessionEvent::ActiveListChanged { id }]
            }
        }
    }

    fn create_list<B>(&mut self, backend: &mut B, raw_title: &str) -> Vec<SessionEvent>
    where
        B: ListsBackend + ?Sized,
    {
        if let Some(reason) = self.mutation_guard() {
            return vec![reject(reason)];
        }
        let Some(title) = normalize_list_title(raw_title) else {
            return Vec::new();
        };

        let mut events = Vec::new();
        if self.create.begin(title.clone()).is_confirmed() {
            events.push(SessionEvent::FeedbackCleared {
                kind: FeedbackKind::Create,
            });
        }

        let key = self.collection.key();
        match backend.create_list(&key, &title) {
            Ok(()) => events.push(SessionEvent::CreateRequested { title }),
            Err(error) => events.extend(self.request_failed(RequestKind::Create, error.to_string())),
        }
        events
    }

    fn edit_list<B>(&mut self, backend: &mut B, id: ListId, patch: ListPatch) -> Vec<SessionEvent>
    where
        B: ListsBackend + ?Sized,
    {
        if let Some(reason) = self.mutation_guard() {
            return vec![reject(reason)];
        }
        if patch.is_empty() {
            return Vec::new();
        }
        if !self.contains(id) {
            return vec![reject(RejectReason::UnknownList(id))];
        }
        if let Err(error) = patch.validate() {
            return vec![reject(RejectReason::InvalidInput(error.to_string()))];
        }

        let mut events = Vec::new();
        let previous = self.edit.begin(id);
        if let Some(previous_id) = previous.key().copied()
            && previous_id != id
            && !previous.is_failed()
        {
            debug!(previous = %previous_id, next = %id, "edit feedback redirected");
            events.push(SessionEvent::EditSuperseded {
                previous: previous_id,
            });
        }
        if previous.is_confirmed() {
            events.push(SessionEvent::FeedbackCleared {
                kind: FeedbackKind::Edit,
            });
        }

        let key = self.collection.key();
        match backend.edit_list(&key, id, &patch) {
            Ok(()) => events.push(SessionEvent::EditRequested { id }),
            Err(error) => events.extend(self.request_failed(RequestKind::Edit, error.to_string())),
        }
        events
    }

    fn delete_list<B>(&mut self, backend: &mut B, id: ListId) -> Vec<SessionEvent>
    where
        B: ListsBackend + ?Sized,
    {
        if let Some(reason) = self.mutation_guard() {
            return vec![reject(reason)];
        }
        if !self.contains(id) {
            return vec![reject(RejectReason::UnknownList(id))];
        }

        let key = self.collection.key();
        match backend.delete_list(&key, id) {
            Ok(()) => vec![SessionEvent::DeleteRequested { id }],
            Err(error) => self.request_failed(RequestKind::Delete, error.to_string()),
        }
    }

    fn move_local(&mut self, from: usize, to: usize) -> Vec<SessionEvent> {
        if let Some(reason) = self.mutation_guard() {
            return vec![reject(reason)];
        }
        let len = self.lists.len();
        if from >= len || to >= len {
            warn!(from, to, len, "drag move outside list bounds ignored");
            return vec![SessionEvent::MoveRejected { from, to, len }];
        }
        if from == to {
            return Vec::new();
        }

        let moved = self.lists.remove(from);
        self.lists.insert(to, moved);
        self.reorder = ReorderState::Dragging;
        vec![SessionEvent::LocalMoved { from, to }]
    }

    fn commit_order<B>(&mut self, backend: &mut B) -> Vec<SessionEvent>
    where
        B: ListsBackend + ?Sized,
    {
        if let Some(reason) = self.mutation_guard() {
            return vec![reject(reason)];
        }

        let order = self.list_ids();
        self.reorder = ReorderState::Idle;
        let key = self.collection.key();
        match backend.reorder_lists(&key, &order) {
            Ok(()) => vec![SessionEvent::ReorderRequested { order }],
            Err(error) => self.request_failed(RequestKind::Reorder, error.to_string()),
        }
    }

    fn toggle_index_visibility<B>(&mut self, backend: &mut B) -> Vec<SessionEvent>
    where
        B: ListsBackend + ?Sized,
    {
        if let Some(reason) = self.mutation_guard() {
            return vec![reject(reason)];
        }

        let public_index = !self.collection.public_index;
        let key = self.collection.key();
        match backend.set_collection_visibility(&key, public_index) {
            Ok(()) => vec![SessionEvent::VisibilityRequested { public_index }],
            Err(error) => self.request_failed(RequestKind::Visibility, error.to_string()),
        }
    }

    fn apply_snapshot(&mut self, snapshot: ListsSnapshot) -> Vec<SessionEvent> {
        if snapshot.revision <= self.revision {
            debug!(
                held = %self.revision,
                incoming = %snapshot.revision,
                "ignoring stale lists snapshot"
            );
            return vec![SessionEvent::SnapshotIgnored {
                revision: snapshot.revision,
            }];
        }

        let revision = snapshot.revision;
        let incoming = visible_lists(self.viewer, snapshot.lists);
        let mut events = Vec::new();

        match self.reorder {
            ReorderState::Dragging if same_id_set(&self.lists, &incoming) => {
                self.lists = merge_in_local_order(&self.lists, incoming);
                events.push(SessionEvent::ListsMerged { revision });
            }
            ReorderState::Dragging => {
                info!(%revision, "list membership changed mid-drag; local order discarded");
                self.reorder = ReorderState::Idle;
                self.lists = incoming;
                events.push(SessionEvent::ReorderAbandoned);
                events.push(SessionEvent::ListsReseeded {
                    revision,
                    count: self.lists.len(),
                });
            }
            ReorderState::Idle => {
                self.lists = incoming;
                events.push(SessionEvent::ListsReseeded {
                    revision,
                    count: self.lists.len(),
                });
            }
        }
        self.revision = revision;

        if self.create.state().is_pending() {
            let (token, after) = self.timers.schedule(FeedbackKind::Create);
            if let Some(title) = self.create.confirm(token) {
                info!(%title, "list creation confirmed");
                self.draft_title.clear();
                events.push(SessionEvent::CreateConfirmed { title });
                events.push(self.draft_changed());
                events.push(SessionEvent::FeedbackScheduled {
                    token,
                    after_ms: duration_millis(after),
                });
            }
        }

        if self.edit.state().is_pending() {
            let (token, after) = self.timers.schedule(FeedbackKind::Edit);
            if let Some(id) = self.edit.confirm(token) {
                info!(%id, "list edit confirmed");
                events.push(SessionEvent::EditConfirmed { id });
                events.push(SessionEvent::FeedbackScheduled {
                    token,
                    after_ms: duration_millis(after),
                });
            }
        }

        events
    }

    fn expire_feedback(&mut self, token: FeedbackToken) -> Vec<SessionEvent> {
        let cleared = match token.kind {
            FeedbackKind::Create => self.create.expire(token).is_some(),
            FeedbackKind::Edit => self.edit.expire(token).is_some(),
        };
        if cleared {
            vec![SessionEvent::FeedbackCleared { kind: token.kind }]
        } else {
            debug!(kind = token.kind.as_str(), seq = token.seq, "stale feedback timer");
            Vec::new()
        }
    }

    fn request_failed(&mut self, kind: RequestKind, message: String) -> Vec<SessionEvent> {
        warn!(kind = kind.as_str(), %message, "lists request failed");
        match kind.feedback_kind() {
            Some(FeedbackKind::Create) => {
                self.create.fail(message.clone());
            }
            Some(FeedbackKind::Edit) => {
                self.edit.fail(message.clone());
            }
            None => {}
        }
        vec![SessionEvent::RequestFailed { kind, message }]
    }

    fn set_panel_open<B>(&mut self, backend: &mut B, open: bool) -> Vec<SessionEvent>
    where
        B: ListsBackend + ?Sized,
    {
        self.panel_collapsed = !open;
        backend.notify_panel_open_state(open);
        vec![SessionEvent::PanelOpenChanged { open }]
    }

    fn mutation_guard(&self) -> Option<RejectReason> {
        if !self.collection.loaded {
            Some(RejectReason::NotLoaded)
        } else if !self.viewer.can_admin {
            Some(RejectReason::NotPermitted)
        } else {
            None
        }
    }

    fn contains(&self, id: ListId) -> bool {
        self.lists.iter().any(|list| list.id == id)
    }

    fn draft_changed(&self) -> SessionEvent {
        SessionEvent::DraftChanged {
            title: self.draft_title.clone(),
        }
    }
}

fn reject(reason: RejectReason) -> SessionEvent {
    debug!(?reason, "lists command rejected");
    SessionEvent::Rejected { reason }
}

fn visible_lists(viewer: ViewerContext, lists: Vec<ListEntry>) -> Vec<ListEntry> {
    if viewer.as_public {
        lists.into_iter().filter(|list| list.public).collect()
    } else {
        lists
    }
}

fn same_id_set(local: &[ListEntry], incoming: &[ListEntry]) -> bool {
    let local: BTreeSet<ListId> = local.iter().map(|list| list.id).collect();
    let incoming: BTreeSet<ListId> = incoming.iter().map(|list| list.id).collect();
    local == incoming
}

/// Fresh content from `incoming`, arranged in the order of `local`.
fn merge_in_local_order(local: &[ListEntry], incoming: Vec<ListEntry>) -> Vec<ListEntry> {
    let mut by_id: HashMap<ListId, ListEntry> =
        incoming.into_iter().map(|list| (list.id, list)).collect();
    local
        .iter()
        .filter_map(|list| by_id.remove(&list.id))
        .collect()
}

fn duration_millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

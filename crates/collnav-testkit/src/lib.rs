// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use collnav_app::{
    BackendError, Collection, CollectionId, CollectionKey, FeedbackToken, ListEntry, ListId,
    ListPatch, ListsBackend, ListsSnapshot, OwnerId, RequestKind, Revision, SessionCommand,
    SessionEvent,
};
use std::path::PathBuf;
use std::time::Duration;

const LIST_TITLES: [&str; 16] = [
    "Reading",
    "Field Recordings",
    "Press Clippings",
    "Later",
    "Favorites",
    "Research",
    "Zines",
    "Oral Histories",
    "Exhibits",
    "Drafts",
    "Sources",
    "Maps",
    "Interviews",
    "Podcasts",
    "Archive Picks",
    "Talks",
];

const LIST_QUALIFIERS: [&str; 6] = ["2024", "Vol. 2", "Shortlist", "Misc", "Team", "Old"];

pub fn sample_collection() -> Collection {
    Collection {
        owner: OwnerId::new("alice"),
        id: CollectionId::new("field-notes"),
        loaded: true,
        title: "Field Notes".to_owned(),
        description: "Things worth keeping.".to_owned(),
        public_index: false,
    }
}

pub fn list_entry(id: i64, title: &str) -> ListEntry {
    ListEntry {
        id: ListId::new(id),
        title: title.to_owned(),
        description: None,
        public: true,
    }
}

/// Lists A, B, C with ids 1, 2, 3.
pub fn abc_snapshot(revision: u64) -> ListsSnapshot {
    ListsSnapshot::new(
        Revision::new(revision),
        vec![list_entry(1, "A"), list_entry(2, "B"), list_entry(3, "C")],
    )
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("collnav.db");
    Ok((dir, db_path))
}

pub fn ids(values: &[i64]) -> Vec<ListId> {
    values.iter().copied().map(ListId::new).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Create {
        key: CollectionKey,
        title: String,
    },
    Edit {
        key: CollectionKey,
        id: ListId,
        patch: ListPatch,
    },
    Delete {
        key: CollectionKey,
        id: ListId,
    },
    Reorder {
        key: CollectionKey,
        order: Vec<ListId>,
    },
    Visibility {
        key: CollectionKey,
        public_index: bool,
    },
}

impl Request {
    pub const fn kind(&self) -> RequestKind {
        match self {
            Self::Create { .. } => RequestKind::Create,
            Self::Edit { .. } => RequestKind::Edit,
            Self::Delete { .. } => RequestKind::Delete,
            Self::Reorder { .. } => RequestKind::Reorder,
            Self::Visibility { .. } => RequestKind::Visibility,
        }
    }
}

/// Backend double that records every dispatched request.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub requests: Vec<Request>,
    pub panel_notifications: Vec<bool>,
    failing: Vec<(RequestKind, BackendError)>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next request of `kind` fails synchronously with `error`.
    pub fn fail_next(&mut self, kind: RequestKind, error: BackendError) {
        self.failing.push((kind, error));
    }

    pub fn last(&self) -> Option<&Request> {
        self.requests.last()
    }

    pub fn count(&self, kind: RequestKind) -> usize {
        self.requests
            .iter()
            .filter(|request| request.kind() == kind)
            .count()
    }

    fn record(&mut self, request: Request) -> Result<(), BackendError> {
        let kind = request.kind();
        self.requests.push(request);
        match self.failing.iter().position(|(k, _)| *k == kind) {
            Some(index) => Err(self.failing.remove(index).1),
            None => Ok(()),
        }
    }
}

impl ListsBackend for RecordingBackend {
    fn create_list(&mut self, key: &CollectionKey, title: &str) -> Result<(), BackendError> {
        self.record(Request::Create {
            key: key.clone(),
            title: title.to_owned(),
        })
    }

    fn edit_list(
        &mut self,
        key: &CollectionKey,
        list_id: ListId,
        patch: &ListPatch,
    ) -> Result<(), BackendError> {
        self.record(Request::Edit {
            key: key.clone(),
            id: list_id,
            patch: patch.clone(),
        })
    }

    fn delete_list(&mut self, key: &CollectionKey, list_id: ListId) -> Result<(), BackendError> {
        self.record(Request::Delete {
            key: key.clone(),
            id: list_id,
        })
    }

    fn reorder_lists(
        &mut self,
        key: &CollectionKey,
        order: &[ListId],
    ) -> Result<(), BackendError> {
        self.record(Request::Reorder {
            key: key.clone(),
            order: order.to_vec(),
        })
    }

    fn set_collection_visibility(
        &mut self,
        key: &CollectionKey,
        public_index: bool,
    ) -> Result<(), BackendError> {
        self.record(Request::Visibility {
            key: key.clone(),
            public_index,
        })
    }

    fn notify_panel_open_state(&mut self, is_open: bool) {
        self.panel_notifications.push(is_open);
    }
}

/// In-memory authoritative store: applies requests immediately and bumps the
/// revision so a session can be fed realistic snapshots.
#[derive(Debug, Clone)]
pub struct MemoryLists {
    collection: Collection,
    revision: Revision,
    lists: Vec<ListEntry>,
    next_id: i64,
}

impl MemoryLists {
    pub fn new(collection: Collection, initial: ListsSnapshot) -> Self {
        let next_id = initial
            .lists
            .iter()
            .map(|list| list.id.get())
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            collection,
            revision: initial.revision,
            lists: initial.lists,
            next_id,
        }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn snapshot(&self) -> ListsSnapshot {
        ListsSnapshot::new(self.revision, self.lists.clone())
    }

    fn check_key(&self, key: &CollectionKey) -> Result<(), BackendError> {
        if *key == self.collection.key() {
            Ok(())
        } else {
            Err(BackendError::collection_not_found(key))
        }
    }

    fn bump(&mut self) {
        self.revision = self.revision.next();
    }
}

impl ListsBackend for MemoryLists {
    fn create_list(&mut self, key: &CollectionKey, title: &str) -> Result<(), BackendError> {
        self.check_key(key)?;
        self.lists.push(ListEntry {
            id: ListId::new(self.next_id),
            title: title.to_owned(),
            description: None,
            public: false,
        });
        self.next_id += 1;
        self.bump();
        Ok(())
    }

    fn edit_list(
        &mut self,
        key: &CollectionKey,
        list_id: ListId,
        patch: &ListPatch,
    ) -> Result<(), BackendError> {
        self.check_key(key)?;
        let entry = self
            .lists
            .iter_mut()
            .find(|list| list.id == list_id)
            .ok_or(BackendError::ListNotFound(list_id))?;
        patch.apply_to(entry);
        self.bump();
        Ok(())
    }

    fn delete_list(&mut self, key: &CollectionKey, list_id: ListId) -> Result<(), BackendError> {
        self.check_key(key)?;
        let before = self.lists.len();
        self.lists.retain(|list| list.id != list_id);
        if self.lists.len() == before {
            return Err(BackendError::ListNotFound(list_id));
        }
        self.bump();
        Ok(())
    }

    fn reorder_lists(
        &mut self,
        key: &CollectionKey,
        order: &[ListId],
    ) -> Result<(), BackendError> {
        self.check_key(key)?;
        let mut reordered = Vec::with_capacity(order.len());
        for id in order {
            let entry = self
                .lists
                .iter()
                .find(|list| list.id == *id)
                .ok_or(BackendError::ListNotFound(*id))?;
            reordered.push(entry.clone());
        }
        if reordered.len() != self.lists.len() {
            return Err(BackendError::rejected(
                RequestKind::Reorder,
                "order does not cover every list",
            ));
        }
        self.lists = reordered;
        self.bump();
        Ok(())
    }

    fn set_collection_visibility(
        &mut self,
        key: &CollectionKey,
        public_index: bool,
    ) -> Result<(), BackendError> {
        self.check_key(key)?;
        self.collection.public_index = public_index;
        Ok(())
    }
}

/// Stand-in for host timers: remembers every scheduled feedback window and
/// fires the due ones, in scheduling order, when time is advanced.
#[derive(Debug, Default)]
pub struct ManualTimers {
    now: Duration,
    scheduled: Vec<(Duration, FeedbackToken)>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, events: &[SessionEvent]) {
        for event in events {
            if let SessionEvent::FeedbackScheduled { token, after_ms } = event {
                let due = self.now + Duration::from_millis(*after_ms);
                self.scheduled.push((due, *token));
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.scheduled.len()
    }

    pub fn advance(&mut self, by: Duration) -> Vec<SessionCommand> {
        self.now += by;
        let now = self.now;
        let (due, later): (Vec<_>, Vec<_>) = self
            .scheduled
            .drain(..)
            .partition(|(deadline, _)| *deadline <= now);
        self.scheduled = later;
        due.into_iter()
            .map(|(_, token)| SessionCommand::FeedbackElapsed(token))
            .collect()
    }
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator for list fixtures and drag gestures.
#[derive(Debug, Clone)]
pub struct ListsFaker {
    rng: DeterministicRng,
}

impl ListsFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn list_title(&mut self) -> String {
        let base = LIST_TITLES[self.rng.int_n(LIST_TITLES.len())];
        if self.rng.bool() {
            base.to_owned()
        } else {
            let qualifier = LIST_QUALIFIERS[self.rng.int_n(LIST_QUALIFIERS.len())];
            format!("{base} {qualifier}")
        }
    }

    pub fn snapshot(&mut self, revision: u64, count: usize) -> ListsSnapshot {
        let lists = (1..=count)
            .map(|id| ListEntry {
                id: ListId::new(id as i64),
                title: self.list_title(),
                description: None,
                public: self.rng.bool(),
            })
            .collect();
        ListsSnapshot::new(Revision::new(revision), lists)
    }

    /// A drag gesture within bounds for a sequence of `len` rows.
    pub fn drag(&mut self, len: usize) -> Result<(usize, usize)> {
        if len == 0 {
            bail!("cannot drag within an empty list");
        }
        Ok((self.rng.int_n(len), self.rng.int_n(len)))
    }
}

#[cfg(test)]
mod tests {
    use super::{ListsFaker, ManualTimers, MemoryLists, RecordingBackend, Request};
    use super::{abc_snapshot, ids, sample_collection};
    use anyhow::Result;
    use collnav_app::{
        BackendError, FeedbackKind, FeedbackToken, ListPatch, ListsBackend, RequestKind,
        Revision, SessionCommand, SessionEvent,
    };
    use std::time::Duration;

    #[test]
    fn faker_is_deterministic_per_seed() {
        let mut a = ListsFaker::new(7);
        let mut b = ListsFaker::new(7);
        assert_eq!(a.snapshot(1, 5), b.snapshot(1, 5));
    }

    #[test]
    fn drag_stays_in_bounds() -> Result<()> {
        let mut faker = ListsFaker::new(3);
        for _ in 0..100 {
            let (from, to) = faker.drag(4)?;
            assert!(from < 4 && to < 4);
        }
        assert!(faker.drag(0).is_err());
        Ok(())
    }

    #[test]
    fn recording_backend_fails_only_the_marked_kind() {
        let mut backend = RecordingBackend::new();
        let key = sample_collection().key();
        backend.fail_next(RequestKind::Delete, BackendError::Unavailable("x".to_owned()));

        assert!(backend.create_list(&key, "Reading").is_ok());
        assert!(backend.delete_list(&key, ids(&[1])[0]).is_err());
        assert!(backend.delete_list(&key, ids(&[1])[0]).is_ok());
        assert_eq!(backend.count(RequestKind::Delete), 2);
        assert!(matches!(backend.last(), Some(Request::Delete { .. })));
    }

    #[test]
    fn memory_lists_bumps_revision_per_mutation() -> Result<()> {
        let collection = sample_collection();
        let key = collection.key();
        let mut store = MemoryLists::new(collection, abc_snapshot(1));

        store.create_list(&key, "Reading")?;
        store.edit_list(&key, ids(&[2])[0], &ListPatch::title("Bee"))?;
        store.reorder_lists(&key, &ids(&[4, 3, 2, 1]))?;

        let snapshot = store.snapshot();
        assert_eq!(snapshot.revision, Revision::new(4));
        assert_eq!(snapshot.ids(), ids(&[4, 3, 2, 1]));
        assert_eq!(snapshot.lists[2].title, "Bee");
        Ok(())
    }

    #[test]
    fn memory_lists_rejects_partial_order() {
        let collection = sample_collection();
        let key = collection.key();
        let mut store = MemoryLists::new(collection, abc_snapshot(1));
        assert!(store.reorder_lists(&key, &ids(&[1, 2])).is_err());
        assert_eq!(store.snapshot().revision, Revision::new(1));
    }

    #[test]
    fn manual_timers_fire_due_tokens_only() {
        let mut timers = ManualTimers::new();
        let create = FeedbackToken {
            kind: FeedbackKind::Create,
            seq: 1,
        };
        let edit = FeedbackToken {
            kind: FeedbackKind::Edit,
            seq: 2,
        };
        timers.observe(&[
            SessionEvent::FeedbackScheduled {
                token: create,
                after_ms: 3_000,
            },
            SessionEvent::FeedbackScheduled {
                token: edit,
                after_ms: 5_000,
            },
        ]);

        assert!(timers.advance(Duration::from_secs(2)).is_empty());
        assert_eq!(
            timers.advance(Duration::from_secs(1)),
            vec![SessionCommand::FeedbackElapsed(create)]
        );
        assert_eq!(timers.pending(), 1);
        assert_eq!(
            timers.advance(Duration::from_secs(2)),
            vec![SessionCommand::FeedbackElapsed(edit)]
        );
    }
}

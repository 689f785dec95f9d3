// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use collnav_app::{
    Collection, CollectionId, CollectionKey, FeedbackKind, FeedbackToken, FeedbackWindows, ListId,
    ListPatch, ListsBackend, ListsSession, OwnerId, RequestKind, SessionCommand, SessionEvent,
    ViewerContext,
};
use collnav_db::{NewCollection, Store};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::parse_duration;

/// A scripted panel session: which collection to open, as whom, and what to do.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub collection: ScriptCollection,
    #[serde(default)]
    pub viewer: ScriptViewer,
    /// Titles seeded into a freshly created collection.
    #[serde(default)]
    pub lists: Vec<String>,
    #[serde(default, rename = "step")]
    pub steps: Vec<ScriptStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptCollection {
    pub owner: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub public_index: bool,
}

impl Default for ScriptCollection {
    fn default() -> Self {
        Self {
            owner: "demo".to_owned(),
            slug: "field-notes".to_owned(),
            title: "Field Notes".to_owned(),
            public_index: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScriptViewer {
    #[serde(default = "default_true")]
    pub can_admin: bool,
    #[serde(default)]
    pub is_anon: bool,
    #[serde(default)]
    pub as_public: bool,
}

impl Default for ScriptViewer {
    fn default() -> Self {
        Self {
            can_admin: true,
            is_anon: false,
            as_public: false,
        }
    }
}

impl From<ScriptViewer> for ViewerContext {
    fn from(viewer: ScriptViewer) -> Self {
        Self {
            can_admin: viewer.can_admin,
            is_anon: viewer.is_anon,
            as_public: viewer.as_public,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptStep {
    SetDraft {
        title: String,
    },
    SubmitDraft,
    Create {
        title: String,
    },
    Edit {
        id: i64,
        title: Option<String>,
        description: Option<String>,
        public: Option<bool>,
    },
    Delete {
        id: i64,
    },
    Move {
        from: usize,
        to: usize,
    },
    Commit,
    ToggleVisibility,
    TogglePanel,
    Select {
        id: Option<i64>,
    },
    Fail {
        kind: String,
        message: String,
    },
    Dismiss {
        kind: String,
    },
    Wait {
        duration: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Dispatch(SessionCommand),
    Wait(Duration),
}

impl ScriptStep {
    pub fn action(&self) -> Result<StepAction> {
        let command = match self {
            Self::SetDraft { title } => SessionCommand::SetDraftTitle(title.clone()),
            Self::SubmitDraft => SessionCommand::SubmitDraft,
            Self::Create { title } => SessionCommand::CreateList(title.clone()),
            Self::Edit {
                id,
                title,
                description,
                public,
            } => SessionCommand::EditList {
                id: ListId::new(*id),
                patch: ListPatch {
                    title: title.clone(),
                    description: description.clone(),
                    public: *public,
                },
            },
            Self::Delete { id } => SessionCommand::DeleteList(ListId::new(*id)),
            Self::Move { from, to } => SessionCommand::MoveLocal {
                from: *from,
                to: *to,
            },
            Self::Commit => SessionCommand::CommitOrder,
            Self::ToggleVisibility => SessionCommand::ToggleIndexVisibility,
            Self::TogglePanel => SessionCommand::TogglePanel,
            Self::Select { id } => SessionCommand::SetActiveList(id.map(ListId::new)),
            Self::Fail { kind, message } => SessionCommand::RequestFailed {
                kind: parse_request_kind(kind)?,
                message: message.clone(),
            },
            Self::Dismiss { kind } => {
                let feedback = parse_request_kind(kind)?.feedback_kind().ok_or_else(|| {
                    anyhow!("{kind:?} has no feedback to dismiss; use \"create\" or \"edit\"")
                })?;
                SessionCommand::DismissFailure(feedback)
            }
            Self::Wait { duration } => return Ok(StepAction::Wait(parse_duration(duration)?)),
        };
        Ok(StepAction::Dispatch(command))
    }
}

fn parse_request_kind(raw: &str) -> Result<RequestKind> {
    RequestKind::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = RequestKind::ALL.iter().map(|kind| kind.as_str()).collect();
        anyhow!(
            "unknown request kind {raw:?}; expected one of: {}",
            known.join(", ")
        )
    })
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read script {}", path.display()))?;
        let script: Script = toml::from_str(&raw)
            .with_context(|| format!("parse TOML script {}", path.display()))?;
        for (index, step) in script.steps.iter().enumerate() {
            step.action()
                .with_context(|| format!("step {} in {}", index + 1, path.display()))?;
        }
        Ok(script)
    }

    /// Built-in walkthrough: create, confirm and expire; drag and commit; edit; publish.
    pub fn demo(windows: FeedbackWindows) -> Self {
        let settle = windows.created.max(windows.edited) + Duration::from_millis(100);
        Self {
            collection: ScriptCollection::default(),
            viewer: ScriptViewer::default(),
            lists: vec!["A".to_owned(), "B".to_owned(), "C".to_owned()],
            steps: vec![
                ScriptStep::SetDraft {
                    title: "Reading".to_owned(),
                },
                ScriptStep::SubmitDraft,
                ScriptStep::Move { from: 0, to: 2 },
                ScriptStep::Commit,
                ScriptStep::Edit {
                    id: 2,
                    title: Some("B, revised".to_owned()),
                    description: None,
                    public: None,
                },
                ScriptStep::ToggleVisibility,
                ScriptStep::Wait {
                    duration: format!("{}ms", settle.as_millis()),
                },
            ],
        }
    }

    /// Opens the scripted collection, creating and seeding it on first use.
    pub fn prepare(&self, store: &mut Store) -> Result<Collection> {
        let key = CollectionKey {
            owner: OwnerId::new(self.collection.owner.as_str()),
            collection: CollectionId::new(self.collection.slug.as_str()),
        };
        if let Some(collection) = store.get_collection(&key)? {
            return Ok(collection);
        }

        info!(owner = %key.owner, collection = %key.collection, "creating collection");
        let collection = store.create_collection(&NewCollection {
            owner: key.owner.clone(),
            slug: key.collection.clone(),
            title: self.collection.title.clone(),
            description: String::new(),
            public_index: self.collection.public_index,
        })?;
        for title in &self.lists {
            store
                .create_list(&key, title)
                .with_context(|| format!("seed list {title:?}"))?;
        }
        Ok(collection)
    }
}

/// Drives a [`ListsSession`] against the store, feeding every write back as a
/// fresh snapshot and running feedback windows on real timers.
pub struct PanelRuntime<W: Write> {
    store: Store,
    key: CollectionKey,
    session: ListsSession,
    timer_tx: Sender<FeedbackToken>,
    timer_rx: Receiver<FeedbackToken>,
    out: W,
}

impl<W: Write> PanelRuntime<W> {
    pub fn mount(
        store: Store,
        collection: Collection,
        viewer: ViewerContext,
        windows: FeedbackWindows,
        out: W,
    ) -> Result<Self> {
        let key = collection.key();
        let snapshot = store.snapshot(&key)?;
        let session = ListsSession::mount(collection, snapshot, viewer, windows);
        let (timer_tx, timer_rx) = mpsc::channel();
        Ok(Self {
            store,
            key,
            session,
            timer_tx,
            timer_rx,
            out,
        })
    }

    pub fn session(&self) -> &ListsSession {
        &self.session
    }

    pub fn run(&mut self, steps: &[ScriptStep]) -> Result<()> {
        for step in steps {
            match step.action()? {
                StepAction::Dispatch(command) => self.apply(command)?,
                StepAction::Wait(duration) => self.wait(duration)?,
            }
        }
        Ok(())
    }

    pub fn apply(&mut self, command: SessionCommand) -> Result<()> {
        let mut events = self.session.dispatch(&mut self.store, command);

        if events
            .iter()
            .any(|event| matches!(event, SessionEvent::VisibilityRequested { .. }))
            && let Some(collection) = self.store.get_collection(&self.key)?
        {
            events.extend(
                self.session
                    .dispatch(&mut self.store, SessionCommand::CollectionUpdated(collection)),
            );
        }

        let snapshot = self.store.snapshot(&self.key)?;
        if snapshot.revision > self.session.revision() {
            events.extend(
                self.session
                    .dispatch(&mut self.store, SessionCommand::ListsUpdated(snapshot)),
            );
        }

        self.emit(&events)
    }

    /// Delivers feedback expiries that fall due within `duration`.
    pub fn wait(&mut self, duration: Duration) -> Result<()> {
        let deadline = Instant::now()
            .checked_add(duration)
            .with_context(|| format!("wait of {duration:?} is too long"))?;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            match self.timer_rx.recv_timeout(remaining) {
                Ok(token) => self.apply(SessionCommand::FeedbackElapsed(token))?,
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
    }

    fn emit(&mut self, events: &[SessionEvent]) -> Result<()> {
        for event in events {
            if let SessionEvent::FeedbackScheduled { token, after_ms } = event {
                schedule_feedback_clear(&self.timer_tx, *token, Duration::from_millis(*after_ms));
            }
            let line = serde_json::to_string(event).context("encode session event")?;
            writeln!(self.out, "{line}").context("write session event")?;
        }
        self.out.flush().context("flush session events")
    }
}

fn schedule_feedback_clear(timer_tx: &Sender<FeedbackToken>, token: FeedbackToken, after: Duration) {
    let sender = timer_tx.clone();
    debug!(kind = token.kind.as_str(), seq = token.seq, ?after, "feedback window opened");
    thread::spawn(move || {
        thread::sleep(after);
        let _ = sender.send(token);
    });
}

/// Kinds whose feedback slot is still showing something.
pub fn open_feedback(session: &ListsSession) -> Vec<FeedbackKind> {
    let mut open = Vec::new();
    if !session.create_state().is_idle() {
        open.push(FeedbackKind::Create);
    }
    if !session.edit_state().is_idle() {
        open.push(FeedbackKind::Edit);
    }
    open
}

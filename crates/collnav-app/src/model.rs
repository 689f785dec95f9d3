// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::ids::*;

pub const DEFAULT_CREATED_WINDOW: Duration = Duration::from_secs(3);
pub const DEFAULT_EDITED_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub owner: OwnerId,
    pub id: CollectionId,
    pub loaded: bool,
    pub title: String,
    pub description: String,
    pub public_index: bool,
}

impl Collection {
    pub fn key(&self) -> CollectionKey {
        CollectionKey {
            owner: self.owner.clone(),
            collection: self.id.clone(),
        }
    }
}

/// Addressing key attached to every mutation request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionKey {
    pub owner: OwnerId,
    pub collection: CollectionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub id: ListId,
    pub title: String,
    pub description: Option<String>,
    pub public: bool,
}

/// Partial attribute update for a single list. `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

impl ListPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.public.is_none()
    }

    pub fn apply_to(&self, entry: &mut ListEntry) {
        if let Some(title) = &self.title {
            entry.title = title.clone();
        }
        if let Some(description) = &self.description {
            entry.description = if description.is_empty() {
                None
            } else {
                Some(description.clone())
            };
        }
        if let Some(public) = self.public {
            entry.public = public;
        }
    }
}

/// Authoritative list sequence as last confirmed by the persistence layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListsSnapshot {
    pub revision: Revision,
    pub lists: Vec<ListEntry>,
}

impl ListsSnapshot {
    pub fn new(revision: Revision, lists: Vec<ListEntry>) -> Self {
        Self { revision, lists }
    }

    pub fn ids(&self) -> Vec<ListId> {
        self.lists.iter().map(|list| list.id).collect()
    }

    pub fn id_set(&self) -> BTreeSet<ListId> {
        self.lists.iter().map(|list| list.id).collect()
    }
}

/// Ambient flags describing who is looking at the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerContext {
    pub can_admin: bool,
    pub is_anon: bool,
    pub as_public: bool,
}

impl ViewerContext {
    pub const fn admin() -> Self {
        Self {
            can_admin: true,
            is_anon: false,
            as_public: false,
        }
    }

    pub const fn public_visitor() -> Self {
        Self {
            can_admin: false,
            is_anon: true,
            as_public: true,
        }
    }
}

impl Default for ViewerContext {
    fn default() -> Self {
        Self::admin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackWindows {
    pub created: Duration,
    pub edited: Duration,
}

impl FeedbackWindows {
    pub const fn window(self, kind: FeedbackKind) -> Duration {
        match kind {
            FeedbackKind::Create => self.created,
            FeedbackKind::Edit => self.edited,
        }
    }
}

impl Default for FeedbackWindows {
    fn default() -> Self {
        Self {
            created: DEFAULT_CREATED_WINDOW,
            edited: DEFAULT_EDITED_WINDOW,
        }
    }
}

/// Operation classes that carry a feedback slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Create,
    Edit,
}

impl FeedbackKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Create,
    Edit,
    Delete,
    Reorder,
    Visibility,
}

impl RequestKind {
    pub const ALL: [Self; 5] = [
        Self::Create,
        Self::Edit,
        Self::Delete,
        Self::Reorder,
        Self::Visibility,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Reorder => "reorder",
            Self::Visibility => "visibility",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "edit" => Some(Self::Edit),
            "delete" => Some(Self::Delete),
            "reorder" => Some(Self::Reorder),
            "visibility" => Some(Self::Visibility),
            _ => None,
        }
    }

    pub const fn feedback_kind(self) -> Option<FeedbackKind> {
        match self {
            Self::Create => Some(FeedbackKind::Create),
            Self::Edit => Some(FeedbackKind::Edit),
            Self::Delete | Self::Reorder | Self::Visibility => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ListEntry, ListPatch, ListsSnapshot, RequestKind};
    use crate::{ListId, Revision};

    fn entry(id: i64, title: &str) -> ListEntry {
        ListEntry {
            id: ListId::new(id),
            title: title.to_owned(),
            description: Some("notes".to_owned()),
            public: false,
        }
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut list = entry(1, "Reading");
        ListPatch::title("Later").apply_to(&mut list);
        assert_eq!(list.title, "Later");
        assert_eq!(list.description.as_deref(), Some("notes"));
        assert!(!list.public);
    }

    #[test]
    fn empty_description_in_patch_clears_it() {
        let mut list = entry(1, "Reading");
        ListPatch {
            description: Some(String::new()),
            public: Some(true),
            ..ListPatch::default()
        }
        .apply_to(&mut list);
        assert_eq!(list.description, None);
        assert!(list.public);
    }

    #[test]
    fn snapshot_ids_follow_sequence_order() {
        let snapshot = ListsSnapshot::new(
            Revision::new(3),
            vec![entry(2, "B"), entry(3, "C"), entry(1, "A")],
        );
        assert_eq!(
            snapshot.ids(),
            vec![ListId::new(2), ListId::new(3), ListId::new(1)]
        );
    }

    #[test]
    fn request_kind_parse_matches_as_str() {
        for kind in RequestKind::ALL {
            assert_eq!(RequestKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RequestKind::parse("rename"), None);
    }
}

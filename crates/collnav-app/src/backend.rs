// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

use crate::{CollectionKey, ListId, ListPatch, RequestKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{kind} request rejected: {message}")]
    Rejected { kind: &'static str, message: String },
    #[error("list {0} not found")]
    ListNotFound(ListId),
    #[error("collection {owner}/{collection} not found")]
    CollectionNotFound { owner: String, collection: String },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    pub fn rejected(kind: RequestKind, message: impl Into<String>) -> Self {
        Self::Rejected {
            kind: kind.as_str(),
            message: message.into(),
        }
    }

    pub fn collection_not_found(key: &CollectionKey) -> Self {
        Self::CollectionNotFound {
            owner: key.owner.to_string(),
            collection: key.collection.to_string(),
        }
    }
}

/// Persistence capabilities the lists panel drives.
///
/// Every call only *dispatches* a request. Success is observed later, when the
/// host delivers a new authoritative snapshot to the session. An `Err` means the
/// request could not be dispatched (or was rejected synchronously).
pub trait ListsBackend {
    fn create_list(&mut self, key: &CollectionKey, title: &str) -> Result<(), BackendError>;

    fn edit_list(
        &mut self,
        key: &CollectionKey,
        list_id: ListId,
        patch: &ListPatch,
    ) -> Result<(), BackendError>;

    fn delete_list(&mut self, key: &CollectionKey, list_id: ListId) -> Result<(), BackendError>;

    fn reorder_lists(&mut self, key: &CollectionKey, order: &[ListId])
    -> Result<(), BackendError>;

    fn set_collection_visibility(
        &mut self,
        key: &CollectionKey,
        public_index: bool,
    ) -> Result<(), BackendError>;

    /// Presentational callback; the panel was opened or collapsed.
    fn notify_panel_open_state(&mut self, _is_open: bool) {}
}

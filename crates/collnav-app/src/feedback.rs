// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{FeedbackKind, FeedbackWindows};

/// Handle for one scheduled feedback expiry.
///
/// The host delivers the token back once the window elapses. A token that no
/// longer matches its slot (the slot moved on or was superseded) is ignored, so
/// a late timer can never clear a newer feedback window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedbackToken {
    pub kind: FeedbackKind,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState<K> {
    Idle,
    Pending(K),
    Confirmed { key: K, token: FeedbackToken },
    Failed { key: K, message: String },
}

impl<K> SlotState<K> {
    pub fn key(&self) -> Option<&K> {
        match self {
            Self::Idle => None,
            Self::Pending(key) | Self::Confirmed { key, .. } | Self::Failed { key, .. } => Some(key),
        }
    }

    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// One operation class worth of feedback: `idle -> pending -> confirmed -> idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackSlot<K> {
    state: SlotState<K>,
}

impl<K: Clone> Default for FeedbackSlot<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone> FeedbackSlot<K> {
    pub const fn new() -> Self {
        Self {
            state: SlotState::Idle,
        }
    }

    pub fn state(&self) -> &SlotState<K> {
        &self.state
    }

    /// Starts tracking a new request, returning whatever state it replaced.
    pub fn begin(&mut self, key: K) -> SlotState<K> {
        std::mem::replace(&mut self.state, SlotState::Pending(key))
    }

    /// Resolves a pending request into an open feedback window.
    pub fn confirm(&mut self, token: FeedbackToken) -> Option<K> {
        let SlotState::Pending(key) = &self.state else {
            return None;
        };
        let key = key.clone();
        self.state = SlotState::Confirmed {
            key: key.clone(),
            token,
        };
        Some(key)
    }

    pub fn expire(&mut self, token: FeedbackToken) -> Option<K> {
        match &self.state {
            SlotState::Confirmed {
                key,
                token: current,
            } if *current == token => {
                let key = key.clone();
                self.state = SlotState::Idle;
                Some(key)
            }
            _ => None,
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Option<K> {
        let SlotState::Pending(key) = &self.state else {
            return None;
        };
        let key = key.clone();
        self.state = SlotState::Failed {
            key: key.clone(),
            message: message.into(),
        };
        Some(key)
    }

    pub fn dismiss(&mut self) -> bool {
        if self.state.is_failed() {
            self.state = SlotState::Idle;
            true
        } else {
            false
        }
    }
}

/// Hands out feedback tokens and the window each should stay open for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackTimers {
    windows: FeedbackWindows,
    next_seq: u64,
}

impl FeedbackTimers {
    pub const fn new(windows: FeedbackWindows) -> Self {
        Self {
            windows,
            next_seq: 1,
        }
    }

    pub const fn windows(&self) -> FeedbackWindows {
        self.windows
    }

    pub fn schedule(&mut self, kind: FeedbackKind) -> (FeedbackToken, Duration) {
        let token = FeedbackToken {
            kind,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        (token, self.windows.window(kind))
    }
}

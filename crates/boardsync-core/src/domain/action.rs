//! Action history: what the user did, for user-facing display.
//!
//! Purely observational. Losing it is not a correctness bug, so nothing in
//! the sync protocol reads it.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ActionId, ColumnSlug, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Created,
    Edited,
    Moved,
    Deleted,
    DeletedColumn,
    CreatedColumn,
    MovedColumn,
}

/// One history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub kind: ActionKind,

    /// None for column-level actions.
    pub task_id: Option<TaskId>,

    /// Task title (or column display name) at the time of the action.
    pub content_snapshot: String,

    pub from_column: Option<ColumnSlug>,
    pub to_column: Option<ColumnSlug>,
    pub timestamp: DateTime<Utc>,
}

/// Bounded history, most recent last. The oldest entry is evicted on overflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionHistory {
    capacity: usize,
    entries: VecDeque<Action>,
}

impl ActionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Rebuild from persisted entries, keeping only the newest `capacity`.
    pub fn from_entries(capacity: usize, entries: Vec<Action>) -> Self {
        let mut history = Self::new(capacity);
        for action in entries {
            history.push(action);
        }
        history
    }

    pub fn push(&mut self, action: Action) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(action);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<Action> {
        self.entries.iter().cloned().collect()
    }

    /// Provisional id -> persisted id.
    pub fn renumber(&mut self, from: TaskId, to: TaskId) {
        for action in self.entries.iter_mut() {
            if action.task_id == Some(from) {
                action.task_id = Some(to);
            }
        }
    }
}

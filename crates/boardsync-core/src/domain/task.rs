use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// A task card. Identity is the id; title and description are mutable content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Same task with new title (content only, identity unchanged).
    pub fn retitled(&self, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            modified_at: now,
            ..self.clone()
        }
    }
}

use serde::{Deserialize, Serialize};

use super::ids::{ColumnSlug, TaskId};

/// An ordered column of task ids.
///
/// `position` is derived from the board's `column_order` and rewritten by
/// every board constructor that touches the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub slug: ColumnSlug,
    pub display_name: String,
    pub position: usize,
    pub task_order: Vec<TaskId>,
}

impl Column {
    pub fn new(slug: ColumnSlug, display_name: impl Into<String>, position: usize) -> Self {
        Self {
            slug,
            display_name: display_name.into(),
            position,
            task_order: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.task_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_order.is_empty()
    }

    pub fn index_of(&self, task_id: TaskId) -> Option<usize> {
        self.task_order.iter().position(|id| *id == task_id)
    }
}

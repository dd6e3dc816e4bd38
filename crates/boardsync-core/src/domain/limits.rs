//! Board limits: column ceiling and name lengths.

use serde::{Deserialize, Serialize};

use super::errors::BoardError;
use super::ids::ColumnSlug;

/// Limits shared by the engine (local validation) and the store (authoritative check).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardLimits {
    /// Maximum number of columns on one board.
    pub max_columns: usize,

    /// Maximum length (in chars) of a column display name.
    pub max_name_len: usize,

    /// Maximum length (in chars) of a task title.
    pub max_title_len: usize,
}

impl Default for BoardLimits {
    fn default() -> Self {
        Self {
            max_columns: 6,
            max_name_len: 64,
            max_title_len: 256,
        }
    }
}

impl BoardLimits {
    /// Validate a column display name and derive its slug.
    pub fn column_slug(&self, name: &str) -> Result<ColumnSlug, BoardError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(BoardError::InvalidInput("column name is empty".into()));
        }
        if trimmed.chars().count() > self.max_name_len {
            return Err(BoardError::InvalidInput(format!(
                "column name exceeds {} characters",
                self.max_name_len
            )));
        }
        ColumnSlug::from_display_name(trimmed).ok_or_else(|| {
            BoardError::InvalidInput(format!("column name '{trimmed}' has no usable characters"))
        })
    }

    /// Validate a task title (returns the trimmed title).
    pub fn task_title<'a>(&self, title: &'a str) -> Result<&'a str, BoardError> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(BoardError::InvalidInput("task title is empty".into()));
        }
        if trimmed.chars().count() > self.max_title_len {
            return Err(BoardError::InvalidInput(format!(
                "task title exceeds {} characters",
                self.max_title_len
            )));
        }
        Ok(trimmed)
    }
}

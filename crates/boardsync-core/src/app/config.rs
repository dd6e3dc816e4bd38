//! EngineConfig - エンジン設定
//!
//! すべてのフィールドに既定値があるので、JSON では変えたいものだけ書けばよい。
//!
//! ```json
//! { "limits": { "max_columns": 8 }, "history_capacity": 20 }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{Board, BoardLimits};

use super::builder::BuildError;

/// StorageMode はボードの保存先
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// 端末ストレージのみ。BoardStore は呼ばない。
    LocalOnly,
    /// BoardStore が正本。端末ストレージはフォールバック用のスナップショット。
    Synced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub limits: BoardLimits,

    /// 保持する Action の最大件数（超えたら古いものから捨てる）
    pub history_capacity: usize,

    /// 作成直後（未編集）のタスクに入れる仮タイトル
    pub placeholder_title: String,

    /// ストアにも端末にもボードがないときのカラム
    pub default_columns: Vec<String>,

    /// リレーのルームごとのバッファ
    pub relay_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: BoardLimits::default(),
            history_capacity: 10,
            placeholder_title: "New task".to_string(),
            default_columns: vec![
                "To Do".to_string(),
                "In Progress".to_string(),
                "Done".to_string(),
            ],
            relay_capacity: 64,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// 起動時検証（Fail-fast）
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.limits.max_columns == 0 {
            return Err(BuildError::InvalidConfig(
                "limits.max_columns must be at least 1".into(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(BuildError::InvalidConfig(
                "history_capacity must be at least 1".into(),
            ));
        }
        if self.relay_capacity == 0 {
            return Err(BuildError::InvalidConfig(
                "relay_capacity must be at least 1".into(),
            ));
        }
        self.limits
            .task_title(&self.placeholder_title)
            .map_err(|e| BuildError::InvalidConfig(format!("placeholder_title: {e}")))?;
        self.default_board()
            .map_err(|e| BuildError::InvalidConfig(format!("default_columns: {e}")))?;
        Ok(())
    }

    /// `default_columns` だけを持つ空のボード
    pub fn default_board(&self) -> Result<Board, crate::domain::BoardError> {
        Board::with_columns(&self.default_columns, &self.limits)
    }
}

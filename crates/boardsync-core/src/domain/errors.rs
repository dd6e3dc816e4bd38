//! Errors - エラー型と分類
//!
//! 4 分類（NotFound / Conflict / Unavailable / InvalidInput）のみ。
//! 不変条件違反はプログラムのバグなので、ここには含めない。

use thiserror::Error;

/// ErrorKind は失敗の運用分類
///
/// - NotFound: 参照先のタスク・カラムが存在しない（他クライアントの削除との競合が典型）
/// - Conflict: スラッグ重複、カラム上限超過、同時の構造変更
/// - Unavailable: ストアまたはリレーに到達できない
/// - InvalidInput: 空・長すぎる名前
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Unavailable,
    InvalidInput,
}

/// BoardError はドメインエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl BoardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BoardError::NotFound(_) => ErrorKind::NotFound,
            BoardError::Conflict(_) => ErrorKind::Conflict,
            BoardError::Unavailable(_) => ErrorKind::Unavailable,
            BoardError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    pub fn task_not_found(task_id: impl std::fmt::Display) -> Self {
        BoardError::NotFound(format!("{task_id} does not exist"))
    }

    pub fn column_not_found(slug: impl std::fmt::Display) -> Self {
        BoardError::NotFound(format!("column '{slug}' does not exist"))
    }
}

//! Domain identifiers (strongly-typed IDs).
//!
//! # 二種類の ID
//! - **ULID ベース**（`Id<T>`）: BoardId, ActionId, ConnectionId。
//!   クライアント側で調整なしに生成できる。
//! - **ストア採番**: TaskId（整数）と ColumnSlug（表示名から導出）。
//!   どちらもストアが正本なので ULID にはしない。
//!
//! ## Phantom Type パターン
//! `Id<T>` の `T` は実行時には使わないマーカー型。
//! BoardId と ActionId をコンパイル時に区別する。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"board-", "action-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// ```ignore
/// let board: BoardId = Id::from(Ulid::new());
/// let action: ActionId = Id::from(Ulid::new());
/// // board と action は異なる型なので、混同できない
/// ```
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BoardMarker {}

impl IdMarker for BoardMarker {
    fn prefix() -> &'static str {
        "board-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionMarker {}

impl IdMarker for ActionMarker {
    fn prefix() -> &'static str {
        "action-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConnectionMarker {}

impl IdMarker for ConnectionMarker {
    fn prefix() -> &'static str {
        "conn-"
    }
}

/// Identifier of a Board (the relay room key).
pub type BoardId = Id<BoardMarker>;

/// Identifier of an Action history entry.
pub type ActionId = Id<ActionMarker>;

/// Identifier of one relay connection (one client session).
pub type ConnectionId = Id<ConnectionMarker>;

// ========================================
// ストア採番の ID
// ========================================

/// Identifier of a Task.
///
/// 永続化済みのタスクは正の値。synced モードの provisional タスクは
/// ローカルで負の値を振り、`create_task` の応答で正の値に付け替える。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// ローカル専用（未永続化）の一時 ID か
    pub const fn is_local(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Column identity: a slug derived once from the display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSlug(String);

impl ColumnSlug {
    /// Derive the slug for a display name.
    ///
    /// Lowercases alphanumerics (any script) and collapses every other run
    /// of characters into a single `-`. Returns `None` when nothing survives.
    pub fn from_display_name(name: &str) -> Option<Self> {
        let mut slug = String::with_capacity(name.len());
        let mut pending_dash = false;
        for ch in name.chars() {
            if ch.is_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.extend(ch.to_lowercase());
            } else {
                pending_dash = true;
            }
        }
        if slug.is_empty() { None } else { Some(Self(slug)) }
    }

    /// Wrap an already-derived slug (e.g. read back from a store).
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn ulid_ids_are_distinct_types() {
        let ulid = Ulid::new();

        let board = BoardId::from_ulid(ulid);
        let action = ActionId::from_ulid(ulid);

        assert_eq!(board.as_ulid(), action.as_ulid());
        assert!(board.to_string().starts_with("board-"));
        assert!(action.to_string().starts_with("action-"));
        // let _: BoardId = action; // <- does not compile
    }

    #[test]
    fn ulid_ids_can_be_serialized() {
        let board = BoardId::from_ulid(Ulid::new());
        let serialized = serde_json::to_string(&board).unwrap();
        let deserialized: BoardId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(board, deserialized);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<BoardId>(), size_of::<Ulid>());
        assert_eq!(size_of::<ConnectionId>(), 16);
    }

    #[rstest]
    #[case::simple("Done", "done")]
    #[case::spaces("In Progress", "in-progress")]
    #[case::punctuation("To Do!!", "to-do")]
    #[case::leading_symbols("  --Review  ", "review")]
    #[case::digits("Sprint 12 / QA", "sprint-12-qa")]
    #[case::japanese("やること", "やること")]
    #[case::mixed_script("Größe  Über", "größe-über")]
    fn slug_is_derived_from_display_name(#[case] name: &str, #[case] expected: &str) {
        let slug = ColumnSlug::from_display_name(name).unwrap();
        assert_eq!(slug.as_str(), expected);
    }

    #[test]
    fn slug_of_symbols_only_is_none() {
        assert!(ColumnSlug::from_display_name("!!! ???").is_none());
        assert!(ColumnSlug::from_display_name("").is_none());
    }

    #[test]
    fn task_id_sign_marks_local_ids() {
        assert!(TaskId::new(-1).is_local());
        assert!(!TaskId::new(1).is_local());
        assert_eq!(serde_json::to_string(&TaskId::new(7)).unwrap(), "7");
    }
}

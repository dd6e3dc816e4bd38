//! Events - リレーに流れるイベントと制御メッセージ
//!
//! ペイロードは「何が変わったか」を特定できる最小限（id のみ）。
//! 受信側は中身を見ずに全体を再取得するので、内容は載せない。

use serde::{Deserialize, Serialize};

use super::ids::{BoardId, ColumnSlug, TaskId};

/// BoardEvent はコミット済みの変更 1 件を表す
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BoardEvent {
    #[serde(rename = "task:created")]
    TaskCreated { task_id: TaskId, column: ColumnSlug },

    #[serde(rename = "task:updated")]
    TaskUpdated { task_id: TaskId },

    #[serde(rename = "task:moved")]
    TaskMoved {
        task_id: TaskId,
        to_column: ColumnSlug,
        to_index: usize,
    },

    #[serde(rename = "task:deleted")]
    TaskDeleted { task_id: TaskId },

    #[serde(rename = "column:created")]
    ColumnCreated { column: ColumnSlug },

    #[serde(rename = "column:deleted")]
    ColumnDeleted { column: ColumnSlug },

    #[serde(rename = "column:moved")]
    ColumnMoved { column: ColumnSlug, to_index: usize },
}

impl BoardEvent {
    /// ワイヤ上のイベント名（例: "task:moved"）
    pub fn name(&self) -> &'static str {
        match self {
            BoardEvent::TaskCreated { .. } => "task:created",
            BoardEvent::TaskUpdated { .. } => "task:updated",
            BoardEvent::TaskMoved { .. } => "task:moved",
            BoardEvent::TaskDeleted { .. } => "task:deleted",
            BoardEvent::ColumnCreated { .. } => "column:created",
            BoardEvent::ColumnDeleted { .. } => "column:deleted",
            BoardEvent::ColumnMoved { .. } => "column:moved",
        }
    }
}

/// RelayMessage はクライアントとリレーの間のメッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    Join { board_id: BoardId },
    Leave { board_id: BoardId },
    Event { board_id: BoardId, event: BoardEvent },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ulid::Ulid;

    #[test]
    fn events_are_tagged_with_wire_names() {
        let event = BoardEvent::TaskMoved {
            task_id: TaskId::new(2),
            to_column: ColumnSlug::new("done"),
            to_index: 0,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"type": "task:moved", "task_id": 2, "to_column": "done", "to_index": 0})
        );
        assert_eq!(event.name(), "task:moved");
    }

    #[test]
    fn relay_messages_parse_from_json() {
        let board_id = BoardId::from_ulid(Ulid::new());
        let text = serde_json::to_string(&RelayMessage::Join { board_id }).unwrap();
        assert!(text.contains("\"type\":\"join\""));
        let back: RelayMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(back, RelayMessage::Join { board_id });
    }
}

//! EventSink port - コミット済み変更の通知先
//!
//! ストアへの変更が成功するたびに 1 イベントを publish する。
//! 実装は `impls::RelayHub`（同じボードの他メンバーへ fan-out）。

use async_trait::async_trait;

use crate::domain::{BoardError, BoardEvent, BoardId, ConnectionId};

/// EventSink はボード単位のイベント配信
///
/// `origin` は変更を起こした接続。配信は origin 以外のメンバーに行う。
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(
        &self,
        board_id: BoardId,
        origin: ConnectionId,
        event: BoardEvent,
    ) -> Result<(), BoardError>;
}

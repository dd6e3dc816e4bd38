use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::{BoardId, ConnectionId};
use crate::impls::{Notice, RelayHub, RoomSubscription};

use super::engine::Invalidator;

/// Sync loop handle.
/// - `shutdown_and_join()` でループを止めてルームから抜ける
/// - 接続状態は `connected()` と `EngineStatus::relay_connected` の両方で見える
pub struct SyncHandle {
    shutdown_tx: watch::Sender<bool>,
    connected_rx: watch::Receiver<bool>,
    join: JoinHandle<()>,
    hub: Arc<RelayHub>,
    board_id: BoardId,
    connection: ConnectionId,
    invalidator: Invalidator,
}

impl SyncHandle {
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn connected(&self) -> bool {
        *self.connected_rx.borrow()
    }

    /// Request shutdown. The loop stops at its next wait point.
    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already have ended
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown, wait for the loop, then leave the room.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
        self.hub.leave(self.connection, self.board_id);
        self.invalidator.set_connected(false);
        tracing::info!(board_id = %self.board_id, connection = %self.connection, "left board room");
    }
}

/// SyncLoop はリレーの通知をエンジンの再取得につなぐ
///
/// 受け取ったイベントの種類は問わない。どれでも全体を再取得する。
pub struct SyncLoop;

impl SyncLoop {
    /// `board_id` のルームに参加してループを起動する
    pub fn spawn(
        hub: Arc<RelayHub>,
        board_id: BoardId,
        connection: ConnectionId,
        invalidator: Invalidator,
    ) -> SyncHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (connected_tx, connected_rx) = watch::channel(true);

        let subscription = hub.join(connection, board_id);
        invalidator.set_connected(true);
        tracing::info!(%board_id, %connection, "joined board room");

        let loop_invalidator = invalidator.clone();
        let join = tokio::spawn(async move {
            sync_loop(subscription, loop_invalidator, shutdown_rx, connected_tx).await;
        });

        SyncHandle {
            shutdown_tx,
            connected_rx,
            join,
            hub,
            board_id,
            connection,
            invalidator,
        }
    }
}

async fn sync_loop(
    mut subscription: RoomSubscription,
    invalidator: Invalidator,
    mut shutdown_rx: watch::Receiver<bool>,
    connected_tx: watch::Sender<bool>,
) {
    let board_id = subscription.board_id();
    loop {
        // shutdown が来ていたら抜ける
        if *shutdown_rx.borrow() {
            break;
        }

        let notice = tokio::select! {
            changed = shutdown_rx.changed() => {
                // handle ごと捨てられたら止まる
                if changed.is_err() {
                    break;
                }
                // 変更が入ったら次のループで判定
                continue;
            }
            notice = subscription.next() => notice,
        };

        match notice {
            Notice::Event(event) => {
                tracing::debug!(%board_id, event = event.name(), "peer change, refetching");
                invalidator.invalidate();
            }
            Notice::Missed(count) => {
                tracing::warn!(%board_id, count, "relay lagged, refetching");
                invalidator.invalidate();
            }
            Notice::Closed => {
                tracing::warn!(%board_id, "relay connection lost");
                let _ = connected_tx.send(false);
                invalidator.set_connected(false);
                break;
            }
        }
    }
}

//! RelayHub - ボード単位の publish/subscribe
//!
//! # 実装詳細
//! - `HashMap<BoardId, Room>` でボードごとにルームを管理
//! - ルームごとに `tokio::sync::broadcast` を 1 本持つ
//! - 配信には origin を付け、受信側で自分の変更を読み飛ばす（「他のメンバー」へ）
//! - broadcast の容量を超えて遅れた受信者は `Notice::Missed` を受け取る
//!   （再取得すれば取りこぼしは回復する）
//! - メンバーごとに `watch` を持ち、leave / close で待機中の購読も起こす

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};

use crate::domain::{BoardError, BoardEvent, BoardId, ConnectionId, RelayMessage};
use crate::ports::{EventSink, IdGenerator};

/// ルーム内を流れる 1 件
#[derive(Debug, Clone)]
pub struct Delivery {
    pub origin: ConnectionId,
    pub event: BoardEvent,
}

struct Room {
    sender: broadcast::Sender<Delivery>,
    /// メンバーごとの「まだ参加中か」フラグ（leave で false）
    members: HashMap<ConnectionId, watch::Sender<bool>>,
}

/// 購読側が受け取るもの
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// 他メンバーの変更
    Event(BoardEvent),
    /// 遅れて `n` 件取りこぼした
    Missed(u64),
    /// ルームが閉じた、または leave 済み
    Closed,
}

/// 1 接続 × 1 ボードの購読
pub struct RoomSubscription {
    board_id: BoardId,
    connection: ConnectionId,
    receiver: broadcast::Receiver<Delivery>,
    active: watch::Receiver<bool>,
}

impl RoomSubscription {
    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// 次の通知を待つ。自分が起こした変更は読み飛ばす。
    ///
    /// 待っている間に leave / close されたら `Notice::Closed` で戻る。
    pub async fn next(&mut self) -> Notice {
        let connection = self.connection;
        loop {
            if !*self.active.borrow_and_update() {
                return Notice::Closed;
            }
            tokio::select! {
                changed = self.active.changed() => {
                    // 送信側ごと片付けられた
                    if changed.is_err() {
                        return Notice::Closed;
                    }
                }
                received = self.receiver.recv() => match received {
                    Ok(delivery) if delivery.origin == connection => {}
                    Ok(delivery) => return Notice::Event(delivery.event),
                    Err(RecvError::Lagged(n)) => return Notice::Missed(n),
                    Err(RecvError::Closed) => return Notice::Closed,
                },
            }
        }
    }
}

/// RelayHub はボードごとのルームを管理するリレー
///
/// # 使用例
/// ```ignore
/// let hub = RelayHub::new(ids, 64);
/// let conn = hub.connect();
/// let mut sub = hub.join(conn, board_id);
/// while let Notice::Event(event) = sub.next().await { /* refetch */ }
/// ```
pub struct RelayHub {
    rooms: Mutex<HashMap<BoardId, Room>>,
    ids: Arc<dyn IdGenerator>,
    capacity: usize,
}

impl RelayHub {
    pub fn new(ids: Arc<dyn IdGenerator>, capacity: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            ids,
            capacity: capacity.max(1),
        }
    }

    /// 新しい接続 ID を払い出す
    pub fn connect(&self) -> ConnectionId {
        self.ids.generate_connection_id()
    }

    /// `board_id` のルームに参加する（なければ作る）
    pub fn join(&self, connection: ConnectionId, board_id: BoardId) -> RoomSubscription {
        let mut rooms = self.rooms.lock();
        let capacity = self.capacity;
        let room = rooms.entry(board_id).or_insert_with(|| Room {
            sender: broadcast::channel(capacity).0,
            members: HashMap::new(),
        });

        // 再参加なら前の購読を無効化する
        if let Some(previous) = room.members.get(&connection) {
            previous.send_replace(false);
        }
        let (active_tx, active) = watch::channel(true);
        room.members.insert(connection, active_tx);
        tracing::debug!(%board_id, %connection, members = room.members.len(), "relay join");

        RoomSubscription {
            board_id,
            connection,
            receiver: room.sender.subscribe(),
            active,
        }
    }

    /// ルームから抜ける。最後のメンバーならルームを片付ける。
    pub fn leave(&self, connection: ConnectionId, board_id: BoardId) -> bool {
        let mut rooms = self.rooms.lock();
        let Some(room) = rooms.get_mut(&board_id) else {
            return false;
        };
        let Some(active) = room.members.remove(&connection) else {
            return false;
        };
        active.send_replace(false);
        tracing::debug!(%board_id, %connection, members = room.members.len(), "relay leave");
        if room.members.is_empty() {
            rooms.remove(&board_id);
        }
        true
    }

    /// ルームを強制的に閉じる（接続断のシミュレーション）
    pub fn close_room(&self, board_id: BoardId) {
        if let Some(room) = self.rooms.lock().remove(&board_id) {
            for active in room.members.values() {
                active.send_replace(false);
            }
            tracing::info!(%board_id, "relay room closed");
        }
    }

    pub fn member_count(&self, board_id: BoardId) -> usize {
        self.rooms
            .lock()
            .get(&board_id)
            .map_or(0, |room| room.members.len())
    }

    /// origin 以外のメンバーへ配信する。配信先の数を返す。
    pub fn broadcast(&self, board_id: BoardId, origin: ConnectionId, event: BoardEvent) -> usize {
        let rooms = self.rooms.lock();
        let Some(room) = rooms.get(&board_id) else {
            return 0;
        };
        let peers = room.members.keys().filter(|c| **c != origin).count();
        tracing::debug!(%board_id, %origin, event = event.name(), peers, "relay broadcast");
        // 受信者がいないときの send エラーは無視してよい
        let _ = room.sender.send(Delivery { origin, event });
        peers
    }

    /// ワイヤメッセージを処理する。Join のときだけ購読を返す。
    pub fn handle_message(
        &self,
        connection: ConnectionId,
        message: RelayMessage,
    ) -> Option<RoomSubscription> {
        match message {
            RelayMessage::Join { board_id } => Some(self.join(connection, board_id)),
            RelayMessage::Leave { board_id } => {
                self.leave(connection, board_id);
                None
            }
            RelayMessage::Event { board_id, event } => {
                self.broadcast(board_id, connection, event);
                None
            }
        }
    }

    /// JSON テキストのメッセージを処理する
    pub fn handle_text(
        &self,
        connection: ConnectionId,
        text: &str,
    ) -> Result<Option<RoomSubscription>, BoardError> {
        let message: RelayMessage = serde_json::from_str(text)
            .map_err(|e| BoardError::InvalidInput(format!("relay message: {e}")))?;
        Ok(self.handle_message(connection, message))
    }
}

#[async_trait]
impl EventSink for RelayHub {
    async fn publish(
        &self,
        board_id: BoardId,
        origin: ConnectionId,
        event: BoardEvent,
    ) -> Result<(), BoardError> {
        self.broadcast(board_id, origin, event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnSlug, TaskId};
    use crate::ports::{SystemClock, UlidGenerator};
    use std::time::Duration;

    fn hub(capacity: usize) -> (RelayHub, BoardId) {
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::new(SystemClock)));
        let board_id = ids.generate_board_id();
        (RelayHub::new(ids, capacity), board_id)
    }

    fn updated(n: i64) -> BoardEvent {
        BoardEvent::TaskUpdated {
            task_id: TaskId::new(n),
        }
    }

    #[tokio::test]
    async fn events_reach_other_members_only() {
        let (hub, board) = hub(16);
        let alice = hub.connect();
        let bob = hub.connect();
        let mut alice_sub = hub.join(alice, board);
        let mut bob_sub = hub.join(bob, board);

        assert_eq!(hub.broadcast(board, alice, updated(1)), 1);

        assert_eq!(bob_sub.next().await, Notice::Event(updated(1)));
        // alice は自分の変更を受け取らない
        let own = tokio::time::timeout(Duration::from_millis(50), alice_sub.next()).await;
        assert!(own.is_err());
    }

    #[tokio::test]
    async fn rooms_are_scoped_by_board() {
        let (hub, board) = hub(16);
        let other_board = BoardId::from_ulid(ulid::Ulid::new());
        let alice = hub.connect();
        let bob = hub.connect();
        let _alice_sub = hub.join(alice, board);
        let mut bob_sub = hub.join(bob, other_board);

        assert_eq!(hub.broadcast(board, alice, updated(1)), 0);
        let got = tokio::time::timeout(Duration::from_millis(50), bob_sub.next()).await;
        assert!(got.is_err());
    }

    #[tokio::test]
    async fn leave_ends_the_subscription() {
        let (hub, board) = hub(16);
        let alice = hub.connect();
        let bob = hub.connect();
        let _alice_sub = hub.join(alice, board);
        let mut bob_sub = hub.join(bob, board);

        assert!(hub.leave(bob, board));
        assert_eq!(hub.member_count(board), 1);
        assert_eq!(bob_sub.next().await, Notice::Closed);
        assert!(!hub.leave(bob, board));
    }

    #[tokio::test]
    async fn leave_wakes_a_subscriber_that_is_already_waiting() {
        let (hub, board) = hub(16);
        let alice = hub.connect();
        let bob = hub.connect();
        let _alice_sub = hub.join(alice, board);
        let mut bob_sub = hub.join(bob, board);

        let waiting = tokio::spawn(async move { bob_sub.next().await });
        tokio::task::yield_now().await;
        assert!(hub.leave(bob, board));

        let notice = tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("subscriber was not woken by leave")
            .unwrap();
        assert_eq!(notice, Notice::Closed);
    }

    #[tokio::test]
    async fn rejoining_closes_the_previous_subscription() {
        let (hub, board) = hub(16);
        let bob = hub.connect();
        let mut first = hub.join(bob, board);
        let _second = hub.join(bob, board);

        assert_eq!(first.next().await, Notice::Closed);
        assert_eq!(hub.member_count(board), 1);
    }

    #[tokio::test]
    async fn closing_a_room_closes_subscribers() {
        let (hub, board) = hub(16);
        let bob = hub.connect();
        let mut bob_sub = hub.join(bob, board);

        hub.close_room(board);
        assert_eq!(bob_sub.next().await, Notice::Closed);
        assert_eq!(hub.member_count(board), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_is_told_it_missed_events() {
        let (hub, board) = hub(2);
        let alice = hub.connect();
        let bob = hub.connect();
        let mut bob_sub = hub.join(bob, board);
        let _alice_sub = hub.join(alice, board);

        for n in 0..5 {
            hub.broadcast(board, alice, updated(n));
        }
        assert!(matches!(bob_sub.next().await, Notice::Missed(_)));
    }

    #[tokio::test]
    async fn wire_messages_drive_the_hub() {
        let (hub, board) = hub(16);
        let alice = hub.connect();
        let bob = hub.connect();

        let join = serde_json::to_string(&RelayMessage::Join { board_id: board }).unwrap();
        let mut bob_sub = hub.handle_text(bob, &join).unwrap().unwrap();
        hub.handle_text(alice, &join).unwrap();

        let event = RelayMessage::Event {
            board_id: board,
            event: BoardEvent::ColumnCreated {
                column: ColumnSlug::new("review"),
            },
        };
        hub.handle_message(alice, event);
        assert!(matches!(
            bob_sub.next().await,
            Notice::Event(BoardEvent::ColumnCreated { .. })
        ));

        assert!(hub.handle_text(alice, "{\"type\":\"nope\"}").is_err());
    }
}

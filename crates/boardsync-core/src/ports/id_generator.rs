//! IdGenerator port - ID 生成の抽象化
//!
//! ULID ベースの ID（BoardId, ActionId, ConnectionId）を生成します。
//! TaskId はストア採番なのでここでは扱わない。

use std::sync::Arc;

use crate::domain::{ActionId, BoardId, ConnectionId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は ULID ベースの ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（エンジン・リレーから共有される）
pub trait IdGenerator: Send + Sync {
    fn generate_board_id(&self) -> BoardId;

    fn generate_action_id(&self) -> ActionId;

    fn generate_connection_id(&self) -> ConnectionId;
}

/// UlidGenerator は Clock の時刻を timestamp 部分に使う
///
/// テスト時に FixedClock を渡すと timestamp 部分が決定的になる。
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_board_id(&self) -> BoardId {
        BoardId::from(self.next_ulid())
    }

    fn generate_action_id(&self) -> ActionId {
        ActionId::from(self.next_ulid())
    }

    fn generate_connection_id(&self) -> ConnectionId {
        ConnectionId::from(self.next_ulid())
    }
}

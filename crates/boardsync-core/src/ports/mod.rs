//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! エンジンは外部（永続ストア、端末ストレージ、リレー、時計）を
//! この trait 越しにしか触らない。
//!
//! # 設計原則
//! - 永続ストアが source of truth（正本）
//! - クライアントのボードは次の再取得までの「キャッシュ」
//! - リレーは「変わった」ことだけを伝える（差分は運ばない）

pub mod board_store;
pub mod clock;
pub mod device_storage;
pub mod event_sink;
pub mod id_generator;

pub use self::board_store::BoardStore;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::device_storage::{DeviceStorage, DeviceStorageError, StorageKey};
pub use self::event_sink::EventSink;
pub use self::id_generator::{IdGenerator, UlidGenerator};

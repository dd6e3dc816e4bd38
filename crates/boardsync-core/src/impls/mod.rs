//! Impls - ports の実装
//!
//! - InMemoryBoardStore: 開発・テスト用の BoardStore
//! - NotifyingStore: 成功した変更をリレーに通知するデコレータ
//! - RelayHub: ボード単位の broadcast リレー（EventSink）
//! - MemoryDeviceStorage / FileDeviceStorage: 端末ストレージ

pub mod file_device;
pub mod memory_device;
pub mod memory_store;
pub mod notifying_store;
pub mod relay;

pub use self::file_device::FileDeviceStorage;
pub use self::memory_device::MemoryDeviceStorage;
pub use self::memory_store::InMemoryBoardStore;
pub use self::notifying_store::NotifyingStore;
pub use self::relay::{Delivery, Notice, RelayHub, RoomSubscription};

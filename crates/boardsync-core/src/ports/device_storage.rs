//! DeviceStorage port - 端末ローカルの KV ストレージ
//!
//! 3 つの論理キーだけを扱う get/set/remove。
//! 使えない環境（容量超過、書き込み不可）ではエラーを返し、
//! エンジン側がセッション中はメモリのみに縮退する。

use thiserror::Error;

/// 論理キー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    BoardSnapshot,
    ActionHistory,
    StorageMode,
}

impl StorageKey {
    pub const ALL: [StorageKey; 3] = [
        StorageKey::BoardSnapshot,
        StorageKey::ActionHistory,
        StorageKey::StorageMode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::BoardSnapshot => "board-snapshot",
            StorageKey::ActionHistory => "action-history",
            StorageKey::StorageMode => "storage-mode",
        }
    }
}

#[derive(Debug, Error)]
pub enum DeviceStorageError {
    #[error("device storage unavailable: {0}")]
    Unavailable(String),

    #[error("device storage io: {0}")]
    Io(#[from] std::io::Error),

    #[error("device storage payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// DeviceStorage は文字列値の KV
///
/// 同期 API（ブラウザの localStorage 相当）。値のエンコードは呼び出し側。
pub trait DeviceStorage: Send + Sync {
    fn get(&self, key: StorageKey) -> Result<Option<String>, DeviceStorageError>;

    fn set(&self, key: StorageKey, value: &str) -> Result<(), DeviceStorageError>;

    fn remove(&self, key: StorageKey) -> Result<(), DeviceStorageError>;
}

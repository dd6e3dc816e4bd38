//! DeviceCache - DeviceStorage の JSON ラッパー
//!
//! 端末ストレージが使えなくなったら、そのセッション中はメモリのみに縮退する。
//! 縮退時の警告は 1 回だけ出す。壊れた値（デコード失敗）は「値なし」として扱う。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{Action, ActionHistory, Board};
use crate::ports::{DeviceStorage, DeviceStorageError, StorageKey};

use super::config::StorageMode;

pub(crate) struct DeviceCache {
    storage: Arc<dyn DeviceStorage>,
    degraded: AtomicBool,
}

impl DeviceCache {
    pub(crate) fn new(storage: Arc<dyn DeviceStorage>) -> Self {
        Self {
            storage,
            degraded: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    fn degrade(&self, key: StorageKey, err: &DeviceStorageError) {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                key = key.as_str(),
                error = %err,
                "device storage unavailable, keeping state in memory for this session"
            );
        }
    }

    fn read<T: DeserializeOwned>(&self, key: StorageKey) -> Option<T> {
        if self.is_degraded() {
            return None;
        }
        let raw = match self.storage.get(key) {
            Ok(raw) => raw?,
            Err(err) => {
                self.degrade(key, &err);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key = key.as_str(), error = %err, "ignoring unreadable device value");
                None
            }
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) {
        if self.is_degraded() {
            return;
        }
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(key = key.as_str(), error = %err, "device value not encodable");
                return;
            }
        };
        if let Err(err) = self.storage.set(key, &json) {
            self.degrade(key, &err);
        }
    }

    fn discard(&self, key: StorageKey) {
        if self.is_degraded() {
            return;
        }
        if let Err(err) = self.storage.remove(key) {
            self.degrade(key, &err);
        }
    }

    pub(crate) fn load_board(&self) -> Option<Board> {
        let board: Board = self.read(StorageKey::BoardSnapshot)?;
        match board.check_invariants() {
            Ok(()) => Some(board),
            Err(violation) => {
                tracing::warn!(%violation, "ignoring inconsistent board snapshot");
                None
            }
        }
    }

    pub(crate) fn save_board(&self, board: &Board) {
        self.write(StorageKey::BoardSnapshot, board);
    }

    pub(crate) fn load_history(&self, capacity: usize) -> ActionHistory {
        let entries: Vec<Action> = self.read(StorageKey::ActionHistory).unwrap_or_default();
        ActionHistory::from_entries(capacity, entries)
    }

    pub(crate) fn save_history(&self, history: &ActionHistory) {
        self.write(StorageKey::ActionHistory, &history.to_vec());
    }

    pub(crate) fn load_mode(&self) -> Option<StorageMode> {
        self.read(StorageKey::StorageMode)
    }

    pub(crate) fn save_mode(&self, mode: StorageMode) {
        self.write(StorageKey::StorageMode, &mode);
    }

    /// スナップショットと履歴を捨てる（モードは残す）
    pub(crate) fn clear_board(&self) {
        self.discard(StorageKey::BoardSnapshot);
        self.discard(StorageKey::ActionHistory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BoardLimits;
    use crate::impls::MemoryDeviceStorage;

    #[test]
    fn board_round_trips_through_storage() {
        let storage = Arc::new(MemoryDeviceStorage::new());
        let cache = DeviceCache::new(storage.clone());
        let board = Board::with_columns(&["Todo"], &BoardLimits::default()).unwrap();

        cache.save_board(&board);
        cache.save_mode(StorageMode::Synced);
        assert_eq!(cache.load_board(), Some(board));
        assert_eq!(cache.load_mode(), Some(StorageMode::Synced));
        assert!(storage.get(StorageKey::BoardSnapshot).unwrap().is_some());
    }

    #[test]
    fn corrupt_values_read_as_missing() {
        let storage = Arc::new(MemoryDeviceStorage::new());
        storage.set(StorageKey::BoardSnapshot, "{not json").unwrap();
        let cache = DeviceCache::new(storage);
        assert_eq!(cache.load_board(), None);
        assert!(!cache.is_degraded());
    }

    #[test]
    fn failing_storage_degrades_to_memory() {
        let storage = Arc::new(MemoryDeviceStorage::unavailable());
        let cache = DeviceCache::new(storage.clone());

        cache.save_mode(StorageMode::LocalOnly);
        assert!(cache.is_degraded());

        // 復旧しても、このセッションでは触らない
        storage.set_available(true);
        cache.save_mode(StorageMode::LocalOnly);
        assert_eq!(storage.get(StorageKey::StorageMode).unwrap(), None);
    }

    #[test]
    fn clear_keeps_the_mode() {
        let cache = DeviceCache::new(Arc::new(MemoryDeviceStorage::new()));
        cache.save_mode(StorageMode::LocalOnly);
        cache.save_board(&Board::empty());
        cache.clear_board();
        assert_eq!(cache.load_board(), None);
        assert_eq!(cache.load_mode(), Some(StorageMode::LocalOnly));
    }
}

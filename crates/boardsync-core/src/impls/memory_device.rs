//! In-memory device storage (tests, and environments without a disk).

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::ports::{DeviceStorage, DeviceStorageError, StorageKey};

#[derive(Debug)]
pub struct MemoryDeviceStorage {
    values: Mutex<HashMap<StorageKey, String>>,
    available: Mutex<bool>,
}

impl MemoryDeviceStorage {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            available: Mutex::new(true),
        }
    }

    /// Storage that rejects every call (quota exceeded, private mode, ...).
    pub fn unavailable() -> Self {
        let storage = Self::new();
        storage.set_available(false);
        storage
    }

    pub fn set_available(&self, available: bool) {
        *self.available.lock() = available;
    }

    fn ensure_available(&self) -> Result<(), DeviceStorageError> {
        if *self.available.lock() {
            Ok(())
        } else {
            Err(DeviceStorageError::Unavailable("storage disabled".into()))
        }
    }
}

impl Default for MemoryDeviceStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStorage for MemoryDeviceStorage {
    fn get(&self, key: StorageKey) -> Result<Option<String>, DeviceStorageError> {
        self.ensure_available()?;
        Ok(self.values.lock().get(&key).cloned())
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), DeviceStorageError> {
        self.ensure_available()?;
        self.values.lock().insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<(), DeviceStorageError> {
        self.ensure_available()?;
        self.values.lock().remove(&key);
        Ok(())
    }
}

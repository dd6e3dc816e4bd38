//! File-backed device storage: one `<key>.json` file per logical key.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::ports::{DeviceStorage, DeviceStorageError, StorageKey};

pub struct FileDeviceStorage {
    root: PathBuf,
}

impl FileDeviceStorage {
    /// Store files under `root` (created if missing).
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, DeviceStorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: StorageKey) -> PathBuf {
        self.root.join(format!("{}.json", key.as_str()))
    }

    /// Write to `.tmp`, fsync, then rename over the target.
    fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
        let tmp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

impl DeviceStorage for FileDeviceStorage {
    fn get(&self, key: StorageKey) -> Result<Option<String>, DeviceStorageError> {
        match fs::read_to_string(self.path_of(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), DeviceStorageError> {
        Self::atomic_write(&self.path_of(key), value)?;
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<(), DeviceStorageError> {
        match fs::remove_file(self.path_of(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

//! EngineBuilder - エンジンの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - シングルトンを使わず、依存はすべて外から渡す

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::impls::MemoryDeviceStorage;
use crate::ports::{BoardStore, Clock, DeviceStorage, IdGenerator, SystemClock, UlidGenerator};

use super::config::{EngineConfig, StorageMode};
use super::device_cache::DeviceCache;
use super::dispatcher::Dispatcher;
use super::engine::{BoardEngine, EngineCore};

/// EngineBuilder は BoardEngine を構築
///
/// # 使用例
/// ```ignore
/// let engine = EngineBuilder::new()
///     .store(Arc::new(store))
///     .device(Arc::new(FileDeviceStorage::new(dir)?))
///     .mode(StorageMode::Synced)
///     .build()?;
/// ```
///
/// # 既定値
/// - device: MemoryDeviceStorage
/// - clock: SystemClock
/// - ids: UlidGenerator（clock を使う）
/// - mode: 端末に保存されている選択（なければ未選択）
///
/// # Fail-fast 設計
/// - build() 時に設定を検証し、おかしければ BuildError を返す
/// - synced モードなのに store がなければ BuildError
pub struct EngineBuilder {
    store: Option<Arc<dyn BoardStore>>,
    device: Option<Arc<dyn DeviceStorage>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    config: EngineConfig,
    mode: Option<StorageMode>,
}

/// BuildError はエンジン構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("Synced mode was requested but no board store was provided.")]
    MissingStore,

    #[error("EngineBuilder::build() must be called from inside a Tokio runtime.")]
    NoRuntime,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            device: None,
            clock: None,
            ids: None,
            config: EngineConfig::default(),
            mode: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn BoardStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn device(mut self, device: Arc<dyn DeviceStorage>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// 保存先を最初から決めておく（端末の選択より優先）
    pub fn mode(mut self, mode: StorageMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// 検証してエンジンを起動する（dispatcher を spawn する）
    pub fn build(self) -> Result<BoardEngine, BuildError> {
        self.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BuildError::NoRuntime)?;

        let storage: Arc<dyn DeviceStorage> = match self.device {
            Some(device) => device,
            None => Arc::new(MemoryDeviceStorage::new()),
        };
        let device = DeviceCache::new(storage);
        let mode = match self.mode {
            Some(mode) => {
                device.save_mode(mode);
                Some(mode)
            }
            None => device.load_mode(),
        };
        if mode == Some(StorageMode::Synced) && self.store.is_none() {
            return Err(BuildError::MissingStore);
        }

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };

        let (outbox, receiver) = mpsc::unbounded_channel();
        let core = Arc::new(EngineCore::new(
            self.store,
            device,
            clock,
            ids,
            self.config,
            mode,
            outbox,
        ));
        let _guard = runtime.enter();
        let dispatcher = Dispatcher::spawn(Arc::clone(&core), receiver);
        tracing::debug!(?mode, "board engine built");
        Ok(BoardEngine::from_parts(core, dispatcher))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

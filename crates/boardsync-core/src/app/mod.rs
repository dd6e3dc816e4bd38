//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてクライアント側のエンジンを実装します。
//!
//! # 主要コンポーネント
//! - **EngineBuilder**: エンジンの構築とワイヤリング
//! - **BoardEngine**: 楽観的更新エンジン（ローカル更新 → 送信箱 → BoardStore）
//! - **Dispatcher**: 送信箱を順番に処理するバックグラウンドタスク
//! - **SyncLoop**: リレーの通知を再取得につなぐループ
//! - **EngineStatus**: 詰まり理由の説明

pub mod builder;
pub mod config;
mod device_cache;
mod dispatcher;
pub mod engine;
pub mod pending;
pub mod status;
pub mod sync_loop;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, EngineBuilder};
pub use self::config::{EngineConfig, StorageMode};
pub use self::engine::{BoardEngine, Invalidator};
pub use self::pending::PendingCreations;
pub use self::status::{EngineStatus, FailedCall};
pub use self::sync_loop::{SyncHandle, SyncLoop};

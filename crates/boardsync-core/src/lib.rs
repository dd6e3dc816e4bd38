//! boardsync-core
//!
//! Core building blocks for a collaborative task board.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, column, board, action, events, errors, limits）
//! - **reconcile**: 並べ替えの純粋関数（ドラッグ＆ドロップ、カラムの追加・削除・移動）
//! - **ports**: 抽象化レイヤー（BoardStore, DeviceStorage, EventSink, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryBoardStore, NotifyingStore, RelayHub, 端末ストレージ）
//! - **app**: エンジン（builder, engine, dispatcher, sync loop, status）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod reconcile;

#[cfg(test)]
pub(crate) mod testing;

//! BoardStore port - 永続ストアが実装する正本（source of truth）
//!
//! リレーショナル（行 + position 整数）、ドキュメント（ボード 1 文書）、
//! KV（ボード 1 blob）のどれで実装してもよい。エンジンはこの trait しか知らない。
//!
//! # 実装
//! - `impls::InMemoryBoardStore`: 開発・テスト用
//! - `impls::NotifyingStore`: 任意の BoardStore をラップし、成功時にリレーへ通知

use async_trait::async_trait;

use crate::domain::{Board, BoardError, ColumnSlug, Task, TaskId};

/// BoardStore はボード集約の正本
///
/// # 設計原則
/// - 1 呼び出し = 1 トランザクション（all-or-nothing、部分適用しない）
/// - `move_task` / `move_column` は直列化する（並行した並べ替えを交錯させない）
/// - 失敗は `NotFound` / `Conflict` / `Unavailable` / `InvalidInput` のみ
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// 現在のボード全体。部分的な結果は返さない。
    async fn fetch_board(&self) -> Result<Board, BoardError>;

    /// `column` の末尾に追加し、採番済みの Task を返す。
    async fn create_task(&self, column: &ColumnSlug, title: &str) -> Result<Task, BoardError>;

    /// タスクを削除し、保持しているカラムからも外す。存在しなければ NotFound。
    async fn delete_task(&self, task_id: TaskId) -> Result<(), BoardError>;

    /// 内容のみ更新。順序には触れない。
    async fn edit_task(&self, task_id: TaskId, title: &str) -> Result<(), BoardError>;

    /// 移動元・移動先の順序とカラム参照を原子的に更新する。
    async fn move_task(
        &self,
        task_id: TaskId,
        dest_column: &ColumnSlug,
        dest_index: usize,
    ) -> Result<(), BoardError>;

    /// スラッグを導出し、一意性と上限を検証して末尾に追加する。
    async fn add_column(&self, name: &str) -> Result<Board, BoardError>;

    /// カラムとそのタスクを削除する（カスケード）。
    async fn remove_column(&self, slug: &ColumnSlug) -> Result<(), BoardError>;

    /// カラム順序を並べ替え、全カラムの position を書き直す。
    async fn move_column(&self, slug: &ColumnSlug, dest_index: usize) -> Result<(), BoardError>;
}

//! Pending creations - まだストアに存在しない provisional タスク
//!
//! 状態遷移:
//! - `create_task` で Provisional（仮タイトル、ストア呼び出しなし）
//! - 最初の内容編集で Committed（ここで初めて `create_task` を発行）
//! - Provisional のまま削除されたら、ストアには何も送らない

use std::collections::BTreeMap;

use crate::domain::{Board, ColumnSlug, TaskId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingCreations {
    /// task id -> 作成時のカラム
    entries: BTreeMap<TaskId, ColumnSlug>,
}

impl PendingCreations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task_id: TaskId, column: ColumnSlug) {
        self.entries.insert(task_id, column);
    }

    /// Provisional から外す。Provisional だったなら作成時のカラムを返す。
    pub fn remove(&mut self, task_id: TaskId) -> Option<ColumnSlug> {
        self.entries.remove(&task_id)
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.entries.contains_key(&task_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.entries.keys().copied().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 再取得したボードに、まだ Provisional なタスクを載せ直す。
    ///
    /// ローカルで直前にあったタスクが再取得後も同じカラムにあれば、その直後へ
    /// 戻す（なければ先頭）。ローカルで並べ替えた位置はこれで保たれる。
    /// カラムが消えていたら（他のクライアントが削除した）Provisional からも外す。
    pub fn carry_over(&mut self, local: &Board, fetched: Board) -> Board {
        // ローカルの並び順に処理する（前にある Provisional が後ろの目印になる）
        let ordered: Vec<TaskId> = local
            .ordered_columns()
            .flat_map(|c| c.task_order.iter().copied())
            .filter(|id| self.entries.contains_key(id))
            .collect();
        let mut dropped: Vec<TaskId> = self
            .entries
            .keys()
            .copied()
            .filter(|id| !ordered.contains(id))
            .collect();

        let mut board = fetched;
        for task_id in ordered {
            match carry_one(&board, local, task_id) {
                Some(next) => board = next,
                None => dropped.push(task_id),
            }
        }
        for task_id in dropped {
            tracing::debug!(%task_id, "provisional task dropped by refetch");
            self.entries.remove(&task_id);
        }
        board
    }
}

fn carry_one(board: &Board, local: &Board, task_id: TaskId) -> Option<Board> {
    let task = local.task(task_id)?;
    let column = local.column_of(task_id)?;
    let local_order = local.task_order(column);
    let index = local_order.iter().position(|id| *id == task_id)?;

    let dest_order = board.task_order(column);
    let dest_index = local_order[..index]
        .iter()
        .rev()
        .find_map(|anchor| dest_order.iter().position(|id| id == anchor))
        .map_or(0, |at| at + 1);

    board
        .with_task_appended(task.clone(), column)
        .and_then(|next| next.with_task_relocated(task_id, column, dest_index))
        .ok()
}

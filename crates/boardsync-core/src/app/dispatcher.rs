//! Dispatcher - 送信箱（outbox）を 1 本のタスクで順番に処理する
//!
//! # 学習ポイント
//! - mpsc 1 本 + 消費者 1 つ = 発行順のまま BoardStore を呼べる
//! - ロック（parking_lot）は `.await` をまたがない
//! - provisional id → 永続化 id の付け替え（alias）はここだけが知っている
//!   （付け替え前に積まれた呼び出しも、送る直前に永続化 id へ直す）
//!
//! # 処理するもの
//! - `Store`: BoardStore 呼び出し。失敗はログと診断に残し、ローカル状態は戻さない
//! - `Persist`: 端末ストレージへのスナップショット書き込み（まとめて 1 回）
//! - `Refetch`: 全体を再取得して置き換える。後ろに呼び出しが残っていれば保留
//! - `Flush`: ここまでの処理が終わったことを知らせる

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::domain::{BoardError, ColumnSlug, TaskId};
use crate::ports::BoardStore;

use super::engine::EngineCore;

pub(crate) enum Command {
    Store(StoreCall),
    Persist,
    Refetch,
    Flush(oneshot::Sender<()>),
}

/// 発行済みの BoardStore 呼び出し 1 件
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StoreCall {
    /// Provisional タスクの確定。`local_id` は永続化 id に付け替わる。
    CreateTask {
        local_id: TaskId,
        column: ColumnSlug,
        title: String,
    },
    EditTask {
        task_id: TaskId,
        title: String,
    },
    DeleteTask {
        task_id: TaskId,
    },
    MoveTask {
        task_id: TaskId,
        dest_column: ColumnSlug,
        dest_index: usize,
    },
    AddColumn {
        name: String,
    },
    RemoveColumn {
        slug: ColumnSlug,
    },
    MoveColumn {
        slug: ColumnSlug,
        dest_index: usize,
    },
}

impl StoreCall {
    pub(crate) fn operation(&self) -> &'static str {
        match self {
            StoreCall::CreateTask { .. } => "create_task",
            StoreCall::EditTask { .. } => "edit_task",
            StoreCall::DeleteTask { .. } => "delete_task",
            StoreCall::MoveTask { .. } => "move_task",
            StoreCall::AddColumn { .. } => "add_column",
            StoreCall::RemoveColumn { .. } => "remove_column",
            StoreCall::MoveColumn { .. } => "move_column",
        }
    }

    /// 既存タスクを参照する呼び出しの task id
    fn target_mut(&mut self) -> Option<&mut TaskId> {
        match self {
            StoreCall::EditTask { task_id, .. }
            | StoreCall::DeleteTask { task_id }
            | StoreCall::MoveTask { task_id, .. } => Some(task_id),
            _ => None,
        }
    }
}

pub(crate) struct Dispatcher {
    core: Arc<EngineCore>,
    /// provisional id -> 永続化 id
    aliases: HashMap<TaskId, TaskId>,
}

impl Dispatcher {
    pub(crate) fn spawn(
        core: Arc<EngineCore>,
        outbox: mpsc::UnboundedReceiver<Command>,
    ) -> JoinHandle<()> {
        let dispatcher = Self {
            core,
            aliases: HashMap::new(),
        };
        tokio::spawn(dispatcher.run(outbox))
    }

    async fn run(mut self, mut outbox: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = outbox.recv().await {
            match command {
                Command::Store(call) => self.dispatch(call).await,
                Command::Persist => self.core.persist_now(),
                Command::Refetch => self.refetch().await,
                Command::Flush(done) => {
                    // 待ち手がいなくなっていても構わない
                    let _ = done.send(());
                }
            }
        }
        tracing::debug!("outbox closed, dispatcher stopped");
    }

    async fn dispatch(&mut self, mut call: StoreCall) {
        if let Some(task_id) = call.target_mut() {
            if let Some(persisted) = self.aliases.get(task_id) {
                *task_id = *persisted;
            }
        }
        let operation = call.operation();

        let result = match self.core.store() {
            Some(store) => self.execute(&store, call).await,
            None => Err(BoardError::Unavailable("no board store configured".into())),
        };
        match result {
            Ok(()) => tracing::debug!(operation, "store call committed"),
            Err(err) => {
                tracing::warn!(operation, error = %err, "store call failed, keeping local state");
                self.core.record_failure(operation, err);
            }
        }

        if self.core.finish_call() {
            self.refetch().await;
        }
    }

    async fn execute(&mut self, store: &Arc<dyn BoardStore>, call: StoreCall) -> Result<(), BoardError> {
        match call {
            StoreCall::CreateTask {
                local_id,
                column,
                title,
            } => match store.create_task(&column, &title).await {
                Ok(task) => {
                    tracing::debug!(%local_id, task_id = %task.id, "provisional task persisted");
                    self.aliases.insert(local_id, task.id);
                    self.core.renumber(local_id, task.id);
                    Ok(())
                }
                Err(err) => {
                    // 次の編集でもう一度作成を試みる
                    self.core.reopen_pending(local_id, column);
                    Err(err)
                }
            },
            StoreCall::EditTask { task_id, title } => {
                ensure_persisted(task_id)?;
                store.edit_task(task_id, &title).await
            }
            StoreCall::DeleteTask { task_id } => {
                ensure_persisted(task_id)?;
                store.delete_task(task_id).await
            }
            StoreCall::MoveTask {
                task_id,
                dest_column,
                dest_index,
            } => {
                ensure_persisted(task_id)?;
                store.move_task(task_id, &dest_column, dest_index).await
            }
            StoreCall::AddColumn { name } => store.add_column(&name).await.map(|_| ()),
            StoreCall::RemoveColumn { slug } => store.remove_column(&slug).await,
            StoreCall::MoveColumn { slug, dest_index } => store.move_column(&slug, dest_index).await,
        }
    }

    async fn refetch(&mut self) {
        self.core.begin_refetch();
        let Some(store) = self.core.store() else {
            return;
        };
        match store.fetch_board().await {
            Ok(board) => {
                if self.core.apply_fetched(board) {
                    tracing::debug!("board refetched");
                } else {
                    tracing::debug!("refetch deferred until queued calls finish");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "refetch failed, keeping local board");
                self.core.record_failure("fetch_board", err);
            }
        }
    }
}

fn ensure_persisted(task_id: TaskId) -> Result<(), BoardError> {
    if task_id.is_local() {
        Err(BoardError::NotFound(format!("{task_id} was never persisted")))
    } else {
        Ok(())
    }
}

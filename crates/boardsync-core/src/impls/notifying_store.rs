//! NotifyingStore - 成功した変更をリレーへ通知する BoardStore デコレータ
//!
//! 内側のストアが `Ok` を返した呼び出しだけを 1 イベントとして publish する。
//! publish の失敗はログに残すだけで、呼び出し側には返さない
//! （変更自体はコミット済み。他メンバーは次の再取得で追いつく）。

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Board, BoardError, BoardEvent, BoardId, ColumnSlug, ConnectionId, Task, TaskId};
use crate::ports::{BoardStore, EventSink};

pub struct NotifyingStore {
    inner: Arc<dyn BoardStore>,
    sink: Arc<dyn EventSink>,
    board_id: BoardId,
    origin: ConnectionId,
}

impl NotifyingStore {
    pub fn new(
        inner: Arc<dyn BoardStore>,
        sink: Arc<dyn EventSink>,
        board_id: BoardId,
        origin: ConnectionId,
    ) -> Self {
        Self {
            inner,
            sink,
            board_id,
            origin,
        }
    }

    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    pub fn origin(&self) -> ConnectionId {
        self.origin
    }

    async fn notify(&self, event: BoardEvent) {
        let name = event.name();
        if let Err(err) = self.sink.publish(self.board_id, self.origin, event).await {
            tracing::warn!(board_id = %self.board_id, event = name, error = %err, "publish failed");
        }
    }
}

#[async_trait]
impl BoardStore for NotifyingStore {
    async fn fetch_board(&self) -> Result<Board, BoardError> {
        self.inner.fetch_board().await
    }

    async fn create_task(&self, column: &ColumnSlug, title: &str) -> Result<Task, BoardError> {
        let task = self.inner.create_task(column, title).await?;
        self.notify(BoardEvent::TaskCreated {
            task_id: task.id,
            column: column.clone(),
        })
        .await;
        Ok(task)
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<(), BoardError> {
        self.inner.delete_task(task_id).await?;
        self.notify(BoardEvent::TaskDeleted { task_id }).await;
        Ok(())
    }

    async fn edit_task(&self, task_id: TaskId, title: &str) -> Result<(), BoardError> {
        self.inner.edit_task(task_id, title).await?;
        self.notify(BoardEvent::TaskUpdated { task_id }).await;
        Ok(())
    }

    async fn move_task(
        &self,
        task_id: TaskId,
        dest_column: &ColumnSlug,
        dest_index: usize,
    ) -> Result<(), BoardError> {
        self.inner.move_task(task_id, dest_column, dest_index).await?;
        self.notify(BoardEvent::TaskMoved {
            task_id,
            to_column: dest_column.clone(),
            to_index: dest_index,
        })
        .await;
        Ok(())
    }

    async fn add_column(&self, name: &str) -> Result<Board, BoardError> {
        let board = self.inner.add_column(name).await?;
        // 成功したならスラッグは必ず導出できる
        if let Some(column) = ColumnSlug::from_display_name(name.trim()) {
            self.notify(BoardEvent::ColumnCreated { column }).await;
        }
        Ok(board)
    }

    async fn remove_column(&self, slug: &ColumnSlug) -> Result<(), BoardError> {
        self.inner.remove_column(slug).await?;
        self.notify(BoardEvent::ColumnDeleted {
            column: slug.clone(),
        })
        .await;
        Ok(())
    }

    async fn move_column(&self, slug: &ColumnSlug, dest_index: usize) -> Result<(), BoardError> {
        self.inner.move_column(slug, dest_index).await?;
        self.notify(BoardEvent::ColumnMoved {
            column: slug.clone(),
            to_index: dest_index,
        })
        .await;
        Ok(())
    }
}

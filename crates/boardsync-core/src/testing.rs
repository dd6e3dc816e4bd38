//! Test helpers shared by the in-module tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use crate::app::{BoardEngine, EngineBuilder, StorageMode};
use crate::domain::{Board, BoardError, BoardLimits, ColumnSlug, Task, TaskId};
use crate::impls::{InMemoryBoardStore, MemoryDeviceStorage};
use crate::ports::{BoardStore, DeviceStorage, FixedClock};

pub(crate) fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    ))
}

pub(crate) fn slug(s: &str) -> ColumnSlug {
    ColumnSlug::new(s)
}

/// Board with "Todo" and "Done" columns and no tasks.
pub(crate) fn todo_done() -> Board {
    Board::with_columns(&["Todo", "Done"], &BoardLimits::default()).unwrap()
}

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub op: &'static str,
    pub detail: String,
}

/// `BoardStore` decorator that records every call before forwarding it.
pub(crate) struct RecordingStore {
    inner: InMemoryBoardStore,
    calls: Mutex<Vec<Call>>,
}

impl RecordingStore {
    pub(crate) fn new(board: Board) -> Self {
        Self {
            inner: InMemoryBoardStore::with_board(board, BoardLimits::default(), fixed_clock()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn inner(&self) -> &InMemoryBoardStore {
        &self.inner
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn count(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.op == op).count()
    }

    /// Every call except `fetch_board`.
    pub(crate) fn mutations(&self) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.op != "fetch_board")
            .cloned()
            .collect()
    }

    fn log(&self, op: &'static str, detail: String) {
        self.calls.lock().push(Call { op, detail });
    }
}

#[async_trait]
impl BoardStore for RecordingStore {
    async fn fetch_board(&self) -> Result<Board, BoardError> {
        self.log("fetch_board", String::new());
        self.inner.fetch_board().await
    }

    async fn create_task(&self, column: &ColumnSlug, title: &str) -> Result<Task, BoardError> {
        self.log("create_task", format!("{column} {title}"));
        self.inner.create_task(column, title).await
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<(), BoardError> {
        self.log("delete_task", task_id.to_string());
        self.inner.delete_task(task_id).await
    }

    async fn edit_task(&self, task_id: TaskId, title: &str) -> Result<(), BoardError> {
        self.log("edit_task", format!("{task_id} {title}"));
        self.inner.edit_task(task_id, title).await
    }

    async fn move_task(
        &self,
        task_id: TaskId,
        dest_column: &ColumnSlug,
        dest_index: usize,
    ) -> Result<(), BoardError> {
        self.log("move_task", format!("{task_id} {dest_column}@{dest_index}"));
        self.inner.move_task(task_id, dest_column, dest_index).await
    }

    async fn add_column(&self, name: &str) -> Result<Board, BoardError> {
        self.log("add_column", name.to_string());
        self.inner.add_column(name).await
    }

    async fn remove_column(&self, slug: &ColumnSlug) -> Result<(), BoardError> {
        self.log("remove_column", slug.to_string());
        self.inner.remove_column(slug).await
    }

    async fn move_column(&self, slug: &ColumnSlug, dest_index: usize) -> Result<(), BoardError> {
        self.log("move_column", format!("{slug}@{dest_index}"));
        self.inner.move_column(slug, dest_index).await
    }
}

/// Synced engine over `store`, already hydrated.
pub(crate) async fn synced_engine(store: Arc<RecordingStore>) -> BoardEngine {
    synced_engine_with_device(store, Arc::new(MemoryDeviceStorage::new())).await
}

pub(crate) async fn synced_engine_with_device(
    store: Arc<RecordingStore>,
    device: Arc<dyn DeviceStorage>,
) -> BoardEngine {
    let engine = EngineBuilder::new()
        .store(store)
        .device(device)
        .clock(fixed_clock())
        .mode(StorageMode::Synced)
        .build()
        .unwrap();
    engine.hydrate().await.unwrap();
    engine
}

/// Local-only engine over `device`, already hydrated.
pub(crate) async fn local_engine(device: Arc<dyn DeviceStorage>) -> BoardEngine {
    let engine = EngineBuilder::new()
        .device(device)
        .clock(fixed_clock())
        .mode(StorageMode::LocalOnly)
        .build()
        .unwrap();
    engine.hydrate().await.unwrap();
    engine
}

//! In-memory board store.
//!
//! The whole board lives behind one async mutex, so every call is a single
//! serialized transaction: the next board is computed from the current one
//! with the pure `Board` constructors and swapped in only on success.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Board, BoardError, BoardLimits, ColumnSlug, Task, TaskId};
use crate::ports::{BoardStore, Clock};

/// In-memory store state.
struct InMemoryStoreState {
    /// The board (single source of truth).
    board: Board,

    /// Next task id to assign.
    next_task_id: i64,

    /// Simulated reachability (false -> every call is `Unavailable`).
    available: bool,
}

impl InMemoryStoreState {
    fn new(board: Board) -> Self {
        let next_task_id = board.max_task_id().map_or(1, |id| id.get().max(0) + 1);
        Self {
            board,
            next_task_id,
            available: true,
        }
    }

    fn allocate_task_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_task_id);
        self.next_task_id += 1;
        id
    }

    fn ensure_available(&self) -> Result<(), BoardError> {
        if self.available {
            Ok(())
        } else {
            Err(BoardError::Unavailable("in-memory store is offline".into()))
        }
    }

    /// Swap in the next board.
    fn commit(&mut self, next: Board) {
        debug_assert!(
            next.check_invariants().is_ok(),
            "store produced an invalid board: {:?}",
            next.check_invariants()
        );
        self.board = next;
    }
}

/// In-memory `BoardStore`.
pub struct InMemoryBoardStore {
    state: Arc<Mutex<InMemoryStoreState>>,
    limits: BoardLimits,
    clock: Arc<dyn Clock>,
}

impl InMemoryBoardStore {
    /// Start from an empty board.
    pub fn new(limits: BoardLimits, clock: Arc<dyn Clock>) -> Self {
        Self::with_board(Board::empty(), limits, clock)
    }

    /// Start from an existing board (ids continue after its highest task id).
    pub fn with_board(board: Board, limits: BoardLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryStoreState::new(board))),
            limits,
            clock,
        }
    }

    /// Toggle simulated reachability.
    pub async fn set_available(&self, available: bool) {
        self.state.lock().await.available = available;
    }

    /// Current board, bypassing availability (for inspection).
    pub async fn snapshot(&self) -> Board {
        self.state.lock().await.board.clone()
    }
}

#[async_trait]
impl BoardStore for InMemoryBoardStore {
    async fn fetch_board(&self) -> Result<Board, BoardError> {
        let state = self.state.lock().await;
        state.ensure_available()?;
        Ok(state.board.clone())
    }

    async fn create_task(&self, column: &ColumnSlug, title: &str) -> Result<Task, BoardError> {
        let title = self.limits.task_title(title)?;
        let mut state = self.state.lock().await;
        state.ensure_available()?;
        if state.board.column(column).is_none() {
            return Err(BoardError::column_not_found(column));
        }

        let task = Task::new(state.allocate_task_id(), title, self.clock.now());
        let next = state.board.with_task_appended(task.clone(), column)?;
        state.commit(next);
        Ok(task)
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<(), BoardError> {
        let mut state = self.state.lock().await;
        state.ensure_available()?;
        let next = state.board.with_task_removed(task_id)?;
        state.commit(next);
        Ok(())
    }

    async fn edit_task(&self, task_id: TaskId, title: &str) -> Result<(), BoardError> {
        let title = self.limits.task_title(title)?;
        let mut state = self.state.lock().await;
        state.ensure_available()?;
        let next = state
            .board
            .with_task_retitled(task_id, title, self.clock.now())?;
        state.commit(next);
        Ok(())
    }

    async fn move_task(
        &self,
        task_id: TaskId,
        dest_column: &ColumnSlug,
        dest_index: usize,
    ) -> Result<(), BoardError> {
        let mut state = self.state.lock().await;
        state.ensure_available()?;
        let next = state
            .board
            .with_task_relocated(task_id, dest_column, dest_index)?;
        state.commit(next);
        Ok(())
    }

    async fn add_column(&self, name: &str) -> Result<Board, BoardError> {
        let mut state = self.state.lock().await;
        state.ensure_available()?;
        let (next, _slug) = state.board.with_column_inserted(name, &self.limits)?;
        state.commit(next.clone());
        Ok(next)
    }

    async fn remove_column(&self, slug: &ColumnSlug) -> Result<(), BoardError> {
        let mut state = self.state.lock().await;
        state.ensure_available()?;
        let (next, _removed) = state.board.with_column_removed(slug)?;
        state.commit(next);
        Ok(())
    }

    async fn move_column(&self, slug: &ColumnSlug, dest_index: usize) -> Result<(), BoardError> {
        let mut state = self.state.lock().await;
        state.ensure_available()?;
        let next = state.board.with_column_moved(slug, dest_index)?;
        state.commit(next);
        Ok(())
    }
}

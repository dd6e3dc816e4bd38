//! BoardEngine - 楽観的更新エンジン
//!
//! # 変更の流れ
//! 1. 純粋なコンストラクタ（`Board::with_*`）で次のボードを計算
//! 2. ローカルのボードを同期的に置き換える（I/O より先）
//! 3. Action を履歴へ追加（上限付き）
//! 4. synced モード: BoardStore 呼び出しを送信箱へ積む（失敗してもローカルは戻さない）
//! 5. スナップショットの保存を予約（同じサイクルの変更はまとめて 1 回）
//!
//! ローカルの状態は parking_lot の Mutex 1 つで守る。
//! ロックを持ったまま `.await` しないので、同期 API からも非同期 API からも触れる。

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::domain::{
    Action, ActionHistory, ActionKind, Board, BoardError, ColumnSlug, Task, TaskId,
};
use crate::ports::{BoardStore, Clock, IdGenerator};
use crate::reconcile::MoveRequest;

use super::config::{EngineConfig, StorageMode};
use super::device_cache::DeviceCache;
use super::dispatcher::{Command, StoreCall};
use super::pending::PendingCreations;
use super::status::{Diagnostics, EngineStatus, FailedCall};

/// エンジンのローカル状態
pub(crate) struct EngineState {
    mode: Option<StorageMode>,
    hydrated: bool,
    board: Board,
    history: ActionHistory,
    pending: PendingCreations,

    /// synced モードで次に振る provisional id（負の値）
    next_local_id: i64,

    /// 送信箱に積まれていて、まだ終わっていないストア呼び出し
    queued_calls: usize,
    refetch_scheduled: bool,
    refetch_deferred: bool,
    persist_scheduled: bool,

    diagnostics: Diagnostics,
    relay_connected: Option<bool>,
}

impl EngineState {
    fn new(mode: Option<StorageMode>, history_capacity: usize) -> Self {
        Self {
            mode,
            hydrated: false,
            board: Board::empty(),
            history: ActionHistory::new(history_capacity),
            pending: PendingCreations::new(),
            next_local_id: -1,
            queued_calls: 0,
            refetch_scheduled: false,
            refetch_deferred: false,
            persist_scheduled: false,
            diagnostics: Diagnostics::default(),
            relay_connected: None,
        }
    }

    fn require_mode(&self) -> Result<StorageMode, BoardError> {
        self.mode
            .ok_or_else(|| BoardError::InvalidInput("storage mode has not been selected".into()))
    }

    fn provisional_id(&mut self, mode: StorageMode) -> TaskId {
        match mode {
            StorageMode::Synced => {
                let id = TaskId::new(self.next_local_id);
                self.next_local_id -= 1;
                id
            }
            StorageMode::LocalOnly => {
                TaskId::new(self.board.max_task_id().map_or(1, |id| id.get().max(0) + 1))
            }
        }
    }

    /// `task_id` がストア側の並びで占める位置 (カラム, index, 末尾か)。
    ///
    /// Provisional タスクはストアに存在しないので数えない。確定済みで
    /// id の付け替えがまだのタスクは数える（先に積んだ create が届いている）。
    fn store_slot(&self, task_id: TaskId) -> Option<(ColumnSlug, usize, bool)> {
        let column = self.board.column_of(task_id)?.clone();
        let order = self.board.task_order(&column);
        let index = order.iter().position(|id| *id == task_id)?;
        let known = |id: &TaskId| !self.pending.contains(*id);
        let before = order[..index].iter().filter(|id| known(*id)).count();
        let at_tail = !order[index + 1..].iter().any(known);
        Some((column, before, at_tail))
    }
}

/// エンジンと dispatcher が共有する部分
pub(crate) struct EngineCore {
    state: Mutex<EngineState>,
    store: Option<Arc<dyn BoardStore>>,
    device: DeviceCache,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: EngineConfig,
    outbox: mpsc::UnboundedSender<Command>,
}

impl EngineCore {
    pub(crate) fn new(
        store: Option<Arc<dyn BoardStore>>,
        device: DeviceCache,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: EngineConfig,
        mode: Option<StorageMode>,
        outbox: mpsc::UnboundedSender<Command>,
    ) -> Self {
        let state = EngineState::new(mode, config.history_capacity);
        Self {
            state: Mutex::new(state),
            store,
            device,
            clock,
            ids,
            config,
            outbox,
        }
    }

    pub(crate) fn store(&self) -> Option<Arc<dyn BoardStore>> {
        self.store.clone()
    }

    fn synced_store(&self) -> Result<Arc<dyn BoardStore>, BoardError> {
        self.store()
            .ok_or_else(|| BoardError::InvalidInput("synced mode needs a board store".into()))
    }

    // ========================================
    // 送信箱
    // ========================================

    fn enqueue_call(&self, state: &mut EngineState, call: StoreCall) {
        tracing::debug!(operation = call.operation(), "store call queued");
        state.queued_calls += 1;
        if self.outbox.send(Command::Store(call)).is_err() {
            state.queued_calls -= 1;
            tracing::warn!("dispatcher is gone, dropping store call");
        }
    }

    fn schedule_persist(&self, state: &mut EngineState) {
        if state.persist_scheduled {
            return;
        }
        state.persist_scheduled = true;
        if self.outbox.send(Command::Persist).is_err() {
            state.persist_scheduled = false;
        }
    }

    pub(crate) fn schedule_refetch(&self) {
        let mut state = self.state.lock();
        if state.mode != Some(StorageMode::Synced) || state.refetch_scheduled {
            return;
        }
        state.refetch_scheduled = true;
        if self.outbox.send(Command::Refetch).is_err() {
            state.refetch_scheduled = false;
        }
    }

    pub(crate) fn set_relay_connected(&self, connected: Option<bool>) {
        self.state.lock().relay_connected = connected;
    }

    // ========================================
    // dispatcher から呼ばれるもの
    // ========================================

    pub(crate) fn persist_now(&self) {
        let (board, history) = {
            let mut state = self.state.lock();
            state.persist_scheduled = false;
            (state.board.clone(), state.history.clone())
        };
        self.device.save_board(&board);
        self.device.save_history(&history);
    }

    pub(crate) fn record_failure(&self, operation: &'static str, error: BoardError) {
        self.state.lock().diagnostics.record(operation, error);
    }

    /// 呼び出しを 1 件終えた。保留していた再取得を今やるべきなら true。
    pub(crate) fn finish_call(&self) -> bool {
        let mut state = self.state.lock();
        state.queued_calls = state.queued_calls.saturating_sub(1);
        if state.queued_calls == 0 && state.refetch_deferred {
            state.refetch_deferred = false;
            return true;
        }
        false
    }

    pub(crate) fn begin_refetch(&self) {
        self.state.lock().refetch_scheduled = false;
    }

    /// 再取得したボードで置き換える。
    ///
    /// 後ろにまだストア呼び出しが残っていれば置き換えない（古いボードで
    /// ローカルの変更を巻き戻さないため）。その場合 false。
    pub(crate) fn apply_fetched(&self, fetched: Board) -> bool {
        let mut state = self.state.lock();
        if state.queued_calls > 0 {
            state.refetch_deferred = true;
            return false;
        }
        let state = &mut *state;
        state.board = state.pending.carry_over(&state.board, fetched);
        self.schedule_persist(state);
        true
    }

    /// 作成に失敗した provisional タスクを Provisional に戻す
    pub(crate) fn reopen_pending(&self, local_id: TaskId, created_in: ColumnSlug) {
        let mut state = self.state.lock();
        if state.board.task(local_id).is_some() {
            state.pending.insert(local_id, created_in);
        }
    }

    /// `local_id` を `task_id` に付け替える
    pub(crate) fn renumber(&self, local_id: TaskId, task_id: TaskId) {
        let mut state = self.state.lock();
        state.board = state.board.with_task_renumbered(local_id, task_id);
        state.history.renumber(local_id, task_id);
        self.schedule_persist(&mut state);
    }

    fn record(
        &self,
        state: &mut EngineState,
        kind: ActionKind,
        task_id: Option<TaskId>,
        content_snapshot: &str,
        from_column: Option<ColumnSlug>,
        to_column: Option<ColumnSlug>,
    ) {
        state.history.push(Action {
            id: self.ids.generate_action_id(),
            kind,
            task_id,
            content_snapshot: content_snapshot.to_string(),
            from_column,
            to_column,
            timestamp: self.clock.now(),
        });
    }
}

/// Invalidator は同期ループからエンジンへ「再取得して」を伝えるハンドル
#[derive(Clone)]
pub struct Invalidator {
    core: Arc<EngineCore>,
}

impl Invalidator {
    /// 再取得を予約する（すでに予約済みなら何もしない）
    pub fn invalidate(&self) {
        self.core.schedule_refetch();
    }

    pub fn set_connected(&self, connected: bool) {
        self.core.set_relay_connected(Some(connected));
    }
}

/// BoardEngine は 1 クライアント分のボード状態
///
/// # 使用例
/// ```ignore
/// let engine = EngineBuilder::new()
///     .store(store)
///     .mode(StorageMode::Synced)
///     .build()?;
/// engine.hydrate().await?;
/// let id = engine.create_task()?;
/// engine.edit_task(id, "Write docs")?;
/// engine.flush().await;
/// ```
pub struct BoardEngine {
    core: Arc<EngineCore>,
    dispatcher: JoinHandle<()>,
}

impl BoardEngine {
    pub(crate) fn from_parts(core: Arc<EngineCore>, dispatcher: JoinHandle<()>) -> Self {
        Self { core, dispatcher }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.core.config
    }

    // ========================================
    // モードと読み込み
    // ========================================

    pub fn mode(&self) -> Option<StorageMode> {
        self.core.state.lock().mode
    }

    /// 保存先を選ぶ。選択は端末ストレージに残る。
    pub fn select_mode(&self, mode: StorageMode) -> Result<(), BoardError> {
        if mode == StorageMode::Synced {
            self.core.synced_store()?;
        }
        self.core.state.lock().mode = Some(mode);
        self.core.device.save_mode(mode);
        tracing::info!(?mode, "storage mode selected");
        Ok(())
    }

    /// 初回読み込み。モード未選択なら InvalidInput。
    ///
    /// - synced: `fetch_board()` を 1 回。失敗したら端末のスナップショット、
    ///   それもなければ既定のカラムだけの空ボード
    /// - local-only: 端末のスナップショット（ストアは呼ばない）
    pub async fn hydrate(&self) -> Result<(), BoardError> {
        let mode = self.core.state.lock().require_mode()?;

        let fetched = match mode {
            StorageMode::Synced => match self.core.synced_store()?.fetch_board().await {
                Ok(board) => Some(board),
                Err(err) => {
                    tracing::warn!(error = %err, "fetch failed, falling back to device snapshot");
                    self.core.record_failure("fetch_board", err);
                    None
                }
            },
            StorageMode::LocalOnly => None,
        };
        let from_store = fetched.is_some();
        let (board, source) = match fetched {
            Some(board) => (board, "store"),
            None => match self.core.device.load_board() {
                Some(board) => (board, "device"),
                None => (self.core.config.default_board().unwrap_or_default(), "default"),
            },
        };
        let history = self.core.device.load_history(self.core.config.history_capacity);

        let mut state = self.core.state.lock();
        let state = &mut *state;
        state.board = if from_store {
            state.pending.carry_over(&state.board, board)
        } else {
            // 前回のセッションで確定しなかったタスクは Provisional に戻す
            for (task_id, column) in local_tasks(&board) {
                state.pending.insert(task_id, column);
            }
            board
        };
        state.history = history;
        state.next_local_id = state
            .board
            .tasks
            .keys()
            .next()
            .map_or(-1, |id| id.get().min(0) - 1)
            .min(state.next_local_id);
        state.hydrated = true;
        self.core.schedule_persist(state);

        tracing::info!(
            ?mode,
            source,
            tasks = state.board.tasks.len(),
            columns = state.board.column_count(),
            "board hydrated"
        );
        Ok(())
    }

    /// 端末のスナップショットと履歴を捨てて読み込み直す
    pub async fn reset(&self) -> Result<(), BoardError> {
        {
            let mut state = self.core.state.lock();
            state.require_mode()?;
            state.board = Board::empty();
            state.history.clear();
            state.pending.clear();
            state.hydrated = false;
        }
        self.core.device.clear_board();
        tracing::info!("local board reset");
        self.hydrate().await
    }

    /// 再取得して、反映されるまで待つ（synced モードのみ）
    pub async fn refetch(&self) {
        self.core.schedule_refetch();
        self.flush().await;
    }

    /// ここまでに積んだ呼び出しと保存が終わるまで待つ
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.core.outbox.send(Command::Flush(done)).is_err() {
            return;
        }
        let _ = wait.await;
    }

    /// 送信箱を空にしてから dispatcher を止める
    pub async fn shutdown(self) {
        self.flush().await;
    }

    pub fn invalidator(&self) -> Invalidator {
        Invalidator {
            core: Arc::clone(&self.core),
        }
    }

    // ========================================
    // タスク
    // ========================================

    /// 既定のカラム（先頭）に Provisional タスクを追加する
    pub fn create_task(&self) -> Result<TaskId, BoardError> {
        let column = {
            let state = self.core.state.lock();
            state.require_mode()?;
            state
                .board
                .default_column()
                .cloned()
                .ok_or_else(|| BoardError::NotFound("the board has no columns".into()))?
        };
        self.create_task_in(&column)
    }

    /// `column` の末尾に Provisional タスクを追加する。ストアは呼ばない。
    pub fn create_task_in(&self, column: &ColumnSlug) -> Result<TaskId, BoardError> {
        let mut state = self.core.state.lock();
        let mode = state.require_mode()?;
        if state.board.column(column).is_none() {
            return Err(BoardError::column_not_found(column));
        }

        let task_id = state.provisional_id(mode);
        let task = Task::new(task_id, &self.core.config.placeholder_title, self.core.clock.now());
        state.board = state.board.with_task_appended(task, column)?;
        state.pending.insert(task_id, column.clone());
        self.core.schedule_persist(&mut state);

        tracing::debug!(%task_id, %column, "provisional task created");
        Ok(task_id)
    }

    /// タイトルを変更する。Provisional タスクならここで初めて作成される。
    pub fn edit_task(&self, task_id: TaskId, title: &str) -> Result<(), BoardError> {
        let title = self.core.config.limits.task_title(title)?;
        let mut state = self.core.state.lock();
        let mode = state.require_mode()?;

        state.board = state
            .board
            .with_task_retitled(task_id, title, self.core.clock.now())?;
        let column = state.board.column_of(task_id).cloned();

        if state.pending.remove(task_id).is_some() {
            self.core.record(
                &mut state,
                ActionKind::Created,
                Some(task_id),
                title,
                None,
                column.clone(),
            );
            if let (StorageMode::Synced, Some(column)) = (mode, column) {
                self.core.enqueue_call(
                    &mut state,
                    StoreCall::CreateTask {
                        local_id: task_id,
                        column,
                        title: title.to_string(),
                    },
                );
                // ストアは末尾に追加する。ローカルで途中にあれば位置を合わせる
                if let Some((dest_column, dest_index, false)) = state.store_slot(task_id) {
                    self.core.enqueue_call(
                        &mut state,
                        StoreCall::MoveTask {
                            task_id,
                            dest_column,
                            dest_index,
                        },
                    );
                }
            }
            tracing::debug!(%task_id, "provisional task committed");
        } else {
            self.core.record(
                &mut state,
                ActionKind::Edited,
                Some(task_id),
                title,
                column.clone(),
                column,
            );
            if mode == StorageMode::Synced {
                self.core.enqueue_call(
                    &mut state,
                    StoreCall::EditTask {
                        task_id,
                        title: title.to_string(),
                    },
                );
            }
        }
        self.core.schedule_persist(&mut state);
        Ok(())
    }

    /// タスクを削除する。Provisional のままならストアは呼ばない。
    pub fn delete_task(&self, task_id: TaskId) -> Result<(), BoardError> {
        let mut state = self.core.state.lock();
        let mode = state.require_mode()?;

        let title = state
            .board
            .task(task_id)
            .map(|t| t.title.clone())
            .ok_or_else(|| BoardError::task_not_found(task_id))?;
        let column = state.board.column_of(task_id).cloned();
        state.board = state.board.with_task_removed(task_id)?;

        if state.pending.remove(task_id).is_some() {
            tracing::debug!(%task_id, "provisional task discarded");
        } else {
            self.core
                .record(&mut state, ActionKind::Deleted, Some(task_id), &title, column, None);
            if mode == StorageMode::Synced {
                self.core
                    .enqueue_call(&mut state, StoreCall::DeleteTask { task_id });
            }
        }
        self.core.schedule_persist(&mut state);
        Ok(())
    }

    /// ドラッグ＆ドロップの移動。自分の位置に落とした場合は何もしない。
    pub fn move_task(&self, request: MoveRequest) -> Result<(), BoardError> {
        let mut state = self.core.state.lock();
        let mode = state.require_mode()?;

        let next = state.board.with_task_moved(&request)?;
        if next == state.board {
            return Ok(());
        }
        state.board = next;

        let task_id = request.task_id;
        let title = state
            .board
            .task(task_id)
            .map(|t| t.title.clone())
            .unwrap_or_default();
        self.core.record(
            &mut state,
            ActionKind::Moved,
            Some(task_id),
            &title,
            Some(request.source_column.clone()),
            Some(request.dest_column.clone()),
        );
        if mode == StorageMode::Synced && !state.pending.contains(task_id) {
            // UI の index は Provisional タスクも数えているので、ストア側の index に直す
            let dest_index = state
                .store_slot(task_id)
                .map_or(request.dest_index, |(_, index, _)| index);
            self.core.enqueue_call(
                &mut state,
                StoreCall::MoveTask {
                    task_id,
                    dest_column: request.dest_column,
                    dest_index,
                },
            );
        }
        self.core.schedule_persist(&mut state);
        Ok(())
    }

    // ========================================
    // カラム
    // ========================================

    /// カラムを末尾に追加する。スラッグ重複・上限超過はローカルを変える前に拒否。
    pub fn add_column(&self, name: &str) -> Result<ColumnSlug, BoardError> {
        let mut state = self.core.state.lock();
        let mode = state.require_mode()?;

        let (next, slug) = state
            .board
            .with_column_inserted(name, &self.core.config.limits)?;
        state.board = next;

        let display_name = name.trim();
        self.core.record(
            &mut state,
            ActionKind::CreatedColumn,
            None,
            display_name,
            None,
            Some(slug.clone()),
        );
        if mode == StorageMode::Synced {
            self.core.enqueue_call(
                &mut state,
                StoreCall::AddColumn {
                    name: display_name.to_string(),
                },
            );
        }
        self.core.schedule_persist(&mut state);
        Ok(slug)
    }

    /// カラムとそのタスクを削除する
    pub fn remove_column(&self, slug: &ColumnSlug) -> Result<(), BoardError> {
        let mut state = self.core.state.lock();
        let mode = state.require_mode()?;

        let display_name = state
            .board
            .column(slug)
            .map(|c| c.display_name.clone())
            .ok_or_else(|| BoardError::column_not_found(slug))?;
        let (next, destroyed) = state.board.with_column_removed(slug)?;
        state.board = next;
        for task_id in &destroyed {
            state.pending.remove(*task_id);
        }

        self.core.record(
            &mut state,
            ActionKind::DeletedColumn,
            None,
            &display_name,
            Some(slug.clone()),
            None,
        );
        if mode == StorageMode::Synced {
            self.core
                .enqueue_call(&mut state, StoreCall::RemoveColumn { slug: slug.clone() });
        }
        self.core.schedule_persist(&mut state);
        tracing::debug!(%slug, destroyed = destroyed.len(), "column removed");
        Ok(())
    }

    /// カラムの並びを変える
    pub fn move_column(&self, slug: &ColumnSlug, dest_index: usize) -> Result<(), BoardError> {
        let mut state = self.core.state.lock();
        let mode = state.require_mode()?;

        let next = state.board.with_column_moved(slug, dest_index)?;
        if next == state.board {
            return Ok(());
        }
        state.board = next;

        let display_name = state
            .board
            .column(slug)
            .map(|c| c.display_name.clone())
            .unwrap_or_default();
        self.core.record(
            &mut state,
            ActionKind::MovedColumn,
            None,
            &display_name,
            Some(slug.clone()),
            Some(slug.clone()),
        );
        if mode == StorageMode::Synced {
            self.core.enqueue_call(
                &mut state,
                StoreCall::MoveColumn {
                    slug: slug.clone(),
                    dest_index,
                },
            );
        }
        self.core.schedule_persist(&mut state);
        Ok(())
    }

    // ========================================
    // 参照
    // ========================================

    pub fn board(&self) -> Board {
        self.core.state.lock().board.clone()
    }

    /// 古い順
    pub fn history(&self) -> Vec<Action> {
        self.core.state.lock().history.to_vec()
    }

    pub fn pending(&self) -> Vec<TaskId> {
        self.core.state.lock().pending.ids()
    }

    pub fn is_pending(&self, task_id: TaskId) -> bool {
        self.core.state.lock().pending.contains(task_id)
    }

    /// 直近のストア呼び出しの失敗
    pub fn recent_failures(&self) -> Vec<FailedCall> {
        self.core.state.lock().diagnostics.recent()
    }

    pub fn status(&self) -> EngineStatus {
        let state = self.core.state.lock();
        EngineStatus {
            mode: state.mode,
            hydrated: state.hydrated,
            tasks: state.board.tasks.len(),
            columns: state.board.column_count(),
            pending_creations: state.pending.len(),
            queued_calls: state.queued_calls,
            failed_calls: state.diagnostics.failed_calls(),
            last_error: state.diagnostics.last_error(),
            device_degraded: self.core.device.is_degraded(),
            relay_connected: state.relay_connected,
        }
    }
}

impl Drop for BoardEngine {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

/// 負の id を持つ（まだストアにない）タスクとそのカラム
fn local_tasks(board: &Board) -> Vec<(TaskId, ColumnSlug)> {
    board
        .ordered_columns()
        .flat_map(|col| {
            col.task_order
                .iter()
                .filter(|id| id.is_local())
                .map(move |id| (*id, col.slug.clone()))
        })
        .collect()
}

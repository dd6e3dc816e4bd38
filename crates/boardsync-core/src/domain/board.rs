//! Board aggregate: columns, tasks and the column order.
//!
//! Design:
//! - Every constructor (`with_*`) returns a new `Board` and leaves `self`
//!   untouched, so an optimistic copy can be discarded freely.
//! - `column_order` is the single source of truth for column placement;
//!   `Column::position` is rewritten from it by every constructor.
//! - Errors returned here are runtime conditions (missing ids, full board).
//!   Structural corruption is a bug and is reported by `check_invariants`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::column::Column;
use super::errors::BoardError;
use super::ids::{ColumnSlug, TaskId};
use super::limits::BoardLimits;
use super::task::Task;
use crate::reconcile::{self, MovePlan, MoveRequest};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub tasks: BTreeMap<TaskId, Task>,
    pub columns: BTreeMap<ColumnSlug, Column>,
    pub column_order: Vec<ColumnSlug>,
}

impl Board {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A board with the given (empty) columns, in order.
    pub fn with_columns<S: AsRef<str>>(
        names: &[S],
        limits: &BoardLimits,
    ) -> Result<Self, BoardError> {
        names.iter().try_fold(Self::empty(), |board, name| {
            board
                .with_column_inserted(name.as_ref(), limits)
                .map(|(board, _)| board)
        })
    }

    // ========================================
    // Queries
    // ========================================

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    pub fn column(&self, slug: &ColumnSlug) -> Option<&Column> {
        self.columns.get(slug)
    }

    /// Columns in display order.
    pub fn ordered_columns(&self) -> impl Iterator<Item = &Column> {
        self.column_order
            .iter()
            .filter_map(|slug| self.columns.get(slug))
    }

    pub fn task_order(&self, slug: &ColumnSlug) -> &[TaskId] {
        self.columns
            .get(slug)
            .map(|c| c.task_order.as_slice())
            .unwrap_or(&[])
    }

    /// The column currently holding `task_id`.
    pub fn column_of(&self, task_id: TaskId) -> Option<&ColumnSlug> {
        self.columns
            .values()
            .find(|c| c.task_order.contains(&task_id))
            .map(|c| &c.slug)
    }

    pub fn index_of(&self, task_id: TaskId, slug: &ColumnSlug) -> Option<usize> {
        self.columns.get(slug).and_then(|c| c.index_of(task_id))
    }

    /// The first column in display order (where new tasks land).
    pub fn default_column(&self) -> Option<&ColumnSlug> {
        self.column_order.first()
    }

    pub fn column_count(&self) -> usize {
        self.column_order.len()
    }

    pub fn max_task_id(&self) -> Option<TaskId> {
        self.tasks.keys().next_back().copied()
    }

    // ========================================
    // Constructors (return a new Board)
    // ========================================

    /// Append `task` to the end of `column`.
    pub fn with_task_appended(&self, task: Task, column: &ColumnSlug) -> Result<Self, BoardError> {
        if self.tasks.contains_key(&task.id) {
            return Err(BoardError::Conflict(format!("{} already exists", task.id)));
        }
        let mut next = self.clone();
        let col = next
            .columns
            .get_mut(column)
            .ok_or_else(|| BoardError::column_not_found(column))?;
        col.task_order.push(task.id);
        next.tasks.insert(task.id, task);
        Ok(next)
    }

    /// Replace the title of `task_id`. Ordering is untouched.
    pub fn with_task_retitled(
        &self,
        task_id: TaskId,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, BoardError> {
        let task = self
            .tasks
            .get(&task_id)
            .ok_or_else(|| BoardError::task_not_found(task_id))?;
        let mut next = self.clone();
        next.tasks.insert(task_id, task.retitled(title, now));
        Ok(next)
    }

    /// Detach `task_id` from its column and drop it from the task map.
    pub fn with_task_removed(&self, task_id: TaskId) -> Result<Self, BoardError> {
        if !self.tasks.contains_key(&task_id) {
            return Err(BoardError::task_not_found(task_id));
        }
        let mut next = self.clone();
        next.tasks.remove(&task_id);
        for col in next.columns.values_mut() {
            col.task_order.retain(|id| *id != task_id);
        }
        Ok(next)
    }

    /// Apply a drag-and-drop move.
    pub fn with_task_moved(&self, request: &MoveRequest) -> Result<Self, BoardError> {
        let source = self
            .columns
            .get(&request.source_column)
            .ok_or_else(|| BoardError::column_not_found(&request.source_column))?;
        let dest = self
            .columns
            .get(&request.dest_column)
            .ok_or_else(|| BoardError::column_not_found(&request.dest_column))?;
        if source.index_of(request.task_id).is_none() {
            return Err(BoardError::NotFound(format!(
                "{} is not in column '{}'",
                request.task_id, request.source_column
            )));
        }

        let plan = reconcile::plan_task_move(request, &source.task_order, &dest.task_order);
        Ok(self.with_plan(plan))
    }

    /// Move `task_id` to `dest_index` of `dest`, wherever it currently is.
    pub fn with_task_relocated(
        &self,
        task_id: TaskId,
        dest: &ColumnSlug,
        dest_index: usize,
    ) -> Result<Self, BoardError> {
        let source = self
            .column_of(task_id)
            .ok_or_else(|| BoardError::task_not_found(task_id))?
            .clone();
        let source_index = self.index_of(task_id, &source).unwrap_or_default();
        self.with_task_moved(&MoveRequest {
            task_id,
            source_column: source,
            source_index,
            dest_column: dest.clone(),
            dest_index,
        })
    }

    fn with_plan(&self, plan: MovePlan) -> Self {
        let mut next = self.clone();
        match plan {
            MovePlan::Unchanged => {}
            MovePlan::Within { column, order } => {
                if let Some(col) = next.columns.get_mut(&column) {
                    col.task_order = order;
                }
            }
            MovePlan::Across {
                source,
                source_order,
                dest,
                dest_order,
            } => {
                if let Some(col) = next.columns.get_mut(&source) {
                    col.task_order = source_order;
                }
                if let Some(col) = next.columns.get_mut(&dest) {
                    col.task_order = dest_order;
                }
            }
        }
        next
    }

    /// Append a new empty column named `name`. Returns the new board and the derived slug.
    pub fn with_column_inserted(
        &self,
        name: &str,
        limits: &BoardLimits,
    ) -> Result<(Self, ColumnSlug), BoardError> {
        let slug = limits.column_slug(name)?;
        reconcile::admit_column(&self.column_order, &slug, limits.max_columns)?;

        let mut next = self.clone();
        next.column_order = reconcile::append_column(&self.column_order, slug.clone());
        next.columns.insert(
            slug.clone(),
            Column::new(slug.clone(), name.trim(), next.column_order.len() - 1),
        );
        Ok((next, slug))
    }

    /// Remove `slug` and destroy its tasks. Returns the new board and the destroyed ids.
    pub fn with_column_removed(
        &self,
        slug: &ColumnSlug,
    ) -> Result<(Self, Vec<TaskId>), BoardError> {
        let mut next = self.clone();
        let removed = next
            .columns
            .remove(slug)
            .ok_or_else(|| BoardError::column_not_found(slug))?;
        for task_id in &removed.task_order {
            next.tasks.remove(task_id);
        }
        next.column_order = reconcile::remove_column(&self.column_order, slug);
        Ok((next.reindexed(), removed.task_order))
    }

    /// Move column `slug` to `dest_index` of the column order.
    pub fn with_column_moved(&self, slug: &ColumnSlug, dest_index: usize) -> Result<Self, BoardError> {
        if !self.columns.contains_key(slug) {
            return Err(BoardError::column_not_found(slug));
        }
        let mut next = self.clone();
        next.column_order = reconcile::move_column(&self.column_order, slug, dest_index);
        Ok(next.reindexed())
    }

    /// Rename a task id everywhere (provisional id -> persisted id).
    pub fn with_task_renumbered(&self, from: TaskId, to: TaskId) -> Self {
        let mut next = self.clone();
        if let Some(mut task) = next.tasks.remove(&from) {
            task.id = to;
            next.tasks.insert(to, task);
        }
        for col in next.columns.values_mut() {
            for id in col.task_order.iter_mut().filter(|id| **id == from) {
                *id = to;
            }
        }
        next
    }

    /// Rewrite every column's `position` from `column_order`.
    fn reindexed(mut self) -> Self {
        for (index, slug) in self.column_order.iter().enumerate() {
            if let Some(col) = self.columns.get_mut(slug) {
                col.position = index;
            }
        }
        self
    }

    // ========================================
    // Invariants
    // ========================================

    /// Verify the structural invariants. A failure is a programming error.
    pub fn check_invariants(&self) -> Result<(), String> {
        let order: BTreeSet<&ColumnSlug> = self.column_order.iter().collect();
        if order.len() != self.column_order.len() {
            return Err("column_order contains duplicates".into());
        }
        let keys: BTreeSet<&ColumnSlug> = self.columns.keys().collect();
        if order != keys {
            return Err("column_order is not a permutation of columns".into());
        }

        let mut seen = BTreeSet::new();
        for (index, slug) in self.column_order.iter().enumerate() {
            let col = &self.columns[slug];
            if col.slug != *slug {
                return Err(format!("column keyed '{slug}' carries slug '{}'", col.slug));
            }
            if col.position != index {
                return Err(format!(
                    "column '{slug}' has position {} but index {index}",
                    col.position
                ));
            }
            for task_id in &col.task_order {
                if !seen.insert(*task_id) {
                    return Err(format!("{task_id} appears in more than one slot"));
                }
                if !self.tasks.contains_key(task_id) {
                    return Err(format!("{task_id} in column '{slug}' has no task"));
                }
            }
        }
        if seen.len() != self.tasks.len() {
            return Err("some tasks belong to no column".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn slug(s: &str) -> ColumnSlug {
        ColumnSlug::new(s)
    }

    /// todo=[1,2], done=[]
    fn todo_done() -> Board {
        let limits = BoardLimits::default();
        let board = Board::with_columns(&["Todo", "Done"], &limits).unwrap();
        board
            .with_task_appended(Task::new(TaskId::new(1), "one", now()), &slug("todo"))
            .unwrap()
            .with_task_appended(Task::new(TaskId::new(2), "two", now()), &slug("todo"))
            .unwrap()
    }

    #[test]
    fn queries_locate_tasks() {
        let board = todo_done();
        assert_eq!(board.column_of(TaskId::new(2)), Some(&slug("todo")));
        assert_eq!(board.index_of(TaskId::new(2), &slug("todo")), Some(1));
        assert_eq!(board.column_of(TaskId::new(9)), None);
        assert_eq!(board.default_column(), Some(&slug("todo")));
        assert_eq!(board.max_task_id(), Some(TaskId::new(2)));
        board.check_invariants().unwrap();
    }

    #[test]
    fn cross_column_scenario() {
        let board = todo_done();
        let moved = board
            .with_task_moved(&MoveRequest {
                task_id: TaskId::new(2),
                source_column: slug("todo"),
                source_index: 1,
                dest_column: slug("done"),
                dest_index: 0,
            })
            .unwrap();

        assert_eq!(moved.task_order(&slug("todo")), &[TaskId::new(1)]);
        assert_eq!(moved.task_order(&slug("done")), &[TaskId::new(2)]);
        moved.check_invariants().unwrap();
        // 入力は変更されない
        assert_eq!(board.task_order(&slug("todo")).len(), 2);
    }

    #[test]
    fn moving_to_own_slot_is_idempotent() {
        let board = todo_done();
        let moved = board
            .with_task_moved(&MoveRequest {
                task_id: TaskId::new(1),
                source_column: slug("todo"),
                source_index: 0,
                dest_column: slug("todo"),
                dest_index: 0,
            })
            .unwrap();
        assert_eq!(moved, board);
    }

    #[test]
    fn move_from_wrong_column_is_not_found() {
        let err = todo_done()
            .with_task_moved(&MoveRequest {
                task_id: TaskId::new(1),
                source_column: slug("done"),
                source_index: 0,
                dest_column: slug("todo"),
                dest_index: 0,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn relocate_derives_the_source() {
        let moved = todo_done()
            .with_task_relocated(TaskId::new(1), &slug("done"), 5)
            .unwrap();
        assert_eq!(moved.task_order(&slug("done")), &[TaskId::new(1)]);
        assert_eq!(moved.task_order(&slug("todo")), &[TaskId::new(2)]);
    }

    #[test]
    fn cascading_column_delete_destroys_tasks() {
        let (board, removed) = todo_done().with_column_removed(&slug("todo")).unwrap();
        assert_eq!(removed, vec![TaskId::new(1), TaskId::new(2)]);
        assert!(board.task(TaskId::new(1)).is_none());
        assert!(board.task(TaskId::new(2)).is_none());
        assert!(board.tasks.is_empty());
        assert_eq!(board.column_order, vec![slug("done")]);
        assert_eq!(board.column(&slug("done")).unwrap().position, 0);
        board.check_invariants().unwrap();
    }

    #[test]
    fn seventh_column_is_rejected_without_mutation() {
        let limits = BoardLimits::default();
        let board = Board::with_columns(&["a", "b", "c", "d", "e", "f"], &limits).unwrap();
        let before = board.clone();
        let err = board.with_column_inserted("g", &limits).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(board, before);
    }

    #[test]
    fn duplicate_slug_is_a_conflict() {
        let limits = BoardLimits::default();
        let board = Board::with_columns(&["In Progress"], &limits).unwrap();
        let err = board.with_column_inserted("in progress!", &limits).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn column_move_rewrites_positions() {
        let limits = BoardLimits::default();
        let board = Board::with_columns(&["a", "b", "c"], &limits).unwrap();
        let moved = board.with_column_moved(&slug("a"), 2).unwrap();
        assert_eq!(moved.column_order, vec![slug("b"), slug("c"), slug("a")]);
        let positions: Vec<usize> = moved.ordered_columns().map(|c| c.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        moved.check_invariants().unwrap();
    }

    #[test]
    fn renumber_replaces_the_id_everywhere() {
        let board = todo_done()
            .with_task_appended(Task::new(TaskId::new(-1), "draft", now()), &slug("done"))
            .unwrap();
        let renumbered = board.with_task_renumbered(TaskId::new(-1), TaskId::new(3));
        assert_eq!(renumbered.task_order(&slug("done")), &[TaskId::new(3)]);
        assert_eq!(renumbered.task(TaskId::new(3)).unwrap().id, TaskId::new(3));
        renumbered.check_invariants().unwrap();
    }

    #[test]
    fn invariant_check_catches_task_in_two_columns() {
        let mut board = todo_done();
        board
            .columns
            .get_mut(&slug("done"))
            .unwrap()
            .task_order
            .push(TaskId::new(1));
        assert!(board.check_invariants().is_err());
    }

    #[test]
    fn board_survives_json_round_trip() {
        let board = todo_done();
        let json = serde_json::to_string(&board).unwrap();
        let back: Board = serde_json::from_str(&json).unwrap();
        assert_eq!(back, board);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8),
        Delete(u8),
        Move(u8, u8, u8),
        AddColumn(u8),
        RemoveColumn(u8),
        MoveColumn(u8, u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u8>().prop_map(Op::Add),
            any::<u8>().prop_map(Op::Delete),
            (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(t, c, i)| Op::Move(t, c, i)),
            any::<u8>().prop_map(Op::AddColumn),
            any::<u8>().prop_map(Op::RemoveColumn),
            (any::<u8>(), any::<u8>()).prop_map(|(c, i)| Op::MoveColumn(c, i)),
        ]
    }

    fn pick<T: Clone>(items: &[T], n: u8) -> Option<T> {
        if items.is_empty() {
            None
        } else {
            Some(items[n as usize % items.len()].clone())
        }
    }

    proptest! {
        #[test]
        fn invariants_hold_for_reachable_boards(ops in proptest::collection::vec(op(), 0..40)) {
            let limits = BoardLimits::default();
            let mut board = Board::with_columns(&["todo", "doing", "done"], &limits).unwrap();
            let mut next_id = 1;

            for op in ops {
                let ids: Vec<TaskId> = board.tasks.keys().copied().collect();
                let cols = board.column_order.clone();
                let result = match op {
                    Op::Add(c) => pick(&cols, c).map(|col| {
                        next_id += 1;
                        board.with_task_appended(Task::new(TaskId::new(next_id), "t", now()), &col)
                    }),
                    Op::Delete(t) => pick(&ids, t).map(|id| board.with_task_removed(id)),
                    Op::Move(t, c, i) => pick(&ids, t).zip(pick(&cols, c)).map(|(id, col)| {
                        board.with_task_relocated(id, &col, i as usize)
                    }),
                    Op::AddColumn(n) => Some(
                        board
                            .with_column_inserted(&format!("col {n}"), &limits)
                            .map(|(b, _)| b),
                    ),
                    Op::RemoveColumn(c) => pick(&cols, c)
                        .map(|col| board.with_column_removed(&col).map(|(b, _)| b)),
                    Op::MoveColumn(c, i) => {
                        pick(&cols, c).map(|col| board.with_column_moved(&col, i as usize))
                    }
                };
                if let Some(Ok(next)) = result {
                    board = next;
                }
                prop_assert!(board.check_invariants().is_ok(), "{:?}", board.check_invariants());
            }
        }
    }
}

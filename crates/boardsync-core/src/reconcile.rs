//! Position reconciliation: pure functions that compute new ordered lists.
//!
//! Drag-and-drop moves (same column and cross column) and column
//! add/remove/move are expressed here over plain slices. Nothing in this
//! module touches a `Board`; `domain::board` applies the results.
//!
//! Every function is deterministic and total: out-of-range indices are
//! clamped, unknown items leave the input unchanged.

use serde::{Deserialize, Serialize};

use crate::domain::{BoardError, ColumnSlug, TaskId};

/// A drag-and-drop request, as reported by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub task_id: TaskId,
    pub source_column: ColumnSlug,
    pub source_index: usize,
    pub dest_column: ColumnSlug,
    pub dest_index: usize,
}

impl MoveRequest {
    pub fn is_same_column(&self) -> bool {
        self.source_column == self.dest_column
    }
}

/// The new ordered lists a move produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovePlan {
    /// Nothing to do (dropped on its own slot, or the task is not in the source).
    Unchanged,

    /// Reordered inside one column.
    Within {
        column: ColumnSlug,
        order: Vec<TaskId>,
    },

    /// Moved from one column into another.
    Across {
        source: ColumnSlug,
        source_order: Vec<TaskId>,
        dest: ColumnSlug,
        dest_order: Vec<TaskId>,
    },
}

/// Remove the item at `from`, then insert it at `to` of the post-removal list.
///
/// `[A, B, C]` with `from = 0, to = 1` gives `[B, A, C]`.
pub fn reorder_within<T: Clone>(list: &[T], from: usize, to: usize) -> Vec<T> {
    let mut out = list.to_vec();
    if from >= out.len() {
        return out;
    }
    let item = out.remove(from);
    let to = to.min(out.len());
    out.insert(to, item);
    out
}

/// Remove `source[from]` and insert it into `dest` at `to` (clamped to `[0, len]`).
pub fn transfer<T: Clone>(source: &[T], from: usize, dest: &[T], to: usize) -> (Vec<T>, Vec<T>) {
    let mut source = source.to_vec();
    let mut dest = dest.to_vec();
    if from >= source.len() {
        return (source, dest);
    }
    let item = source.remove(from);
    let to = to.min(dest.len());
    dest.insert(to, item);
    (source, dest)
}

/// The index the task really occupies in `order`.
///
/// The UI-provided index wins when it points at the task; a stale index
/// (the list changed under the drag) falls back to a search.
fn resolve_index(order: &[TaskId], task_id: TaskId, hint: usize) -> Option<usize> {
    if order.get(hint) == Some(&task_id) {
        Some(hint)
    } else {
        order.iter().position(|id| *id == task_id)
    }
}

/// Compute the lists produced by `request`.
///
/// For a same-column move `dest_order` is ignored.
pub fn plan_task_move(
    request: &MoveRequest,
    source_order: &[TaskId],
    dest_order: &[TaskId],
) -> MovePlan {
    let Some(from) = resolve_index(source_order, request.task_id, request.source_index) else {
        return MovePlan::Unchanged;
    };

    if request.is_same_column() {
        if from == request.dest_index {
            return MovePlan::Unchanged;
        }
        let order = reorder_within(source_order, from, request.dest_index);
        if order == source_order {
            return MovePlan::Unchanged;
        }
        return MovePlan::Within {
            column: request.source_column.clone(),
            order,
        };
    }

    let (source_order, dest_order) = transfer(source_order, from, dest_order, request.dest_index);
    MovePlan::Across {
        source: request.source_column.clone(),
        source_order,
        dest: request.dest_column.clone(),
        dest_order,
    }
}

/// Check that `slug` may be appended to `order`.
pub fn admit_column(
    order: &[ColumnSlug],
    slug: &ColumnSlug,
    max_columns: usize,
) -> Result<(), BoardError> {
    if order.contains(slug) {
        return Err(BoardError::Conflict(format!(
            "a column with slug '{slug}' already exists"
        )));
    }
    if order.len() >= max_columns {
        return Err(BoardError::Conflict(format!(
            "board already has the maximum of {max_columns} columns"
        )));
    }
    Ok(())
}

/// Append a column slug at the end.
pub fn append_column(order: &[ColumnSlug], slug: ColumnSlug) -> Vec<ColumnSlug> {
    let mut out = order.to_vec();
    out.push(slug);
    out
}

/// Drop a column slug.
pub fn remove_column(order: &[ColumnSlug], slug: &ColumnSlug) -> Vec<ColumnSlug> {
    order.iter().filter(|s| *s != slug).cloned().collect()
}

/// Move a column slug to `dest_index` (splice semantics, clamped).
pub fn move_column(order: &[ColumnSlug], slug: &ColumnSlug, dest_index: usize) -> Vec<ColumnSlug> {
    match order.iter().position(|s| s == slug) {
        Some(from) => reorder_within(order, from, dest_index),
        None => order.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn ids(raw: &[i64]) -> Vec<TaskId> {
        raw.iter().copied().map(TaskId::new).collect()
    }

    fn slug(s: &str) -> ColumnSlug {
        ColumnSlug::new(s)
    }

    fn request(task: i64, src: &str, from: usize, dst: &str, to: usize) -> MoveRequest {
        MoveRequest {
            task_id: TaskId::new(task),
            source_column: slug(src),
            source_index: from,
            dest_column: slug(dst),
            dest_index: to,
        }
    }

    #[test]
    fn splice_inserts_after_removal() {
        // [A,B,C] で 0 -> 1 は [B,A,C]（「削除前に挿入」ではない）
        assert_eq!(reorder_within(&["A", "B", "C"], 0, 1), vec!["B", "A", "C"]);
    }

    #[rstest]
    #[case::to_end(0, 2, &["B", "C", "A"])]
    #[case::to_front(2, 0, &["C", "A", "B"])]
    #[case::clamped(0, 99, &["B", "C", "A"])]
    #[case::out_of_range_source(5, 0, &["A", "B", "C"])]
    fn reorder_within_cases(#[case] from: usize, #[case] to: usize, #[case] expected: &[&str]) {
        assert_eq!(reorder_within(&["A", "B", "C"], from, to), expected.to_vec());
    }

    #[test]
    fn move_to_own_slot_is_unchanged() {
        let order = ids(&[1, 2, 3]);
        let plan = plan_task_move(&request(2, "todo", 1, "todo", 1), &order, &order);
        assert_eq!(plan, MovePlan::Unchanged);
    }

    #[test]
    fn cross_column_move_matches_scenario() {
        // todo=[1,2], done=[] で 2 を todo@1 -> done@0
        let plan = plan_task_move(&request(2, "todo", 1, "done", 0), &ids(&[1, 2]), &[]);
        assert_eq!(
            plan,
            MovePlan::Across {
                source: slug("todo"),
                source_order: ids(&[1]),
                dest: slug("done"),
                dest_order: ids(&[2]),
            }
        );
    }

    #[test]
    fn cross_column_dest_index_is_clamped() {
        let plan = plan_task_move(&request(1, "a", 0, "b", 40), &ids(&[1]), &ids(&[7, 8]));
        let MovePlan::Across { dest_order, .. } = plan else {
            panic!("expected cross-column plan");
        };
        assert_eq!(dest_order, ids(&[7, 8, 1]));
    }

    #[test]
    fn stale_source_index_falls_back_to_search() {
        let order = ids(&[5, 6, 7]);
        let plan = plan_task_move(&request(7, "a", 0, "a", 0), &order, &order);
        assert_eq!(
            plan,
            MovePlan::Within {
                column: slug("a"),
                order: ids(&[7, 5, 6]),
            }
        );
    }

    #[test]
    fn unknown_task_is_unchanged() {
        let plan = plan_task_move(&request(9, "a", 0, "b", 0), &ids(&[1]), &ids(&[2]));
        assert_eq!(plan, MovePlan::Unchanged);
    }

    #[test]
    fn admit_column_rejects_duplicates_and_ceiling() {
        let order = vec![slug("a"), slug("b")];
        assert!(admit_column(&order, &slug("c"), 3).is_ok());
        assert!(matches!(
            admit_column(&order, &slug("a"), 6),
            Err(BoardError::Conflict(_))
        ));
        assert!(matches!(
            admit_column(&order, &slug("c"), 2),
            Err(BoardError::Conflict(_))
        ));
    }

    #[test]
    fn column_order_helpers() {
        let order = vec![slug("a"), slug("b"), slug("c")];
        assert_eq!(
            move_column(&order, &slug("c"), 0),
            vec![slug("c"), slug("a"), slug("b")]
        );
        assert_eq!(remove_column(&order, &slug("b")), vec![slug("a"), slug("c")]);
        assert_eq!(append_column(&order, slug("d")).len(), 4);
        assert_eq!(move_column(&order, &slug("zz"), 0), order);
    }

    fn sorted(mut v: Vec<i64>) -> Vec<i64> {
        v.sort_unstable();
        v
    }

    proptest! {
        #[test]
        fn reorder_is_deterministic_and_a_permutation(
            list in proptest::collection::vec(any::<i64>(), 0..12),
            from in 0usize..14,
            to in 0usize..14,
        ) {
            let a = reorder_within(&list, from, to);
            let b = reorder_within(&list, from, to);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(sorted(a), sorted(list.clone()));
        }

        #[test]
        fn transfer_conserves_items(
            source in proptest::collection::vec(any::<i64>(), 0..10),
            dest in proptest::collection::vec(any::<i64>(), 0..10),
            from in 0usize..12,
            to in 0usize..12,
        ) {
            let (s, d) = transfer(&source, from, &dest, to);
            prop_assert_eq!(s.len() + d.len(), source.len() + dest.len());
            let mut before: Vec<i64> = source.iter().chain(dest.iter()).copied().collect();
            let mut after: Vec<i64> = s.iter().chain(d.iter()).copied().collect();
            before.sort_unstable();
            after.sort_unstable();
            prop_assert_eq!(before, after);
        }

        #[test]
        fn same_slot_moves_are_noops(len in 1usize..10, pick in 0usize..10) {
            let order: Vec<TaskId> = (1..=len as i64).map(TaskId::new).collect();
            let index = pick % len;
            let req = MoveRequest {
                task_id: order[index],
                source_column: ColumnSlug::new("c"),
                source_index: index,
                dest_column: ColumnSlug::new("c"),
                dest_index: index,
            };
            prop_assert_eq!(plan_task_move(&req, &order, &order), MovePlan::Unchanged);
        }
    }
}

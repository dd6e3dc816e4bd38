//! Domain model (ids, tasks, columns, the board aggregate, history, events).
//!
//! 依存の向き: domain は ports / impls / app を知らない。
//! 例外は `board` が `crate::reconcile` の純粋関数を使うことだけ。

pub mod action;
pub mod board;
pub mod column;
pub mod errors;
pub mod events;
pub mod ids;
pub mod limits;
pub mod task;

pub use self::action::{Action, ActionHistory, ActionKind};
pub use self::board::Board;
pub use self::column::Column;
pub use self::errors::{BoardError, ErrorKind};
pub use self::events::{BoardEvent, RelayMessage};
pub use self::ids::{ActionId, BoardId, ColumnSlug, ConnectionId, Id, IdMarker, TaskId};
pub use self::limits::BoardLimits;
pub use self::task::Task;

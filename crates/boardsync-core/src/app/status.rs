//! Status - エンジンの状態説明
//!
//! 「なぜ同期されていないのか」を説明するためのスナップショット。

use std::collections::VecDeque;

use serde::Serialize;

use crate::domain::BoardError;

use super::config::StorageMode;

/// 直近の失敗として保持する件数
const RECENT_FAILURES: usize = 16;

/// EngineStatus はある時点のエンジンの状態
///
/// # 使用例
/// ```ignore
/// let status = engine.status();
/// println!("{}", serde_json::to_string_pretty(&status)?);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub mode: Option<StorageMode>,
    pub hydrated: bool,
    pub tasks: usize,
    pub columns: usize,
    pub pending_creations: usize,

    /// 送信待ち・実行中のストア呼び出し
    pub queued_calls: usize,

    pub failed_calls: u64,
    pub last_error: Option<String>,

    /// 端末ストレージが使えずメモリのみで動いているか
    pub device_degraded: bool,

    /// リレー接続。同期ループがなければ None
    pub relay_connected: Option<bool>,
}

/// 失敗したストア呼び出し 1 件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCall {
    pub operation: &'static str,
    pub error: BoardError,
}

/// ストア呼び出しの失敗記録（診断用）
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    failed_calls: u64,
    recent: VecDeque<FailedCall>,
}

impl Diagnostics {
    pub(crate) fn record(&mut self, operation: &'static str, error: BoardError) {
        self.failed_calls += 1;
        if self.recent.len() == RECENT_FAILURES {
            self.recent.pop_front();
        }
        self.recent.push_back(FailedCall { operation, error });
    }

    pub(crate) fn failed_calls(&self) -> u64 {
        self.failed_calls
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        self.recent
            .back()
            .map(|f| format!("{}: {}", f.operation, f.error))
    }

    pub(crate) fn recent(&self) -> Vec<FailedCall> {
        self.recent.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_a_bounded_window_of_failures() {
        let mut diagnostics = Diagnostics::default();
        for n in 0..20 {
            diagnostics.record("edit_task", BoardError::task_not_found(n));
        }
        assert_eq!(diagnostics.failed_calls(), 20);
        assert_eq!(diagnostics.recent().len(), RECENT_FAILURES);
        assert_eq!(
            diagnostics.last_error().as_deref(),
            Some("edit_task: not found: 19 does not exist")
        );
    }
}

//! 同步状态跟踪模块
//!
//! 功能包括：
//! - 把 "同步中 / 上次同步 / 待同步变更 / 错误" 聚合成单一可观察状态
//! - UI 显示类别推导（严格优先级：错误 > 同步中 > 已同步过 > 离线兜底）
//! - 状态指示器自动隐藏（静默 3 秒后延迟复核再隐藏）
//!
//! 状态只由本跟踪器的 setter 修改，订阅者只读。

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::utils::{SyncAge, TimeFormatter};

/// 指示器自动隐藏延迟（固定值，不可配置）
pub const INDICATOR_AUTO_HIDE_DELAY_MS: u64 = 3000;

/// 同步状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// 是否正在同步
    pub is_syncing: bool,
    /// 上次成功同步时间（UTC 毫秒时间戳），从未同步过为 None
    pub last_sync: Option<i64>,
    /// 错误消息（与 is_syncing 不互斥，显示层按优先级处理）
    pub error: Option<String>,
    /// 待同步变更数
    pub pending_changes: u32,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            is_syncing: false,
            last_sync: None,
            error: None,
            pending_changes: 0,
        }
    }
}

/// 显示类别（严格优先级推导结果）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDisplayState {
    /// 有错误（最高优先级）
    Error,
    /// 同步中
    Syncing,
    /// 曾经同步成功过
    Synced,
    /// 兜底：从未同步过
    Offline,
}

impl SyncStatus {
    /// 是否静默（无错误、非同步中、无待同步变更）
    pub fn is_quiescent(&self) -> bool {
        self.error.is_none() && !self.is_syncing && self.pending_changes == 0
    }

    /// 推导显示类别
    ///
    /// 优先级为全序：error > syncing > 已同步过 > offline 兜底。
    pub fn display_state(&self) -> SyncDisplayState {
        if self.error.is_some() {
            SyncDisplayState::Error
        } else if self.is_syncing {
            SyncDisplayState::Syncing
        } else if self.last_sync.is_some() {
            SyncDisplayState::Synced
        } else {
            SyncDisplayState::Offline
        }
    }

    /// "距上次同步" 的显示分桶；从未同步过为 None
    pub fn age(&self) -> Option<SyncAge> {
        self.last_sync.map(TimeFormatter::bucket_since)
    }
}

/// 同步状态跟踪器
pub struct SyncStatusTracker {
    status: watch::Sender<SyncStatus>,
    /// 指示器可见性（自动隐藏由延迟复核驱动）
    visible: Arc<watch::Sender<bool>>,
    hide_delay_ms: u64,
}

impl SyncStatusTracker {
    pub fn new() -> Self {
        Self::with_hide_delay(INDICATOR_AUTO_HIDE_DELAY_MS)
    }

    fn with_hide_delay(hide_delay_ms: u64) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        let (visible, _) = watch::channel(false);

        Self {
            status,
            visible: Arc::new(visible),
            hide_delay_ms,
        }
    }

    /// 测试用：缩短自动隐藏延迟
    #[cfg(test)]
    pub fn with_hide_delay_for_test(hide_delay_ms: u64) -> Self {
        Self::with_hide_delay(hide_delay_ms)
    }

    /// 订阅状态变化（watch 语义：订阅者立即看到当前状态）
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// 当前状态快照
    pub fn current(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// 订阅指示器可见性
    pub fn subscribe_visibility(&self) -> watch::Receiver<bool> {
        self.visible.subscribe()
    }

    /// 指示器当前是否可见
    pub fn is_visible(&self) -> bool {
        *self.visible.borrow()
    }

    /// 标记同步开始
    pub fn begin_sync(&self) {
        self.update(|status| {
            status.is_syncing = true;
        });
    }

    /// 标记同步成功完成（刷新 last_sync，清除错误）
    pub fn complete_sync(&self) {
        self.update(|status| {
            status.is_syncing = false;
            status.last_sync = Some(TimeFormatter::now_utc_millis());
            status.error = None;
            status.pending_changes = 0;
        });
    }

    /// 标记同步失败
    pub fn fail_sync(&self, error: impl Into<String>) {
        self.update(|status| {
            status.is_syncing = false;
            status.error = Some(error.into());
        });
    }

    /// 设置待同步变更数
    pub fn set_pending_changes(&self, count: u32) {
        self.update(|status| {
            status.pending_changes = count;
        });
    }

    /// 清除错误
    pub fn clear_error(&self) {
        self.update(|status| {
            status.error = None;
        });
    }

    /// 应用一次状态变更并驱动指示器可见性
    ///
    /// 跟踪器跨任务共享，变更必须在通道内原子完成，并发 setter 互不覆盖。
    fn update(&self, mutate: impl FnOnce(&mut SyncStatus)) {
        let mut quiescent = false;
        self.status.send_modify(|status| {
            mutate(status);
            quiescent = status.is_quiescent();
        });

        if quiescent {
            self.schedule_hide();
        } else {
            let _ = self.visible.send(true);
        }
    }

    /// 延迟复核后隐藏指示器
    ///
    /// 到点时重新校验静默条件：延迟窗口内若出现新的非静默状态，
    /// 指示器保持可见，不会被旧的隐藏任务误关。
    fn schedule_hide(&self) {
        let status_rx = self.status.subscribe();
        let visible = self.visible.clone();
        let delay_ms = self.hide_delay_ms;

        tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
            if status_rx.borrow().is_quiescent() {
                let _ = visible.send(false);
                debug!("同步指示器已自动隐藏");
            }
        });
    }
}

impl Default for SyncStatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration};

    #[test]
    fn test_display_precedence() {
        // error 与 is_syncing 并存时必须显示 Error，绝不显示 Syncing
        let status = SyncStatus {
            is_syncing: true,
            last_sync: Some(1),
            error: Some("x".to_string()),
            pending_changes: 0,
        };
        assert_eq!(status.display_state(), SyncDisplayState::Error);

        let status = SyncStatus {
            is_syncing: true,
            last_sync: Some(1),
            error: None,
            pending_changes: 0,
        };
        assert_eq!(status.display_state(), SyncDisplayState::Syncing);

        let status = SyncStatus {
            is_syncing: false,
            last_sync: Some(1),
            error: None,
            pending_changes: 0,
        };
        assert_eq!(status.display_state(), SyncDisplayState::Synced);

        assert_eq!(SyncStatus::default().display_state(), SyncDisplayState::Offline);
    }

    #[test]
    fn test_quiescence() {
        assert!(SyncStatus::default().is_quiescent());

        let status = SyncStatus {
            pending_changes: 2,
            ..SyncStatus::default()
        };
        assert!(!status.is_quiescent());
    }

    #[tokio::test]
    async fn test_status_updates_are_observable() {
        let tracker = SyncStatusTracker::new();
        let mut rx = tracker.subscribe();

        tracker.begin_sync();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_syncing);

        tracker.complete_sync();
        rx.changed().await.unwrap();
        let status = rx.borrow().clone();
        assert!(!status.is_syncing);
        assert!(status.last_sync.is_some());
        assert_eq!(status.display_state(), SyncDisplayState::Synced);
        assert_eq!(status.age(), Some(crate::utils::SyncAge::JustNow));
    }

    #[tokio::test]
    async fn test_auto_hide_after_quiescence() {
        let tracker = SyncStatusTracker::with_hide_delay_for_test(100);

        tracker.begin_sync();
        assert!(tracker.is_visible());

        tracker.complete_sync();
        sleep(Duration::from_millis(200)).await;
        assert!(!tracker.is_visible());
    }

    #[tokio::test]
    async fn test_auto_hide_cancelled_by_new_activity() {
        let tracker = SyncStatusTracker::with_hide_delay_for_test(100);

        tracker.begin_sync();
        tracker.complete_sync();

        // 延迟窗口内出现新的非静默状态
        sleep(Duration::from_millis(30)).await;
        tracker.set_pending_changes(1);

        sleep(Duration::from_millis(150)).await;
        // 复核发现非静默，指示器保持可见
        assert!(tracker.is_visible());
    }

    #[tokio::test]
    async fn test_concurrent_setters_do_not_lose_updates() {
        let tracker = Arc::new(SyncStatusTracker::new());

        // 两个任务并发改不同字段，任何一方的修改都不能被另一方覆盖
        let a = {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    tracker.begin_sync();
                }
            })
        };
        let b = {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    tracker.set_pending_changes(7);
                }
            })
        };
        a.await.unwrap();
        b.await.unwrap();

        let status = tracker.current();
        assert!(status.is_syncing);
        assert_eq!(status.pending_changes, 7);
    }

    #[tokio::test]
    async fn test_error_not_silently_cleared() {
        let tracker = SyncStatusTracker::new();

        tracker.fail_sync("network unreachable");
        let status = tracker.current();
        assert_eq!(status.error.as_deref(), Some("network unreachable"));
        assert_eq!(status.display_state(), SyncDisplayState::Error);

        tracker.clear_error();
        assert!(tracker.current().error.is_none());
    }
}

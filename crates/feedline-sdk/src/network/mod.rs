//! 网络可达性模块
//!
//! 平台层（浏览器/移动端）通过 [`NetworkStatusListener`] 上报可达性变化，
//! [`NetworkMonitor`] 将其汇聚为可订阅的最新值流。离线转在线的瞬间
//! 单独广播一次恢复事件，供上层触发重新同步。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::error::Result;
use crate::utils::TimeFormatter;

/// 网络可达性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reachability {
    /// 在线
    Online,
    /// 离线
    Offline,
    /// 网络受限（可达但不可靠）
    Limited,
}

impl Reachability {
    /// 是否可以尝试网络请求
    pub fn is_usable(&self) -> bool {
        matches!(self, Reachability::Online | Reachability::Limited)
    }
}

/// 可达性变化事件
#[derive(Debug, Clone)]
pub struct ReachabilityEvent {
    pub old_status: Reachability,
    pub new_status: Reachability,
    pub timestamp: i64,
}

impl ReachabilityEvent {
    /// 是否是离线转在线的恢复瞬间
    pub fn is_recovery(&self) -> bool {
        self.old_status == Reachability::Offline && self.new_status.is_usable()
    }
}

/// 网络状态监听器 trait（由平台层实现）
#[async_trait]
pub trait NetworkStatusListener: Send + Sync + std::fmt::Debug {
    /// 获取当前可达性
    async fn current_status(&self) -> Reachability;

    /// 开始监听可达性变化
    async fn start_monitoring(&self) -> Result<broadcast::Receiver<Reachability>>;

    /// 停止监听
    async fn stop_monitoring(&self);
}

/// 网络监控器
#[derive(Debug)]
pub struct NetworkMonitor {
    listener: Arc<dyn NetworkStatusListener>,
    /// 最新可达性（订阅者总能读到当前值）
    status: watch::Sender<Reachability>,
    /// 恢复事件广播（仅离线转在线时发送）
    recovery: broadcast::Sender<ReachabilityEvent>,
}

impl NetworkMonitor {
    pub fn new(listener: Arc<dyn NetworkStatusListener>) -> Self {
        let (status, _) = watch::channel(Reachability::Offline);
        let (recovery, _) = broadcast::channel(16);
        Self {
            listener,
            status,
            recovery,
        }
    }

    /// 启动监控：接管平台上报流并汇聚到最新值流
    pub async fn start(&self) -> Result<()> {
        let initial = self.listener.current_status().await;
        let _ = self.status.send(initial);

        let mut receiver = self.listener.start_monitoring().await?;
        let status = self.status.clone();
        let recovery = self.recovery.clone();

        tokio::spawn(async move {
            while let Ok(new_status) = receiver.recv().await {
                let old_status = *status.borrow();
                if old_status == new_status {
                    continue;
                }
                let _ = status.send(new_status);

                let event = ReachabilityEvent {
                    old_status,
                    new_status,
                    timestamp: TimeFormatter::now_utc_millis(),
                };
                if event.is_recovery() {
                    info!("🔌 网络已恢复: {:?} -> {:?}", old_status, new_status);
                    let _ = recovery.send(event);
                }
            }
        });

        Ok(())
    }

    /// 当前可达性
    pub fn current(&self) -> Reachability {
        *self.status.borrow()
    }

    /// 是否可以尝试网络请求
    pub fn is_usable(&self) -> bool {
        self.current().is_usable()
    }

    /// 订阅可达性最新值流
    pub fn subscribe(&self) -> watch::Receiver<Reachability> {
        self.status.subscribe()
    }

    /// 订阅恢复事件（离线转在线）
    pub fn subscribe_recovery(&self) -> broadcast::Receiver<ReachabilityEvent> {
        self.recovery.subscribe()
    }

    /// 停止监控
    pub async fn stop(&self) {
        self.listener.stop_monitoring().await;
    }
}

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use tokio::sync::RwLock;

    /// 测试用网络状态监听器（可主动推送状态）
    #[derive(Debug)]
    pub struct FakeNetworkListener {
        status: RwLock<Reachability>,
        sender: broadcast::Sender<Reachability>,
    }

    impl Default for FakeNetworkListener {
        fn default() -> Self {
            let (sender, _) = broadcast::channel(16);
            Self {
                status: RwLock::new(Reachability::Offline),
                sender,
            }
        }
    }

    impl FakeNetworkListener {
        pub async fn push(&self, status: Reachability) {
            *self.status.write().await = status;
            let _ = self.sender.send(status);
        }
    }

    #[async_trait]
    impl NetworkStatusListener for FakeNetworkListener {
        async fn current_status(&self) -> Reachability {
            *self.status.read().await
        }

        async fn start_monitoring(&self) -> Result<broadcast::Receiver<Reachability>> {
            Ok(self.sender.subscribe())
        }

        async fn stop_monitoring(&self) {}
    }
}

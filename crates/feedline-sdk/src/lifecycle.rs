//! SDK 生命周期管理
//!
//! 管理页面可见性切换与 SDK 关闭等一级生命周期事件，统一触发各模块的状态切换。

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// 生命周期回调 Hook
///
/// 各模块通过实现此 trait 来响应生命周期变化
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    /// 页面切换到不可见（后台 / 切 Tab）时调用
    async fn on_hidden(&self) -> Result<()>;

    /// 页面恢复可见时调用
    async fn on_visible(&self) -> Result<()>;

    /// SDK 关闭时调用
    async fn on_shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// 生命周期管理器
pub struct LifecycleManager {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// 已注册的 Hook 数量
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// 注册生命周期回调 Hook
    pub fn register_hook(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.push(hook);
        info!("✅ 生命周期 Hook 已注册: 当前共 {} 个", self.hooks.len());
    }

    /// 通知所有 Hook：页面不可见
    ///
    /// 按注册顺序执行，单个 Hook 失败记日志后继续，最后返回第一个错误
    pub async fn notify_hidden(&self) -> Result<()> {
        info!("🔄 通知所有模块：页面切换到不可见");
        self.dispatch(|hook| Box::pin(async move { hook.on_hidden().await }), "不可见")
            .await
    }

    /// 通知所有 Hook：页面恢复可见
    pub async fn notify_visible(&self) -> Result<()> {
        info!("🔄 通知所有模块：页面恢复可见");
        self.dispatch(|hook| Box::pin(async move { hook.on_visible().await }), "可见")
            .await
    }

    /// 通知所有 Hook：SDK 关闭
    pub async fn notify_shutdown(&self) -> Result<()> {
        info!("🔄 通知所有模块：SDK 关闭");
        self.dispatch(|hook| Box::pin(async move { hook.on_shutdown().await }), "关闭")
            .await
    }

    async fn dispatch<F>(&self, invoke: F, phase: &str) -> Result<()>
    where
        F: Fn(
            Arc<dyn LifecycleHook>,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>>,
    {
        let mut errors = Vec::new();

        for (index, hook) in self.hooks.iter().enumerate() {
            if let Err(e) = invoke(hook.clone()).await {
                warn!("⚠️ Hook #{} {}切换失败: {}", index, phase, e);
                errors.push(e);
                // 继续执行其他模块
            }
        }

        if let Some(first) = errors.into_iter().next() {
            warn!("⚠️ 部分模块{}切换失败，但所有模块都已尝试执行", phase);
            return Err(first);
        }

        info!("✅ 所有模块{}切换完成", phase);
        Ok(())
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedlineSDKError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingHook {
        visible_calls: AtomicU32,
        hidden_calls: AtomicU32,
        fail_on_hidden: bool,
    }

    impl CountingHook {
        fn new(fail_on_hidden: bool) -> Self {
            Self {
                visible_calls: AtomicU32::new(0),
                hidden_calls: AtomicU32::new(0),
                fail_on_hidden,
            }
        }
    }

    #[async_trait]
    impl LifecycleHook for CountingHook {
        async fn on_hidden(&self) -> Result<()> {
            self.hidden_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_hidden {
                return Err(FeedlineSDKError::Other("hook 故意失败".to_string()));
            }
            Ok(())
        }

        async fn on_visible(&self) -> Result<()> {
            self.visible_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hooks_invoked_in_order() {
        let mut manager = LifecycleManager::new();
        let hook = Arc::new(CountingHook::new(false));
        manager.register_hook(hook.clone());
        assert_eq!(manager.hook_count(), 1);

        manager.notify_visible().await.unwrap();
        manager.notify_hidden().await.unwrap();
        assert_eq!(hook.visible_calls.load(Ordering::SeqCst), 1);
        assert_eq!(hook.hidden_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_hook_does_not_block_others() {
        let mut manager = LifecycleManager::new();
        let failing = Arc::new(CountingHook::new(true));
        let healthy = Arc::new(CountingHook::new(false));
        manager.register_hook(failing.clone());
        manager.register_hook(healthy.clone());

        // 返回第一个错误，但两个 Hook 都执行了
        assert!(manager.notify_hidden().await.is_err());
        assert_eq!(failing.hidden_calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.hidden_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_default_is_noop() {
        let mut manager = LifecycleManager::new();
        manager.register_hook(Arc::new(CountingHook::new(false)));
        manager.notify_shutdown().await.unwrap();
    }
}

//! SDK 主入口模块
//!
//! 采用分层架构：
//! - 业务接口层：FeedlineSDK（当前模块）
//! - 实时通道层：SocketNotificationRelay（connect_socket() 时初始化）
//! - 缓存层：CacheController
//! - 事件系统层：EventBus
//! - 视口协调层：ScrollCoordinator（attach_scroll_surface() 时初始化）

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cache::{CacheController, ServiceWorkerHost};
use crate::error::{FeedlineSDKError, Result};
use crate::events::EventBus;
use crate::http_client::FeedlineApiClient;
use crate::lifecycle::LifecycleManager;
use crate::network::{NetworkMonitor, NetworkStatusListener, Reachability};
use crate::scroll::{ScrollCoordinator, ScrollSurface};
use crate::socket::{SocketNotificationRelay, SocketTransport};
use crate::sync_status::SyncStatusTracker;

/// HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// 连接超时（秒）
    pub connect_timeout_secs: Option<u64>,
    /// 请求超时（秒）
    pub request_timeout_secs: Option<u64>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Some(30),
            request_timeout_secs: Some(300), // 媒体上传可能需要较长时间
        }
    }
}

/// Feedline SDK 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedlineConfig {
    /// 数据存储目录
    pub data_dir: PathBuf,
    /// REST API 基础 URL
    pub api_base_url: String,
    /// 事件总线缓冲区大小
    pub event_buffer_size: usize,
    /// HTTP 客户端配置
    pub http_client_config: HttpClientConfig,
    /// 调试模式
    pub debug_mode: bool,
}

impl Default for FeedlineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api_base_url: "https://api.feedline.app".to_string(),
            event_buffer_size: 256,
            http_client_config: HttpClientConfig::default(),
            debug_mode: false,
        }
    }
}

impl FeedlineConfig {
    pub fn builder() -> FeedlineConfigBuilder {
        FeedlineConfigBuilder::new()
    }
}

/// 获取默认数据目录 ~/.feedline/
fn default_data_dir() -> PathBuf {
    if let Some(home_dir) = std::env::var("HOME").ok().map(PathBuf::from) {
        home_dir.join(".feedline")
    } else if let Some(home_dir) = std::env::var("USERPROFILE").ok().map(PathBuf::from) {
        // Windows 支持
        home_dir.join(".feedline")
    } else {
        PathBuf::from("./feedline_data")
    }
}

/// Feedline SDK 配置构建器
pub struct FeedlineConfigBuilder {
    config: FeedlineConfig,
}

impl FeedlineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: FeedlineConfig::default(),
        }
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.data_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn api_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.config.event_buffer_size = size;
        self
    }

    pub fn http_client_config(mut self, config: HttpClientConfig) -> Self {
        self.config.http_client_config = config;
        self
    }

    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.config.debug_mode = enabled;
        self
    }

    pub fn build(self) -> FeedlineConfig {
        self.config
    }
}

impl Default for FeedlineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 统一 SDK 主接口
pub struct FeedlineSDK {
    /// SDK 配置
    config: FeedlineConfig,

    /// 缓存控制器
    cache: Arc<CacheController>,

    /// 事件总线
    event_bus: Arc<EventBus>,

    /// REST API 客户端
    api: Arc<FeedlineApiClient>,

    /// 网络监控
    network: Arc<NetworkMonitor>,

    /// 同步状态跟踪器
    sync_status: Arc<SyncStatusTracker>,

    /// Socket 通知中继（connect_socket() 时初始化）
    socket_relay: Arc<RwLock<Option<Arc<SocketNotificationRelay>>>>,

    /// 滚动协调器（attach_scroll_surface() 时初始化）
    scroll: Arc<RwLock<Option<Arc<ScrollCoordinator>>>>,

    /// 生命周期管理器
    lifecycle: Arc<RwLock<LifecycleManager>>,

    /// 是否已初始化
    initialized: Arc<RwLock<bool>>,

    /// 是否正在关闭
    shutting_down: Arc<RwLock<bool>>,
}

impl FeedlineSDK {
    /// 异步初始化 SDK
    ///
    /// 分层初始化顺序：
    /// 1. 缓存层 → 2. 网络层 → 3. 事件层 → 4. 业务层
    pub async fn initialize(
        config: FeedlineConfig,
        network_listener: Arc<dyn NetworkStatusListener>,
    ) -> Result<Arc<Self>> {
        info!("正在初始化 FeedlineSDK...");

        Self::validate_config(&config)?;

        // === 第1层：缓存控制器 ===
        let cache = Arc::new(CacheController::open(&config.data_dir).await?);
        info!("缓存控制器初始化完成");

        // === 第2层：网络监控 ===
        let network = Arc::new(NetworkMonitor::new(network_listener));
        network.start().await?;
        info!("网络监控初始化完成");

        // === 第3层：事件总线 ===
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        info!("事件总线初始化完成");

        // === 第4层：REST API 客户端 ===
        let api = Arc::new(FeedlineApiClient::new(
            &config.http_client_config,
            &config.api_base_url,
        )?);
        // 持久化的 Token 在初始化时自动注入
        if let Some(token) = cache.auth_token() {
            api.set_token(Some(token)).await;
            info!("已从本地存储恢复登录凭证");
        }

        // === 第5层：同步状态跟踪器 ===
        let sync_status = Arc::new(SyncStatusTracker::new());
        info!("同步状态跟踪器初始化完成");

        // === 第6层：生命周期管理器 ===
        let lifecycle = Arc::new(RwLock::new(LifecycleManager::new()));
        info!("生命周期管理器初始化完成");

        let sdk = Arc::new(Self {
            config,
            cache,
            event_bus,
            api,
            network,
            sync_status,
            socket_relay: Arc::new(RwLock::new(None)),
            scroll: Arc::new(RwLock::new(None)),
            lifecycle,
            initialized: Arc::new(RwLock::new(true)),
            shutting_down: Arc::new(RwLock::new(false)),
        });

        // 网络恢复时触发一轮同步状态刷新
        sdk.clone().spawn_recovery_listener();

        info!("✅ FeedlineSDK 初始化完成");
        Ok(sdk)
    }

    fn validate_config(config: &FeedlineConfig) -> Result<()> {
        if config.api_base_url.is_empty() {
            return Err(FeedlineSDKError::Config(
                "api_base_url 不能为空".to_string(),
            ));
        }
        if config.event_buffer_size == 0 {
            return Err(FeedlineSDKError::Config(
                "event_buffer_size 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 监听网络恢复事件，恢复时清除同步错误并标记开始同步
    fn spawn_recovery_listener(self: Arc<Self>) {
        let mut recovery = self.network.subscribe_recovery();
        let sync_status = self.sync_status.clone();
        tokio::spawn(async move {
            while let Ok(event) = recovery.recv().await {
                info!("网络恢复，清除同步错误: {:?}", event.new_status);
                sync_status.clear_error();
            }
        });
    }

    /// 连接实时通知通道
    ///
    /// transport 由平台层提供（如 WebSocket/SSE 实现）。重复调用会替换旧通道。
    pub async fn connect_socket(
        &self,
        transport: Arc<dyn SocketTransport>,
    ) -> Result<Arc<SocketNotificationRelay>> {
        self.ensure_running().await?;

        let mut slot = self.socket_relay.write().await;
        if let Some(old) = slot.take() {
            warn!("已存在 Socket 通道，关闭旧通道后重建");
            old.shutdown().await;
        }

        let relay = Arc::new(SocketNotificationRelay::new(
            transport,
            self.event_bus.clone(),
        ));
        relay.start().await?;
        *slot = Some(relay.clone());

        info!("✅ Socket 通知通道已连接");
        Ok(relay)
    }

    /// 挂载滚动表面（由平台层提供 DOM/视图操作实现）
    ///
    /// 重复调用会替换旧协调器。
    pub async fn attach_scroll_surface(
        &self,
        surface: Arc<dyn ScrollSurface>,
        is_mobile: bool,
    ) -> Result<Arc<ScrollCoordinator>> {
        self.ensure_running().await?;

        let coordinator = Arc::new(ScrollCoordinator::new(surface, is_mobile));
        *self.scroll.write().await = Some(coordinator.clone());
        info!("✅ 滚动协调器已挂载 (mobile: {})", is_mobile);
        Ok(coordinator)
    }

    /// 登录成功后写入凭证：持久化并注入 API 客户端
    pub async fn set_auth_token(&self, token: &str) -> Result<()> {
        self.cache.set_auth_token(token)?;
        self.api.set_token(Some(token.to_string())).await;
        Ok(())
    }

    /// 登出：清除持久化凭证与注入的 Token
    pub async fn clear_auth_token(&self) -> Result<()> {
        self.cache.clear_auth_token()?;
        self.api.set_token(None).await;
        Ok(())
    }

    /// 全量缓存清理（委托给缓存控制器）
    pub async fn purge_caches(
        &self,
        host: Option<&Arc<dyn ServiceWorkerHost>>,
        reload: bool,
    ) -> Result<()> {
        self.cache.purge_all(host, reload).await
    }

    /// 关闭 SDK：通知生命周期 Hook，关闭 Socket 通道
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut shutting_down = self.shutting_down.write().await;
            if *shutting_down {
                return Ok(());
            }
            *shutting_down = true;
        }
        info!("正在关闭 FeedlineSDK...");

        if let Err(e) = self.lifecycle.read().await.notify_shutdown().await {
            warn!("生命周期关闭通知部分失败: {}", e);
        }

        if let Some(relay) = self.socket_relay.write().await.take() {
            relay.shutdown().await;
        }
        self.network.stop().await;

        *self.initialized.write().await = false;
        info!("✅ FeedlineSDK 已关闭");
        Ok(())
    }

    async fn ensure_running(&self) -> Result<()> {
        if *self.shutting_down.read().await {
            return Err(FeedlineSDKError::ShuttingDown("SDK 正在关闭".to_string()));
        }
        if !*self.initialized.read().await {
            return Err(FeedlineSDKError::NotInitialized("SDK 未初始化".to_string()));
        }
        Ok(())
    }

    /// 是否已初始化
    pub async fn is_initialized(&self) -> bool {
        *self.initialized.read().await
    }

    /// 是否正在关闭
    pub async fn is_shutting_down(&self) -> bool {
        *self.shutting_down.read().await
    }

    /// 当前网络可达性
    pub fn reachability(&self) -> Reachability {
        self.network.current()
    }

    // ===== 模块访问器 =====

    pub fn config(&self) -> &FeedlineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheController> {
        &self.cache
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn api(&self) -> &Arc<FeedlineApiClient> {
        &self.api
    }

    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.network
    }

    pub fn sync_status(&self) -> &Arc<SyncStatusTracker> {
        &self.sync_status
    }

    pub async fn socket_relay(&self) -> Option<Arc<SocketNotificationRelay>> {
        self.socket_relay.read().await.clone()
    }

    pub async fn scroll(&self) -> Option<Arc<ScrollCoordinator>> {
        self.scroll.read().await.clone()
    }

    pub fn lifecycle(&self) -> &Arc<RwLock<LifecycleManager>> {
        &self.lifecycle
    }
}

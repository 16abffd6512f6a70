//! Feedline SDK - 社交网络客户端协调层
//!
//! 本 SDK 提供社交客户端的事件协调与状态管理功能，包括：
//! - ⚙️ 事件总线：组件间解耦通信，支持最新值重放
//! - 📡 实时通知通道：按频道订阅服务端推送（新发布、新评论、内容变更）
//! - 📜 滚动/视口协调：返回顶部按钮、导航栏显隐、滚动方向判定
//! - 🔄 同步状态跟踪：同步指示器的展示优先级与自动隐藏
//! - 🗄️ 缓存控制：命名缓存库的维护清理与 Service Worker 注销
//! - 🌐 REST API 客户端：用户、好友、互动、媒体、通知等接口
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use feedline_sdk::{FeedlineSDK, FeedlineConfig};
//! # use feedline_sdk::network::NetworkStatusListener;
//!
//! # async fn run(listener: Arc<dyn NetworkStatusListener>) -> Result<(), Box<dyn std::error::Error>> {
//! // 配置 SDK
//! let config = FeedlineConfig::builder()
//!     .data_dir("/path/to/data")
//!     .api_base_url("https://api.feedline.app")
//!     .build();
//!
//! // 初始化 SDK（网络监听器由平台层提供）
//! let sdk = FeedlineSDK::initialize(config, listener).await?;
//!
//! // 订阅新发布通知
//! if let Some(relay) = sdk.socket_relay().await {
//!     let mut rx = relay.subscribe(feedline_sdk::events::NotificationChannel::NewPublication);
//!     tokio::spawn(async move {
//!         while rx.changed().await.is_ok() {
//!             println!("收到新发布通知");
//!         }
//!     });
//! }
//!
//! // 关闭 SDK
//! sdk.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod events;
pub mod http_client;
pub mod lifecycle;
pub mod network;
pub mod scroll;
pub mod sdk;
pub mod socket;
pub mod sync_status;
pub mod utils;
pub mod version;

pub use cache::{CacheController, ServiceWorkerHost, ThemeSettings};
pub use error::{FeedlineSDKError, Result};
pub use events::{
    ClientEvent, EventBus, NotificationChannel, NotificationEvent, SnackbarAction, SnackbarNotice,
};
pub use http_client::FeedlineApiClient;
pub use lifecycle::{LifecycleHook, LifecycleManager};
pub use network::{NetworkMonitor, NetworkStatusListener, Reachability};
pub use scroll::{ScrollConfig, ScrollCoordinator, ScrollSignal, ScrollSurface};
pub use sdk::{FeedlineConfig, FeedlineConfigBuilder, FeedlineSDK, HttpClientConfig};
pub use socket::{ChannelSignal, SocketNotificationRelay, SocketTransport};
pub use sync_status::{SyncDisplayState, SyncStatus, SyncStatusTracker};
pub use version::{BUILD_TIME, GIT_SHA, SDK_VERSION};

//! 缓存控制模块 - 基于 sled 的本地命名缓存库
//!
//! 本模块提供：
//! - 固定集合的命名缓存库（图片、消息、发布、通用应用缓存）
//! - 破坏性但幂等的缓存清理（逐项容错，删除不存在的库是 no-op）
//! - 磁盘缓存桶目录的枚举与无条件删除
//! - Service Worker 注销（由平台层通过 trait 实现），可选延迟后强制刷新
//! - 主题设置的持久化读写（损坏的 JSON 记日志并回退默认值）

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{FeedlineSDKError, Result};

/// 强制刷新前等待注销完成的固定延迟
pub const RELOAD_DELAY_MS: u64 = 1000;

/// 命名缓存库（固定枚举集合，外部标识符）
pub mod store_names {
    /// 图片缓存
    pub const IMAGE_CACHE: &str = "image_cache";
    /// 消息缓存
    pub const MESSAGES: &str = "messages";
    /// 发布缓存
    pub const PUBLICATIONS: &str = "publications";
    /// 通用应用缓存
    pub const APP_CACHE: &str = "app_cache";
    /// 设置库（不在清理范围内）
    pub const SETTINGS: &str = "settings";

    /// 清理操作覆盖的缓存库集合
    pub const PURGEABLE: [&str; 4] = [IMAGE_CACHE, MESSAGES, PUBLICATIONS, APP_CACHE];
}

/// 设置键
mod settings_keys {
    pub const THEME_SETTINGS: &str = "theme_settings";
    pub const AUTH_TOKEN: &str = "auth_token";
}

/// Service Worker 宿主（由平台层实现；非 PWA 平台可为 no-op）
#[async_trait]
pub trait ServiceWorkerHost: Send + Sync + std::fmt::Debug {
    /// 注销所有活跃的 Service Worker 注册，返回注销数量
    async fn unregister_all(&self) -> Result<u32>;

    /// 强制整页刷新
    async fn reload(&self);
}

/// 主题设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSettings {
    /// 主题模式（light / dark / system）
    pub mode: String,
    /// 强调色（可选）
    pub accent_color: Option<String>,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            mode: "system".to_string(),
            accent_color: None,
        }
    }
}

/// 缓存控制器
#[derive(Debug)]
pub struct CacheController {
    /// sled 数据库实例（命名缓存库为其 Tree）
    db: sled::Db,
    /// 磁盘缓存桶根目录
    cache_dir: PathBuf,
}

impl CacheController {
    /// 打开缓存控制器
    ///
    /// sled 数据库位于 `<data_dir>/kv`，缓存桶目录位于 `<data_dir>/caches`。
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let kv_path = data_dir.join("kv");
        let cache_dir = data_dir.join("caches");

        tokio::fs::create_dir_all(&kv_path)
            .await
            .map_err(|e| FeedlineSDKError::IO(format!("创建 KV 存储目录失败: {}", e)))?;
        tokio::fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| FeedlineSDKError::IO(format!("创建缓存桶目录失败: {}", e)))?;

        // 打开 sled 数据库（旧实例可能刚释放锁，重试多次带退避）
        const MAX_OPEN_RETRIES: u32 = 5;
        const RETRY_DELAY_MS: u64 = 200;
        let mut db_opt: Option<sled::Db> = None;
        let mut last_err: Option<sled::Error> = None;
        for attempt in 0..MAX_OPEN_RETRIES {
            match sled::open(&kv_path) {
                Ok(d) => {
                    db_opt = Some(d);
                    break;
                }
                Err(e) => {
                    let msg = format!("{}", e);
                    last_err = Some(e);
                    let is_lock = msg.contains("could not acquire lock")
                        || msg.contains("Resource temporarily unavailable")
                        || msg.contains("WouldBlock");
                    if is_lock && attempt + 1 < MAX_OPEN_RETRIES {
                        let delay_ms = RETRY_DELAY_MS * (1 << attempt);
                        tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                    } else {
                        break;
                    }
                }
            }
        }
        let db = db_opt.ok_or_else(|| {
            FeedlineSDKError::KvStore(
                last_err
                    .map(|e| format!("打开 sled 数据库失败: {}", e))
                    .unwrap_or_else(|| "打开 sled 数据库失败".to_string()),
            )
        })?;

        Ok(Self { db, cache_dir })
    }

    /// 向命名缓存库写入键值对
    pub fn set<V: Serialize>(&self, store: &str, key: &str, value: &V) -> Result<()> {
        let tree = self.db.open_tree(store)?;
        let bytes = serde_json::to_vec(value)
            .map_err(|e| FeedlineSDKError::Serialization(format!("序列化值失败: {}", e)))?;
        tree.insert(key, bytes)?;
        Ok(())
    }

    /// 从命名缓存库读取键值对
    pub fn get<V: for<'de> Deserialize<'de>>(&self, store: &str, key: &str) -> Result<Option<V>> {
        let tree = self.db.open_tree(store)?;
        match tree.get(key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| FeedlineSDKError::Serialization(format!("反序列化值失败: {}", e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// 删除固定集合内的所有命名缓存库
    ///
    /// 逐项独立删除，单项失败记日志后继续（部分失败是预期内的，非致命）。
    /// 删除不存在的库是 no-op。返回实际删除的库数量。
    pub fn clear_named_stores(&self) -> u32 {
        let mut dropped = 0u32;
        for name in store_names::PURGEABLE {
            // 存在性检查：不存在的库不算删除
            let exists = self
                .db
                .tree_names()
                .iter()
                .any(|n| n.as_ref() == name.as_bytes());
            if !exists {
                continue;
            }
            match self.db.drop_tree(name) {
                Ok(true) => {
                    info!("缓存库已删除: {}", name);
                    dropped += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("删除缓存库 {} 失败，跳过: {}", name, e);
                }
            }
        }
        dropped
    }

    /// 枚举并无条件删除所有磁盘缓存桶目录
    ///
    /// 单项失败记日志后继续。返回删除的目录数量。
    pub async fn clear_cache_dirs(&self) -> u32 {
        let mut removed = 0u32;
        let mut entries = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("枚举缓存桶目录失败: {}", e);
                return 0;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let result = if path.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            match result {
                Ok(()) => {
                    info!("缓存桶已删除: {}", path.display());
                    removed += 1;
                }
                Err(e) => {
                    warn!("删除缓存桶 {} 失败，跳过: {}", path.display(), e);
                }
            }
        }
        removed
    }

    /// 注销所有 Service Worker；`reload` 为 true 时延迟固定时长后强制刷新，
    /// 给注销留出完成时间
    pub async fn unregister_service_workers(
        &self,
        host: &Arc<dyn ServiceWorkerHost>,
        reload: bool,
    ) -> Result<u32> {
        let count = host.unregister_all().await?;
        info!("已注销 {} 个 Service Worker", count);

        if reload {
            let host = host.clone();
            tokio::spawn(async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(RELOAD_DELAY_MS)).await;
                host.reload().await;
            });
        }

        Ok(count)
    }

    /// 全量清理：命名缓存库 + 磁盘缓存桶 + Service Worker 注销
    ///
    /// 破坏性维护操作，无回滚；重复调用安全（幂等）。
    pub async fn purge_all(
        &self,
        host: Option<&Arc<dyn ServiceWorkerHost>>,
        reload: bool,
    ) -> Result<()> {
        let stores = self.clear_named_stores();
        let dirs = self.clear_cache_dirs().await;
        info!("缓存清理完成: {} 个缓存库, {} 个缓存桶", stores, dirs);

        if let Some(host) = host {
            // Service Worker 注销失败不让整次清理失败
            if let Err(e) = self.unregister_service_workers(host, reload).await {
                warn!("Service Worker 注销失败，清理继续: {}", e);
            }
        }
        Ok(())
    }

    /// 读取主题设置
    ///
    /// 持久化的 JSON 损坏时记日志并回退默认值，绝不向上传播。
    pub fn theme_settings(&self) -> ThemeSettings {
        let tree = match self.db.open_tree(store_names::SETTINGS) {
            Ok(tree) => tree,
            Err(e) => {
                warn!("打开设置库失败，使用默认主题: {}", e);
                return ThemeSettings::default();
            }
        };
        match tree.get(settings_keys::THEME_SETTINGS) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("主题设置 JSON 损坏，回退默认值: {}", e);
                    ThemeSettings::default()
                }
            },
            Ok(None) => ThemeSettings::default(),
            Err(e) => {
                warn!("读取主题设置失败，使用默认值: {}", e);
                ThemeSettings::default()
            }
        }
    }

    /// 保存主题设置
    pub fn set_theme_settings(&self, settings: &ThemeSettings) -> Result<()> {
        self.set(store_names::SETTINGS, settings_keys::THEME_SETTINGS, settings)
    }

    /// 读取持久化的 Bearer Token
    pub fn auth_token(&self) -> Option<String> {
        self.get(store_names::SETTINGS, settings_keys::AUTH_TOKEN)
            .ok()
            .flatten()
    }

    /// 持久化 Bearer Token
    pub fn set_auth_token(&self, token: &str) -> Result<()> {
        self.set(store_names::SETTINGS, settings_keys::AUTH_TOKEN, &token)
    }

    /// 清除持久化的 Bearer Token
    pub fn clear_auth_token(&self) -> Result<()> {
        let tree = self.db.open_tree(store_names::SETTINGS)?;
        tree.remove(settings_keys::AUTH_TOKEN)?;
        Ok(())
    }
}

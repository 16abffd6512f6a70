//! 事件系统模块 - 处理客户端中的各种事件
//!
//! 功能包括：
//! - 按关注点划分的 "最新值" 事件通道（媒体处理完成、自定义表情处理完成、资料更新）
//! - 通知事件类型（来自 Socket 中继的五个固定频道）
//! - Snackbar 用户提示事件
//! - 事件广播和订阅机制

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::debug;

use crate::utils::TimeFormatter;

/// 通知频道（固定集合，与服务端 Socket 事件名一一对应）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationChannel {
    /// 通用通知（负载为不透明 JSON）
    GeneralNotification,
    /// 新评论
    NewComment,
    /// 新发布
    NewPublication,
    /// 删除发布
    DeletePublication,
    /// 更新发布
    UpdatePublication,
}

impl NotificationChannel {
    /// 频道的线上名称（与服务端事件名保持一致）
    pub fn wire_name(&self) -> &'static str {
        match self {
            NotificationChannel::GeneralNotification => "generalNotification",
            NotificationChannel::NewComment => "newComment",
            NotificationChannel::NewPublication => "newPublication",
            NotificationChannel::DeletePublication => "deletePublication",
            NotificationChannel::UpdatePublication => "updatePublication",
        }
    }

    /// 从线上名称解析频道，未知名称返回 None
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "generalNotification" => Some(NotificationChannel::GeneralNotification),
            "newComment" => Some(NotificationChannel::NewComment),
            "newPublication" => Some(NotificationChannel::NewPublication),
            "deletePublication" => Some(NotificationChannel::DeletePublication),
            "updatePublication" => Some(NotificationChannel::UpdatePublication),
            _ => None,
        }
    }

    /// 全部频道（中继启动时订阅的固定集合）
    pub const ALL: [NotificationChannel; 5] = [
        NotificationChannel::GeneralNotification,
        NotificationChannel::NewComment,
        NotificationChannel::NewPublication,
        NotificationChannel::DeletePublication,
        NotificationChannel::UpdatePublication,
    ];
}

/// 通知事件
///
/// 生命周期：Socket 中继收到帧时创建，每个活跃订阅者各消费一次，不持久化。
/// 负载形状由频道决定（发布快照、评论快照或不透明 JSON），中继不做校验。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// 来源频道
    pub channel: NotificationChannel,
    /// 频道相关的负载（原样透传，不做 schema 校验）
    pub payload: serde_json::Value,
    /// 接收时间（UNIX 毫秒时间戳，UTC）
    pub received_at: i64,
}

impl NotificationEvent {
    pub fn new(channel: NotificationChannel, payload: serde_json::Value) -> Self {
        Self {
            channel,
            payload,
            received_at: TimeFormatter::now_utc_millis(),
        }
    }
}

/// 媒体处理完成事件（服务端转码/压缩完成）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaProcessedEvent {
    /// 媒体 ID
    pub media_id: String,
    /// 可访问的 URL
    pub url: String,
    /// MIME 类型
    pub mime_type: String,
    /// 缩略图 URL（可选，图片/视频）
    pub thumbnail_url: Option<String>,
}

/// 自定义表情处理完成事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmojiProcessedEvent {
    /// 表情 ID
    pub emoji_id: String,
    /// 短代码（如 :party:）
    pub shortcode: String,
    /// 图片 URL
    pub image_url: String,
}

/// 用户资料快照（资料更新事件的负载）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

/// Snackbar 恢复动作
///
/// 用户可见的失败统一走 Snackbar，仅提供两种恢复方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnackbarAction {
    /// 关闭提示
    Dismiss,
    /// 刷新页面
    Refresh,
}

/// Snackbar 提示
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnackbarNotice {
    pub message: String,
    pub action: SnackbarAction,
}

/// 客户端事件类型（聚合广播）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientEvent {
    /// 媒体处理完成
    MediaProcessed(MediaProcessedEvent),
    /// 自定义表情处理完成
    EmojiProcessed(EmojiProcessedEvent),
    /// 用户资料更新
    ProfileUpdated(ProfileSnapshot),
    /// Socket 通知
    Notification(NotificationEvent),
    /// 用户可见提示
    Snackbar(SnackbarNotice),
}

impl ClientEvent {
    /// 获取事件类型字符串
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::MediaProcessed(_) => "media_processed",
            ClientEvent::EmojiProcessed(_) => "emoji_processed",
            ClientEvent::ProfileUpdated(_) => "profile_updated",
            ClientEvent::Notification(_) => "notification",
            ClientEvent::Snackbar(_) => "snackbar",
        }
    }
}

/// "最新值" 事件通道
///
/// BehaviorSubject 语义：新订阅者立即收到最近一次发布的值（latest-value replay），
/// 通道本身不缓冲历史。`subscribe` 返回的接收端即显式的 teardown 句柄，
/// drop 即退订。
#[derive(Debug)]
pub struct LatestValue<T> {
    sender: watch::Sender<Option<T>>,
}

impl<T: Clone> LatestValue<T> {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    /// 发布新值，替换当前值并唤醒所有订阅者
    pub fn publish(&self, value: T) {
        // 无订阅者时仅更新当前值，属正常场景
        let _ = self.sender.send(Some(value));
    }

    /// 获取当前值（尚未发布过时为 None）
    pub fn current(&self) -> Option<T> {
        self.sender.borrow().clone()
    }

    /// 订阅通道，接收端首次 borrow 即可看到最新值
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.sender.subscribe()
    }

    /// 活跃订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for LatestValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 事件统计信息
#[derive(Debug, Clone, Default)]
pub struct EventStats {
    /// 总事件数
    pub total_events: u64,
    /// 按类型分组的事件数
    pub events_by_type: HashMap<String, u64>,
    /// 最后事件时间（UTC 毫秒）
    pub last_event_time: Option<i64>,
}

/// 事件总线
///
/// 无状态中继：按关注点提供 "最新值" 通道，并通过聚合广播转发所有事件。
pub struct EventBus {
    /// 媒体处理完成（最新值通道）
    media_processed: LatestValue<MediaProcessedEvent>,
    /// 自定义表情处理完成（最新值通道）
    emoji_processed: LatestValue<EmojiProcessedEvent>,
    /// 用户资料更新（最新值通道）
    profile_updated: LatestValue<ProfileSnapshot>,
    /// 聚合广播发送器
    sender: broadcast::Sender<ClientEvent>,
    /// 事件统计
    stats: Arc<RwLock<EventStats>>,
}

impl EventBus {
    /// 创建新的事件总线
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);

        Self {
            media_processed: LatestValue::new(),
            emoji_processed: LatestValue::new(),
            profile_updated: LatestValue::new(),
            sender,
            stats: Arc::new(RwLock::new(EventStats::default())),
        }
    }

    /// 发布事件
    ///
    /// 按变体路由到对应的 "最新值" 通道，同时进入聚合广播。
    pub async fn emit(&self, event: ClientEvent) {
        debug!("Emitting event: {}", event.event_type());

        // 更新统计
        {
            let mut stats = self.stats.write().await;
            stats.total_events += 1;
            *stats
                .events_by_type
                .entry(event.event_type().to_string())
                .or_insert(0) += 1;
            stats.last_event_time = Some(TimeFormatter::now_utc_millis());
        }

        match &event {
            ClientEvent::MediaProcessed(e) => self.media_processed.publish(e.clone()),
            ClientEvent::EmojiProcessed(e) => self.emoji_processed.publish(e.clone()),
            ClientEvent::ProfileUpdated(e) => self.profile_updated.publish(e.clone()),
            ClientEvent::Notification(_) | ClientEvent::Snackbar(_) => {}
        }

        // 广播事件（无订阅者时 send 会失败，属正常场景，仅打 debug）
        if let Err(e) = self.sender.send(event) {
            debug!("Failed to broadcast event (no active receivers): {}", e);
        }
    }

    /// 发布用户可见提示（所有用户可见失败的统一出口）
    pub async fn snackbar(&self, message: impl Into<String>, action: SnackbarAction) {
        self.emit(ClientEvent::Snackbar(SnackbarNotice {
            message: message.into(),
            action,
        }))
        .await;
    }

    /// 订阅聚合广播
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    /// 媒体处理完成通道
    pub fn media_processed(&self) -> &LatestValue<MediaProcessedEvent> {
        &self.media_processed
    }

    /// 自定义表情处理完成通道
    pub fn emoji_processed(&self) -> &LatestValue<EmojiProcessedEvent> {
        &self.emoji_processed
    }

    /// 用户资料更新通道
    pub fn profile_updated(&self) -> &LatestValue<ProfileSnapshot> {
        &self.profile_updated
    }

    /// 获取事件统计
    pub async fn get_stats(&self) -> EventStats {
        self.stats.read().await.clone()
    }

    /// 获取聚合广播的活跃订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_event_bus_basic_functionality() {
        let bus = EventBus::new(100);

        let mut receiver = bus.subscribe();

        let event = ClientEvent::MediaProcessed(MediaProcessedEvent {
            media_id: "m1".to_string(),
            url: "https://cdn.feedline.app/m1.webp".to_string(),
            mime_type: "image/webp".to_string(),
            thumbnail_url: None,
        });

        bus.emit(event).await;

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_type(), "media_processed");

        let stats = bus.get_stats().await;
        assert_eq!(stats.total_events, 1);
        assert_eq!(stats.events_by_type.get("media_processed"), Some(&1));
    }

    #[tokio::test]
    async fn test_latest_value_replay() {
        let bus = EventBus::new(16);

        // 先发布，后订阅：订阅者应立即看到最新值
        bus.emit(ClientEvent::ProfileUpdated(ProfileSnapshot {
            user_id: "u1".to_string(),
            display_name: "Ana".to_string(),
            avatar_url: None,
            bio: None,
        }))
        .await;

        let rx = bus.profile_updated().subscribe();
        let snapshot = rx.borrow().clone().unwrap();
        assert_eq!(snapshot.user_id, "u1");

        // 再次发布：当前值被替换，不缓冲历史
        bus.emit(ClientEvent::ProfileUpdated(ProfileSnapshot {
            user_id: "u1".to_string(),
            display_name: "Ana B".to_string(),
            avatar_url: Some("https://cdn.feedline.app/a.png".to_string()),
            bio: None,
        }))
        .await;

        assert_eq!(
            bus.profile_updated().current().unwrap().display_name,
            "Ana B"
        );
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(100);

        let mut receiver1 = bus.subscribe();
        let mut receiver2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.snackbar("network request failed", SnackbarAction::Refresh)
            .await;

        let event1 = receiver1.recv().await.unwrap();
        let event2 = receiver2.recv().await.unwrap();

        assert_eq!(event1.event_type(), "snackbar");
        assert_eq!(event2.event_type(), "snackbar");
    }

    #[tokio::test]
    async fn test_notification_event_passthrough() {
        let bus = EventBus::new(16);
        let mut receiver = bus.subscribe();

        let payload = json!({"postId": "p1", "text": "hi"});
        bus.emit(ClientEvent::Notification(NotificationEvent::new(
            NotificationChannel::NewComment,
            payload.clone(),
        )))
        .await;

        // 负载必须原样透传
        match receiver.recv().await.unwrap() {
            ClientEvent::Notification(n) => {
                assert_eq!(n.channel, NotificationChannel::NewComment);
                assert_eq!(n.payload, payload);
            }
            other => panic!("unexpected event: {}", other.event_type()),
        }
    }

    #[test]
    fn test_channel_wire_names() {
        for channel in NotificationChannel::ALL {
            assert_eq!(
                NotificationChannel::from_wire(channel.wire_name()),
                Some(channel)
            );
        }
        assert_eq!(NotificationChannel::from_wire("unknownChannel"), None);
    }
}

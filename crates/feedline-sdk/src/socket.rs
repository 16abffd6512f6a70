//! Socket 通知中继模块
//!
//! 包装一条长连接双向通道，职责：
//! - 启动时订阅固定的五个通知频道
//! - 入站帧仅校验负载存在性，原样转发到对应频道的 "最新值" 观察通道和事件总线
//! - 出站发送序列化后直接发出：无确认、无重试、无背压
//! - 传输层错误记录日志并终止：所有频道观察通道进入 Closed，不做自动重连
//!   （重连是底层传输库的职责，不在中继范围内）

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::events::{ClientEvent, EventBus, NotificationChannel, NotificationEvent};

/// 线上帧：事件名 + JSON 负载
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketFrame {
    /// 事件名（频道的线上名称）
    pub event: String,
    /// 负载（缺失视为坏帧，丢弃）
    pub payload: Option<serde_json::Value>,
}

impl SocketFrame {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            payload: Some(payload),
        }
    }
}

/// 传输层事件
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// 收到一帧
    Frame(SocketFrame),
    /// 传输层错误（接收流随之终止）
    Error(String),
}

/// Socket 传输 trait（由平台层实现，如 WebSocket / 原生长连接）
///
/// 断线重连由实现方负责，中继只消费帧流。
#[async_trait]
pub trait SocketTransport: Send + Sync + std::fmt::Debug {
    /// 开始接收，返回帧流
    async fn start_receiving(&self) -> Result<broadcast::Receiver<TransportEvent>>;

    /// 发送一帧（无确认）
    async fn send(&self, frame: SocketFrame) -> Result<()>;

    /// 关闭连接
    async fn close(&self);
}

/// 频道观察信号
///
/// watch 语义：新订阅者立即看到该频道最近的信号（latest-value replay）。
#[derive(Debug, Clone)]
pub enum ChannelSignal {
    /// 尚未收到任何帧
    Idle,
    /// 最近一帧
    Frame(NotificationEvent),
    /// 传输层已终止（不可恢复）
    Closed(String),
}

/// 发布快照（newPublication / updatePublication 负载）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationSnapshot {
    pub id: String,
    pub author_id: String,
    pub text: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub created_at: i64,
    #[serde(default)]
    pub reactions_count: u32,
    #[serde(default)]
    pub comments_count: u32,
}

/// 评论快照（newComment 负载）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSnapshot {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: i64,
}

impl NotificationEvent {
    /// 尝试把负载解码为发布快照（解码失败由调用方处理，中继不关心）
    pub fn decode_publication(&self) -> Result<PublicationSnapshot> {
        serde_json::from_value(self.payload.clone()).map_err(Into::into)
    }

    /// 尝试把负载解码为评论快照
    pub fn decode_comment(&self) -> Result<CommentSnapshot> {
        serde_json::from_value(self.payload.clone()).map_err(Into::into)
    }
}

/// Socket 通知中继
pub struct SocketNotificationRelay {
    transport: Arc<dyn SocketTransport>,
    /// 每个频道一个 "最新值" 观察通道
    channels: HashMap<NotificationChannel, watch::Sender<ChannelSignal>>,
    event_bus: Arc<EventBus>,
    /// 接收循环任务句柄
    recv_task: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl SocketNotificationRelay {
    /// 创建中继并订阅固定频道集合
    pub fn new(transport: Arc<dyn SocketTransport>, event_bus: Arc<EventBus>) -> Self {
        let mut channels = HashMap::new();
        for channel in NotificationChannel::ALL {
            let (tx, _) = watch::channel(ChannelSignal::Idle);
            channels.insert(channel, tx);
        }

        Self {
            transport,
            channels,
            event_bus,
            recv_task: RwLock::new(None),
        }
    }

    /// 启动接收循环
    pub async fn start(&self) -> Result<()> {
        let mut receiver = self.transport.start_receiving().await?;
        let channels: HashMap<NotificationChannel, watch::Sender<ChannelSignal>> = self
            .channels
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        let event_bus = self.event_bus.clone();

        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(TransportEvent::Frame(frame)) => {
                        Self::dispatch_frame(&channels, &event_bus, frame).await;
                    }
                    Ok(TransportEvent::Error(reason)) => {
                        error!("Socket 传输错误，接收循环终止: {}", reason);
                        Self::close_all(&channels, reason);
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!("Socket 传输流已关闭，接收循环终止");
                        Self::close_all(&channels, "transport closed".to_string());
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Socket 帧流滞后，丢失 {} 帧", missed);
                    }
                }
            }
        });

        *self.recv_task.write().await = Some(handle);
        info!("✅ Socket 通知中继已启动，订阅 {} 个频道", self.channels.len());
        Ok(())
    }

    /// 分发一帧：仅校验频道名可识别且负载存在，不做 schema 校验
    async fn dispatch_frame(
        channels: &HashMap<NotificationChannel, watch::Sender<ChannelSignal>>,
        event_bus: &EventBus,
        frame: SocketFrame,
    ) {
        let Some(channel) = NotificationChannel::from_wire(&frame.event) else {
            warn!("收到未知频道的帧，已丢弃: {}", frame.event);
            return;
        };

        let Some(payload) = frame.payload else {
            warn!("频道 {} 的帧缺少负载，已丢弃", frame.event);
            return;
        };

        let event = NotificationEvent::new(channel, payload);

        if let Some(tx) = channels.get(&channel) {
            let _ = tx.send(ChannelSignal::Frame(event.clone()));
        }
        event_bus.emit(ClientEvent::Notification(event)).await;
    }

    /// 把所有频道标记为已终止
    fn close_all(
        channels: &HashMap<NotificationChannel, watch::Sender<ChannelSignal>>,
        reason: String,
    ) {
        for tx in channels.values() {
            let _ = tx.send(ChannelSignal::Closed(reason.clone()));
        }
    }

    /// 订阅某个频道的观察通道
    pub fn subscribe(&self, channel: NotificationChannel) -> watch::Receiver<ChannelSignal> {
        // channels 在构造时覆盖全部频道，这里必然命中
        self.channels[&channel].subscribe()
    }

    /// 获取某个频道的最新信号
    pub fn latest(&self, channel: NotificationChannel) -> ChannelSignal {
        self.channels[&channel].subscribe().borrow().clone()
    }

    /// 发送通知帧（序列化后直接发出，无确认、无重试）
    pub async fn send_notification(
        &self,
        channel: NotificationChannel,
        payload: serde_json::Value,
    ) -> Result<()> {
        let frame = SocketFrame::new(channel.wire_name(), payload);
        self.transport.send(frame).await
    }

    /// 发送 "新发布" 通知
    pub async fn send_new_publication(&self, publication: &PublicationSnapshot) -> Result<()> {
        let payload = serde_json::to_value(publication)?;
        self.send_notification(NotificationChannel::NewPublication, payload)
            .await
    }

    /// 发送 "更新发布" 通知
    pub async fn send_update_publication(&self, publication: &PublicationSnapshot) -> Result<()> {
        let payload = serde_json::to_value(publication)?;
        self.send_notification(NotificationChannel::UpdatePublication, payload)
            .await
    }

    /// 发送 "删除发布" 通知
    pub async fn send_delete_publication(&self, publication_id: &str) -> Result<()> {
        let payload = serde_json::json!({ "id": publication_id });
        self.send_notification(NotificationChannel::DeletePublication, payload)
            .await
    }

    /// 发送 "新评论" 通知
    pub async fn send_new_comment(&self, comment: &CommentSnapshot) -> Result<()> {
        let payload = serde_json::to_value(comment)?;
        self.send_notification(NotificationChannel::NewComment, payload)
            .await
    }

    /// 停止接收循环并关闭传输
    pub async fn shutdown(&self) {
        if let Some(handle) = self.recv_task.write().await.take() {
            handle.abort();
        }
        self.transport.close().await;
        Self::close_all(&self.channels, "relay shutdown".to_string());
        info!("Socket 通知中继已停止");
    }
}


#[cfg(test)]
mod tests {
    use super::test_helpers::MemoryTransport;
    use super::*;
    use serde_json::json;
    use tokio::time::{sleep, Duration};

    fn relay_with_transport() -> (SocketNotificationRelay, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let bus = Arc::new(EventBus::new(64));
        let relay = SocketNotificationRelay::new(transport.clone(), bus);
        (relay, transport)
    }

    #[tokio::test]
    async fn test_frame_payload_passthrough() {
        let (relay, transport) = relay_with_transport();
        relay.start().await.unwrap();

        let mut rx = relay.subscribe(NotificationChannel::NewComment);

        let payload = json!({"postId": "p1", "text": "hi"});
        transport.push(SocketFrame::new("newComment", payload.clone()));

        rx.changed().await.unwrap();
        match rx.borrow().clone() {
            ChannelSignal::Frame(event) => {
                assert_eq!(event.channel, NotificationChannel::NewComment);
                // 负载必须原样可见，不做任何改写
                assert_eq!(event.payload, payload);
            }
            other => panic!("unexpected signal: {:?}", other),
        };
    }

    #[tokio::test]
    async fn test_latest_value_replay_for_late_subscriber() {
        let (relay, transport) = relay_with_transport();
        relay.start().await.unwrap();

        transport.push(SocketFrame::new(
            "newPublication",
            json!({"id": "pub1", "authorId": "u1", "text": "hello", "createdAt": 1}),
        ));
        sleep(Duration::from_millis(50)).await;

        // 帧到达之后才订阅，依然能看到最新值
        match relay.latest(NotificationChannel::NewPublication) {
            ChannelSignal::Frame(event) => {
                let publication = event.decode_publication().unwrap();
                assert_eq!(publication.id, "pub1");
                assert_eq!(publication.author_id, "u1");
            }
            other => panic!("unexpected signal: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_channel_and_missing_payload_dropped() {
        let (relay, transport) = relay_with_transport();
        relay.start().await.unwrap();

        transport.push(SocketFrame::new("mysteryChannel", json!({"x": 1})));
        transport.push(SocketFrame {
            event: "newComment".to_string(),
            payload: None,
        });
        sleep(Duration::from_millis(50)).await;

        // 两帧都被丢弃，所有频道仍是 Idle
        for channel in NotificationChannel::ALL {
            assert!(matches!(relay.latest(channel), ChannelSignal::Idle));
        }
    }

    #[tokio::test]
    async fn test_transport_error_closes_all_channels() {
        let (relay, transport) = relay_with_transport();
        relay.start().await.unwrap();

        transport.fail("connection reset");
        sleep(Duration::from_millis(50)).await;

        for channel in NotificationChannel::ALL {
            match relay.latest(channel) {
                ChannelSignal::Closed(reason) => assert_eq!(reason, "connection reset"),
                other => panic!("unexpected signal: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_outbound_send_is_fire_and_forget() {
        let (relay, transport) = relay_with_transport();

        let comment = CommentSnapshot {
            id: "c1".to_string(),
            post_id: "p1".to_string(),
            author_id: "u2".to_string(),
            text: "nice".to_string(),
            created_at: 42,
        };
        relay.send_new_comment(&comment).await.unwrap();
        relay.send_delete_publication("pub9").await.unwrap();

        let sent = transport.sent.read().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].event, "newComment");
        assert_eq!(sent[0].payload.as_ref().unwrap()["postId"], "p1");
        assert_eq!(sent[1].event, "deletePublication");
        assert_eq!(sent[1].payload.as_ref().unwrap()["id"], "pub9");
    }
}

//! HTTP 客户端模块 - REST API 访问
//!
//! 本模块提供对服务端 REST API 的类型化访问，使用 reqwest 作为底层 HTTP 客户端。
//! 覆盖的接口组：
//! - 用户资料（/user）
//! - 好友管理（/friends/*）
//! - 内容互动（/reactions/*、/reports/*）
//! - 媒体创建（/media/create，multipart 上传）
//! - 通知（/notifications/*）
//! - 邮箱变更（/email/*）
//! - 自定义表情（/custom-reactions/*）
//!
//! 所有请求携带 Bearer Token（来自持久化的客户端存储）。
//! 传输层失败与 API 层失败分开上报，不做自动重试。

use reqwest::{multipart, Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::error::{FeedlineSDKError, Result};
use crate::sdk::HttpClientConfig;

/// 用户资料
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// 好友条目
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendEntry {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// pending / accepted
    pub status: String,
}

/// 媒体创建响应
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaCreateResponse {
    pub media_id: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// 通知条目
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEntry {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub publication_id: Option<String>,
    pub created_at: i64,
    pub read: bool,
}

/// 自定义表情条目
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomReactionEntry {
    pub id: String,
    pub name: String,
    pub image_url: String,
}

/// REST API 客户端
pub struct FeedlineApiClient {
    client: Client,
    base_url: String,
    /// Bearer Token（登录后由 SDK 注入，来自持久化存储）
    token: Arc<RwLock<Option<String>>>,
}

impl FeedlineApiClient {
    /// 创建新的 API 客户端
    pub fn new(config: &HttpClientConfig, base_url: &str) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(timeout) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }

        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| FeedlineSDKError::Other(format!("创建 HTTP 客户端失败: {}", e)))?;

        info!("✅ API 客户端已创建 (base_url: {})", base_url);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// 注入 Bearer Token（登录成功后调用）
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 附加鉴权头、发送请求并检查状态码
    ///
    /// 传输失败映射为 Transport，非 2xx 映射为 Api（携带状态码与响应体）。
    async fn execute(&self, builder: RequestBuilder, context: &str) -> Result<reqwest::Response> {
        let builder = match self.token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| FeedlineSDKError::Transport(format!("{}失败: {}", context, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误信息".to_string());
            error!("❌ {}失败，HTTP 状态码: {}, 错误: {}", context, status, error_text);
            return Err(FeedlineSDKError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response)
    }

    async fn parse<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
        context: &str,
    ) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| FeedlineSDKError::Serialization(format!("解析{}响应失败: {}", context, e)))
    }

    // ===== 用户资料 =====

    /// 获取当前登录用户的资料
    pub async fn current_user(&self) -> Result<UserProfile> {
        let response = self
            .execute(self.client.get(self.url("/user")), "获取用户资料")
            .await?;
        Self::parse(response, "用户资料").await
    }

    /// 更新当前用户的资料
    pub async fn update_user(&self, profile: &UserProfile) -> Result<UserProfile> {
        let response = self
            .execute(
                self.client.put(self.url("/user")).json(profile),
                "更新用户资料",
            )
            .await?;
        Self::parse(response, "用户资料").await
    }

    // ===== 好友管理 =====

    /// 获取好友列表
    pub async fn friends(&self) -> Result<Vec<FriendEntry>> {
        let response = self
            .execute(self.client.get(self.url("/friends")), "获取好友列表")
            .await?;
        Self::parse(response, "好友列表").await
    }

    /// 发送好友请求
    pub async fn send_friend_request(&self, user_id: &str) -> Result<()> {
        self.execute(
            self.client
                .post(self.url("/friends/request"))
                .json(&serde_json::json!({ "userId": user_id })),
            "发送好友请求",
        )
        .await?;
        info!("📤 好友请求已发送: user_id={}", user_id);
        Ok(())
    }

    /// 接受好友请求
    pub async fn accept_friend_request(&self, user_id: &str) -> Result<()> {
        self.execute(
            self.client
                .post(self.url("/friends/accept"))
                .json(&serde_json::json!({ "userId": user_id })),
            "接受好友请求",
        )
        .await?;
        Ok(())
    }

    /// 删除好友
    pub async fn remove_friend(&self, user_id: &str) -> Result<()> {
        self.execute(
            self.client
                .delete(self.url(&format!("/friends/{}", user_id))),
            "删除好友",
        )
        .await?;
        Ok(())
    }

    // ===== 内容互动 =====

    /// 给发布内容添加表情回应
    pub async fn add_reaction(&self, publication_id: &str, emoji: &str) -> Result<()> {
        self.execute(
            self.client.post(self.url("/reactions/add")).json(&serde_json::json!({
                "publicationId": publication_id,
                "emoji": emoji,
            })),
            "添加表情回应",
        )
        .await?;
        Ok(())
    }

    /// 移除表情回应
    pub async fn remove_reaction(&self, publication_id: &str, emoji: &str) -> Result<()> {
        self.execute(
            self.client.post(self.url("/reactions/remove")).json(&serde_json::json!({
                "publicationId": publication_id,
                "emoji": emoji,
            })),
            "移除表情回应",
        )
        .await?;
        Ok(())
    }

    /// 举报内容
    pub async fn submit_report(&self, publication_id: &str, reason: &str) -> Result<()> {
        self.execute(
            self.client.post(self.url("/reports/create")).json(&serde_json::json!({
                "publicationId": publication_id,
                "reason": reason,
            })),
            "提交举报",
        )
        .await?;
        info!("📤 举报已提交: publication_id={}", publication_id);
        Ok(())
    }

    // ===== 媒体 =====

    /// 上传媒体文件（multipart）
    ///
    /// 服务端接收后异步转码，完成时通过 Socket 推送就绪事件。
    pub async fn create_media(
        &self,
        filename: String,
        mime_type: String,
        data: Vec<u8>,
    ) -> Result<MediaCreateResponse> {
        let file_size = data.len() as u64;
        info!("📤 开始上传媒体: {} ({} bytes)", filename, file_size);

        let part = multipart::Part::bytes(data)
            .file_name(filename)
            .mime_str(&mime_type)
            .map_err(|e| FeedlineSDKError::Other(format!("创建 multipart part 失败: {}", e)))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .execute(
                self.client.post(self.url("/media/create")).multipart(form),
                "上传媒体",
            )
            .await?;
        let result: MediaCreateResponse = Self::parse(response, "媒体创建").await?;

        info!("✅ 媒体上传成功: media_id={}", result.media_id);
        Ok(result)
    }

    // ===== 通知 =====

    /// 获取通知列表
    pub async fn notifications(&self) -> Result<Vec<NotificationEntry>> {
        let response = self
            .execute(self.client.get(self.url("/notifications")), "获取通知列表")
            .await?;
        Self::parse(response, "通知列表").await
    }

    /// 标记通知为已读
    pub async fn mark_notifications_read(&self, ids: &[String]) -> Result<()> {
        self.execute(
            self.client
                .post(self.url("/notifications/read"))
                .json(&serde_json::json!({ "ids": ids })),
            "标记通知已读",
        )
        .await?;
        Ok(())
    }

    // ===== 邮箱变更 =====

    /// 发起邮箱变更（向新邮箱发送验证码）
    pub async fn request_email_change(&self, new_email: &str) -> Result<()> {
        self.execute(
            self.client
                .post(self.url("/email/change"))
                .json(&serde_json::json!({ "email": new_email })),
            "发起邮箱变更",
        )
        .await?;
        Ok(())
    }

    /// 校验邮箱变更验证码
    pub async fn verify_email_change(&self, code: &str) -> Result<()> {
        self.execute(
            self.client
                .post(self.url("/email/verify"))
                .json(&serde_json::json!({ "code": code })),
            "校验邮箱验证码",
        )
        .await?;
        Ok(())
    }

    // ===== 自定义表情 =====

    /// 获取自定义表情列表
    pub async fn custom_reactions(&self) -> Result<Vec<CustomReactionEntry>> {
        let response = self
            .execute(
                self.client.get(self.url("/custom-reactions")),
                "获取自定义表情列表",
            )
            .await?;
        Self::parse(response, "自定义表情列表").await
    }

    /// 上传自定义表情（multipart）
    ///
    /// 服务端异步处理图片，完成时通过 Socket 推送就绪事件。
    pub async fn create_custom_reaction(
        &self,
        name: &str,
        filename: String,
        mime_type: String,
        data: Vec<u8>,
    ) -> Result<CustomReactionEntry> {
        let part = multipart::Part::bytes(data)
            .file_name(filename)
            .mime_str(&mime_type)
            .map_err(|e| FeedlineSDKError::Other(format!("创建 multipart part 失败: {}", e)))?;
        let form = multipart::Form::new()
            .text("name", name.to_string())
            .part("image", part);

        let response = self
            .execute(
                self.client
                    .post(self.url("/custom-reactions/create"))
                    .multipart(form),
                "上传自定义表情",
            )
            .await?;
        Self::parse(response, "自定义表情").await
    }

    /// 删除自定义表情
    pub async fn delete_custom_reaction(&self, id: &str) -> Result<()> {
        self.execute(
            self.client
                .delete(self.url(&format!("/custom-reactions/{}", id))),
            "删除自定义表情",
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let config = HttpClientConfig::default();
        let client = FeedlineApiClient::new(&config, "https://api.feedline.app/").unwrap();
        assert_eq!(client.url("/user"), "https://api.feedline.app/user");
    }

    #[tokio::test]
    async fn test_token_injection() {
        let config = HttpClientConfig::default();
        let client = FeedlineApiClient::new(&config, "https://api.feedline.app").unwrap();

        assert!(client.token.read().await.is_none());
        client.set_token(Some("bearer-abc".to_string())).await;
        assert_eq!(client.token.read().await.as_deref(), Some("bearer-abc"));
        client.set_token(None).await;
        assert!(client.token.read().await.is_none());
    }

    #[test]
    fn test_profile_deserialize_camel_case() {
        let json = r#"{"id":"u1","username":"ana","displayName":"Ana","avatarUrl":null}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Ana"));
        assert!(profile.email.is_none());
    }
}

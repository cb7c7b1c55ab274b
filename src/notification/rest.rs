//! 通知 REST 客户端
//!
//! 后端通知 API 的薄封装：列表 / 未读数 / 标记已读 / 删除 / token 注册 /
//! 主题订阅 / 管理端发送。每个请求都附带会话 token 头，
//! 401 与会话过期由外层统一处理，不在本模块职责内。

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::model::{Notification, NotificationDto, Priority};
use crate::config::ClientConfig;

/// API 基础路径
pub const API_BASE_PATH: &str = "/api/v1/notification";

/// 会话 token 请求头
pub const AUTH_HEADER: &str = "x-auth-token";

/// 请求超时（秒）
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// 注册 token 时的默认主题订阅
const DEFAULT_TOPICS: &[&str] = &["system"];

/// 一页通知（已归一化）
#[derive(Debug, Clone)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
}

/// 通知后端接口
///
/// store 只依赖这个 trait，测试用记录型 mock 替换真实 HTTP 实现。
#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn list(&self, page: u32, limit: u32, unread_only: bool) -> Result<NotificationPage>;
    async fn unread_count(&self) -> Result<u64>;
    async fn mark_read(&self, id: &str) -> Result<()>;
    async fn mark_all_read(&self) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn register_token(&self, request: &RegisterTokenRequest) -> Result<()>;
    async fn subscribe_topic(&self, topic: &str) -> Result<()>;
    async fn unsubscribe_topic(&self, topic: &str) -> Result<()>;
    async fn send(&self, request: &SendRequest) -> Result<()>;
}

/// 统一响应信封：`{ "success": true, "data": ... }`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "default_true")]
    success: bool,
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

fn default_true() -> bool {
    true
}

/// 列表响应的 data 部分
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListData {
    #[serde(default)]
    notifications: Vec<NotificationDto>,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default)]
    total_pages: u32,
    #[serde(default)]
    total: u64,
}

fn default_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct CountData {
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Serialize)]
struct TopicRequest<'a> {
    topic: &'a str,
}

/// 推送 token 注册请求
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTokenRequest {
    pub token: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub topics: Vec<String>,
}

impl RegisterTokenRequest {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            platform: "cli".to_string(),
            device_name: None,
            topics: DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// 设置设备名（链式调用）
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }
}

/// 管理端发送请求：显式接收者列表或广播，二选一
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub subject: String,
    pub message: String,
    pub topic: String,
    pub priority: Priority,
    pub channels: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<String>,
    pub broadcast: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl SendRequest {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
            topic: "custom".to_string(),
            priority: Priority::Normal,
            channels: vec!["in_app".to_string()],
            recipients: Vec::new(),
            broadcast: false,
            action_url: None,
            action_text: None,
            data: None,
        }
    }

    /// 设置主题（链式调用）
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// 设置优先级（链式调用）
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// 追加发送渠道（链式调用）
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        let channel = channel.into();
        if !self.channels.contains(&channel) {
            self.channels.push(channel);
        }
        self
    }

    /// 追加接收者（链式调用）
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipients.push(recipient.into());
        self
    }

    /// 广播给全员（链式调用）
    pub fn broadcast(mut self) -> Self {
        self.broadcast = true;
        self
    }

    /// 设置跳转动作（链式调用）
    pub fn with_action(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self.action_text = Some(text.into());
        self
    }

    /// 设置附加载荷（链式调用）
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// 发送前校验：主题正文必填，接收者与广播二选一
    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            bail!("subject is required");
        }
        if self.message.trim().is_empty() {
            bail!("message is required");
        }
        if !self.broadcast && self.recipients.is_empty() {
            bail!("either recipients or broadcast is required");
        }
        Ok(())
    }
}

/// reqwest 实现的通知后端客户端
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        if config.session_token.is_empty() {
            bail!("session token is required (set NOTIFY_CENTER_TOKEN or config.json)");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.session_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_BASE_PATH, path)
    }

    /// 解析带 data 的响应信封
    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("notification API returned {}: {}", status, body);
        }

        let envelope: Envelope<T> = response.json().await?;
        if !envelope.success {
            bail!(envelope.message.unwrap_or_else(|| "request rejected".to_string()));
        }
        envelope
            .data
            .ok_or_else(|| anyhow!("missing data in response"))
    }

    /// 只关心成功与否的响应（mark-read / delete 等）
    async fn parse_empty(response: Response) -> Result<()> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("notification API returned {}: {}", status, body);
        }

        let envelope: Envelope<serde_json::Value> = response.json().await?;
        if !envelope.success {
            bail!(envelope.message.unwrap_or_else(|| "request rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationApi for ApiClient {
    async fn list(&self, page: u32, limit: u32, unread_only: bool) -> Result<NotificationPage> {
        debug!(page, limit, unread_only, "fetching notification list");
        let response = self
            .client
            .get(self.url("/list"))
            .query(&[("page", page), ("limit", limit)])
            .query(&[("unreadOnly", unread_only)])
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;

        let data: ListData = Self::parse(response).await?;
        Ok(NotificationPage {
            items: data
                .notifications
                .into_iter()
                .map(NotificationDto::into_notification)
                .collect(),
            page: data.page,
            total_pages: data.total_pages,
            total: data.total,
        })
    }

    async fn unread_count(&self) -> Result<u64> {
        let response = self
            .client
            .get(self.url("/unread-count"))
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;
        let data: CountData = Self::parse(response).await?;
        Ok(data.count)
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .put(self.url(&format!("/{}/read", id)))
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;
        Self::parse_empty(response).await
    }

    async fn mark_all_read(&self) -> Result<()> {
        let response = self
            .client
            .put(self.url("/mark-all-read"))
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;
        Self::parse_empty(response).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/{}", id)))
            .header(AUTH_HEADER, &self.token)
            .send()
            .await?;
        Self::parse_empty(response).await
    }

    async fn register_token(&self, request: &RegisterTokenRequest) -> Result<()> {
        let response = self
            .client
            .post(self.url("/register-token"))
            .header(AUTH_HEADER, &self.token)
            .json(request)
            .send()
            .await?;
        Self::parse_empty(response).await
    }

    async fn subscribe_topic(&self, topic: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/subscribe-topic"))
            .header(AUTH_HEADER, &self.token)
            .json(&TopicRequest { topic })
            .send()
            .await?;
        Self::parse_empty(response).await
    }

    async fn unsubscribe_topic(&self, topic: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/unsubscribe-topic"))
            .header(AUTH_HEADER, &self.token)
            .json(&TopicRequest { topic })
            .send()
            .await?;
        Self::parse_empty(response).await
    }

    async fn send(&self, request: &SendRequest) -> Result<()> {
        request.validate()?;
        let response = self
            .client
            .post(self.url("/send"))
            .header(AUTH_HEADER, &self.token)
            .json(request)
            .send()
            .await?;
        Self::parse_empty(response).await
    }
}

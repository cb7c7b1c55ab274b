//! 推送传输适配层
//!
//! 把外部推送源封装成两个操作：请求权限并获取注册 token、
//! 等待下一条前台消息。等待原语是一次性的，每次 resolve 之后
//! 由调用方（[`crate::notification::listener`]）重新武装。
//!
//! 权限被拒绝或平台不支持时 resolve 为 `None`，永远不把错误抛给 UI；
//! 载荷字段缺失或损坏时取默认值降级，而不是拒绝整条消息。

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use super::model::{Notification, Priority};
use super::rest::AUTH_HEADER;
use crate::config::ClientConfig;

/// 缺失标题时的兜底主题
const FALLBACK_SUBJECT: &str = "New Notification";

/// 推送消息的展示部分
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushDisplay {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// 推送消息的数据部分（全部可缺省）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushData {
    #[serde(default)]
    pub notification_id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub action_url: Option<String>,
    #[serde(default)]
    pub action_text: Option<String>,
    /// JSON 字符串形式的附加载荷
    #[serde(default)]
    pub related_data: Option<String>,
}

/// 前台推送消息载荷，与上游投递的形态一致
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub notification: Option<PushDisplay>,
    #[serde(default)]
    pub data: Option<PushData>,
}

impl PushPayload {
    /// 转换成领域模型，缺失字段全部降级取默认值
    pub fn into_notification(self) -> Notification {
        let display = self.notification.unwrap_or_default();
        let data = self.data.unwrap_or_default();

        let id = data
            .notification_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Utc::now().timestamp_millis().to_string());
        let subject = data
            .subject
            .or(display.title)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| FALLBACK_SUBJECT.to_string());
        let message = data.message.or(display.body).unwrap_or_default();
        let topic = data
            .topic
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "system".to_string());
        let priority = data
            .priority
            .map(|p| Priority::parse(&p))
            .unwrap_or(Priority::Normal);
        let related = data
            .related_data
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        let mut n = Notification::new(id, subject, message)
            .with_topic(topic)
            .with_priority(priority);
        n.action_url = data.action_url;
        n.action_text = data.action_text;
        n.data = related;
        n
    }
}

/// 推送传输接口
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// 请求权限并获取注册 token；拒绝或不支持时返回 `None`。
    /// 多次调用必须是安全的。
    async fn request_permission_and_token(&self) -> Option<String>;

    /// 等待下一条前台消息，每次调用只 resolve 一次
    async fn await_next_foreground_message(&self) -> Result<PushPayload>;
}

/// 基于 HTTP 长轮询的推送传输实现
pub struct LongPollTransport {
    client: Client,
    base_url: String,
    token: String,
    wait_secs: u64,
    device_token_path: PathBuf,
}

impl LongPollTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        if config.session_token.is_empty() {
            bail!("session token is required for push transport");
        }

        // 客户端超时要比服务端长轮询窗口略长
        let client = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 15))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.session_token.clone(),
            wait_secs: config.poll_timeout_secs,
            device_token_path: ClientConfig::config_dir().join("device-token"),
        })
    }

    /// 读取或生成持久化的设备 token
    fn load_or_create_device_token(&self) -> Result<String> {
        if let Ok(existing) = fs::read_to_string(&self.device_token_path) {
            let existing = existing.trim();
            if !existing.is_empty() {
                return Ok(existing.to_string());
            }
        }

        let token = format!(
            "ncen-{}-{:x}",
            std::process::id(),
            Utc::now().timestamp_millis()
        );
        if let Some(parent) = self.device_token_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.device_token_path, &token)?;
        debug!(path = %self.device_token_path.display(), "device token created");
        Ok(token)
    }
}

#[async_trait]
impl PushTransport for LongPollTransport {
    async fn request_permission_and_token(&self) -> Option<String> {
        match self.load_or_create_device_token() {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(error = %e, "device token unavailable, push disabled");
                None
            }
        }
    }

    async fn await_next_foreground_message(&self) -> Result<PushPayload> {
        loop {
            let response = self
                .client
                .get(format!("{}{}", self.base_url, "/api/v1/notification/poll"))
                .query(&[("waitSecs", self.wait_secs)])
                .header(AUTH_HEADER, &self.token)
                .send()
                .await?;

            // 204 表示本轮窗口内没有消息，直接重新武装
            if response.status() == StatusCode::NO_CONTENT {
                continue;
            }
            if !response.status().is_success() {
                bail!("push poll returned {}", response.status());
            }

            return Ok(response.json::<PushPayload>().await?);
        }
    }
}

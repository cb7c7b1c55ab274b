//! 通知数据模型
//!
//! 服务端的通知记录有两套并存的已读状态表示：顶层 `read` 布尔值，
//! 以及广播类通知的 `recipients[0].read`。两者在入口处
//! （[`NotificationDto::into_notification`]）归一化为单一布尔值，
//! 此后所有读取方只看 [`Notification::read`]。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 通知优先级（仅影响 UI 强调程度，不参与业务分支）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// 解析服务端/推送里的优先级字符串，未知值回退到 `Normal`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            "urgent" => Priority::Urgent,
            _ => Priority::Normal,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 广播通知的单个接收者状态（线上数据形态）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipientState {
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

/// 通知的线上（wire）形态，按服务端返回的字段原样反序列化
///
/// 与领域模型 [`Notification`] 的区别：保留两套已读状态字段。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// 直达通知的已读标记
    #[serde(default)]
    pub read: bool,
    /// 广播通知的按接收者已读状态
    #[serde(default)]
    pub recipients: Vec<RecipientState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_text: Option<String>,
    /// 任意附加载荷（如 ticketId），用于跳转路由
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

fn default_topic() -> String {
    "system".to_string()
}

impl NotificationDto {
    /// 归一化为领域模型：两套已读表示在此处合并，之后不再重复判断
    pub fn into_notification(self) -> Notification {
        let recipient = self.recipients.first();
        let read = self.read || recipient.map(|r| r.read).unwrap_or(false);
        let read_at = recipient.and_then(|r| r.read_at);
        Notification {
            id: self.id,
            subject: self.subject,
            message: self.message,
            topic: self.topic,
            priority: self.priority,
            created_at: self.created_at,
            read,
            read_at,
            action_url: self.action_url,
            action_text: self.action_text,
            data: self.data,
        }
    }
}

/// 通知领域模型（已读状态已归一化）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// 服务端分配的唯一标识，集合内的唯一去重键
    pub id: String,
    pub subject: String,
    pub message: String,
    /// 开放字符串集合，服务端可能引入新主题
    pub topic: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Notification {
    /// 创建一条未读通知（topic 默认 system，优先级默认 normal）
    pub fn new(id: impl Into<String>, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            message: message.into(),
            topic: "system".to_string(),
            priority: Priority::Normal,
            created_at: Utc::now(),
            read: false,
            read_at: None,
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

    /// 设置已读状态（链式调用）
    pub fn with_read(mut self, read: bool) -> Self {
        self.read = read;
        self.read_at = if read { Some(Utc::now()) } else { None };
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

    /// 未读判定：归一化之后只需要看单一标记
    pub fn is_unread(&self) -> bool {
        !self.read
    }
}

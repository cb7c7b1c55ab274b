//! CLI 参数与输出

pub mod output;

use anyhow::{Context, Result};
use clap::Args;
use dialoguer::{Confirm, Input};

use crate::notification::{Priority, SendRequest};

/// 管理端发送通知的参数；缺省字段交互式补全
#[derive(Debug, Args)]
pub struct SendArgs {
    /// 通知标题
    #[arg(long, short)]
    pub subject: Option<String>,
    /// 通知正文
    #[arg(long, short)]
    pub message: Option<String>,
    /// 主题（如 order_created / payment_failed / custom）
    #[arg(long, default_value = "custom")]
    pub topic: String,
    /// 优先级: low | normal | high | urgent
    #[arg(long, default_value = "normal")]
    pub priority: String,
    /// 发送渠道（可重复）
    #[arg(long = "channel")]
    pub channels: Vec<String>,
    /// 接收者用户 ID（可重复）
    #[arg(long = "recipient")]
    pub recipients: Vec<String>,
    /// 广播给全员
    #[arg(long)]
    pub broadcast: bool,
    /// 跳转链接
    #[arg(long)]
    pub action_url: Option<String>,
    /// 跳转按钮文案
    #[arg(long)]
    pub action_text: Option<String>,
    /// 附加 JSON 载荷
    #[arg(long)]
    pub data: Option<String>,
}

impl SendArgs {
    /// 组装发送请求，缺失的必填字段用交互式输入补全
    pub fn into_request(self) -> Result<SendRequest> {
        let subject = match self.subject {
            Some(subject) => subject,
            None => Input::<String>::new()
                .with_prompt("通知标题")
                .interact_text()?,
        };
        let message = match self.message {
            Some(message) => message,
            None => Input::<String>::new()
                .with_prompt("通知正文")
                .interact_text()?,
        };

        let mut request = SendRequest::new(subject, message)
            .with_topic(self.topic)
            .with_priority(Priority::parse(&self.priority));
        for channel in self.channels {
            request = request.with_channel(channel);
        }
        for recipient in self.recipients {
            request = request.with_recipient(recipient);
        }

        let broadcast = if self.broadcast {
            true
        } else if request.recipients.is_empty() {
            Confirm::new()
                .with_prompt("没有指定接收者，广播给全员?")
                .default(false)
                .interact()?
        } else {
            false
        };
        if broadcast {
            request = request.broadcast();
        }

        if let Some(ref url) = self.action_url {
            request = request.with_action(
                url.clone(),
                self.action_text.clone().unwrap_or_else(|| "查看".to_string()),
            );
        }
        if let Some(raw) = self.data {
            let data = serde_json::from_str(&raw).context("invalid --data JSON")?;
            request = request.with_data(data);
        }

        request.validate()?;
        Ok(request)
    }
}

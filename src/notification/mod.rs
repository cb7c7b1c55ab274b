//! 通知子系统 - store、REST 客户端、推送传输与监听循环
//!
//! # 结构
//! 1. 单一数据源：[`store::NotificationStore`] 是进程内唯一的通知状态持有者
//! 2. 三路输入：分页拉取（[`rest`]）、推送投递（[`push`] + [`listener`]）、
//!    服务端未读数轮询，全部汇入 store 并按 `id` 去重
//! 3. UI 只订阅快照、回派意图，从不直接调 REST
//!
//! # 使用示例
//! ```ignore
//! use notify_center::{ApiClient, ClientConfig, NotificationStore};
//!
//! let config = ClientConfig::auto_load()?;
//! let api = std::sync::Arc::new(ApiClient::new(&config)?);
//! let store = NotificationStore::new(api, config.page_size);
//! store.refresh().await?;
//! ```

pub mod listener;
pub mod model;
pub mod push;
pub mod rest;
pub mod store;
pub mod topic;

pub use listener::{spawn_push_loop, PushLoopConfig};
pub use model::{Notification, NotificationDto, Priority, RecipientState};
pub use push::{LongPollTransport, PushData, PushDisplay, PushPayload, PushTransport};
pub use rest::{ApiClient, NotificationApi, NotificationPage, RegisterTokenRequest, SendRequest};
pub use store::{NotificationStore, StoreSnapshot, SubscriptionId};
pub use topic::{topic_style, TopicStyle};

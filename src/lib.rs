//! Notify Center - 运营后台通知中心客户端
//!
//! 进程级通知 store 把分页拉取、轮询与推送投递合并成单一数据源，
//! 铃铛 / 面板 / 全量列表作为订阅方共享同一份状态。

pub mod cli;
pub mod config;
pub mod notification;
pub mod tui;

pub use config::ClientConfig;
pub use notification::{
    spawn_push_loop, ApiClient, LongPollTransport, Notification, NotificationApi,
    NotificationDto, NotificationPage, NotificationStore, Priority, PushLoopConfig, PushPayload,
    PushTransport, RegisterTokenRequest, SendRequest, StoreSnapshot, SubscriptionId,
};
pub use notification::topic::{topic_style, TopicStyle};

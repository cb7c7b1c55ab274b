//! 推送监听循环
//!
//! 传输层的「等待下一条消息」每次调用只 resolve 一次，这里把它
//! 包装成受监督的常驻任务：每次 resolve / 失败后重新武装，
//! 失败时按指数退避重试，每轮都检查取消令牌。
//! 每次等待都包一层超时，传输层卡死时重新武装而不是无限挂起。

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::push::PushTransport;
use super::store::NotificationStore;

/// 监听循环配置
#[derive(Debug, Clone)]
pub struct PushLoopConfig {
    /// 单次等待消息的超时，到期后直接重新武装
    pub await_timeout: Duration,
    /// 传输层出错后的初始退避
    pub initial_backoff: Duration,
    /// 退避上限
    pub max_backoff: Duration,
}

impl Default for PushLoopConfig {
    fn default() -> Self {
        Self {
            await_timeout: Duration::from_secs(75),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl PushLoopConfig {
    /// 设置等待超时（链式调用）
    pub fn with_await_timeout(mut self, await_timeout: Duration) -> Self {
        self.await_timeout = await_timeout;
        self
    }
}

/// 启动推送监听循环
///
/// 返回任务句柄；取消通过 `cancel` 令牌完成，owning UI 卸载时必须取消，
/// 避免泄漏的任务继续向 store 写入。
pub fn spawn_push_loop(
    store: Arc<NotificationStore>,
    transport: Arc<dyn PushTransport>,
    config: PushLoopConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut backoff = config.initial_backoff;
        loop {
            if cancel.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                awaited = timeout(config.await_timeout, transport.await_next_foreground_message()) => {
                    match awaited {
                        Ok(Ok(payload)) => {
                            backoff = config.initial_backoff;
                            store.add_pushed_notification(payload.into_notification());
                        }
                        Ok(Err(e)) => {
                            warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "push transport error, retrying");
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                _ = sleep(backoff) => {}
                            }
                            backoff = (backoff * 2).min(config.max_backoff);
                        }
                        Err(_) => {
                            debug!("push await timed out, re-arming");
                        }
                    }
                }
            }
        }
        debug!("push loop stopped");
    })
}

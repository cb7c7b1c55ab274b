//! 推送监听循环集成测试

use anyhow::Result;
use async_trait::async_trait;
use notify_center::{
    spawn_push_loop, NotificationApi, NotificationPage, NotificationStore, PushLoopConfig,
    PushPayload, PushTransport, RegisterTokenRequest, SendRequest,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

struct NoopApi;

#[async_trait]
impl NotificationApi for NoopApi {
    async fn list(&self, _: u32, _: u32, _: bool) -> Result<NotificationPage> {
        Ok(NotificationPage { items: Vec::new(), page: 1, total_pages: 1, total: 0 })
    }
    async fn unread_count(&self) -> Result<u64> {
        Ok(0)
    }
    async fn mark_read(&self, _: &str) -> Result<()> {
        Ok(())
    }
    async fn mark_all_read(&self) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &str) -> Result<()> {
        Ok(())
    }
    async fn register_token(&self, _: &RegisterTokenRequest) -> Result<()> {
        Ok(())
    }
    async fn subscribe_topic(&self, _: &str) -> Result<()> {
        Ok(())
    }
    async fn unsubscribe_topic(&self, _: &str) -> Result<()> {
        Ok(())
    }
    async fn send(&self, _: &SendRequest) -> Result<()> {
        Ok(())
    }
}

/// 脚本可以是消息或一次失败；耗尽后永远挂起
enum Step {
    Deliver(PushPayload),
    Fail,
}

struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    arm_count: AtomicUsize,
}

impl ScriptedTransport {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            arm_count: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn request_permission_and_token(&self) -> Option<String> {
        Some("test-token".to_string())
    }

    async fn await_next_foreground_message(&self) -> Result<PushPayload> {
        self.arm_count.fetch_add(1, Ordering::SeqCst);
        let next = self.steps.lock().unwrap().pop_front();
        match next {
            Some(Step::Deliver(payload)) => Ok(payload),
            Some(Step::Fail) => anyhow::bail!("transport hiccup"),
            None => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

fn payload(id: &str, subject: &str) -> PushPayload {
    serde_json::from_value(serde_json::json!({
        "notification": { "title": subject, "body": "body" },
        "data": { "notificationId": id, "subject": subject }
    }))
    .unwrap()
}

async fn wait_for_len(store: &NotificationStore, len: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if store.snapshot().notifications.len() == len {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "store never reached {} notifications (has {})",
                len,
                store.snapshot().notifications.len()
            );
        }
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_loop_rearms_after_each_message() {
    let store = NotificationStore::new(Arc::new(NoopApi), 20);
    let transport = ScriptedTransport::new(vec![
        Step::Deliver(payload("n1", "第一条")),
        Step::Deliver(payload("n2", "第二条")),
    ]);
    let cancel = CancellationToken::new();

    let handle = spawn_push_loop(
        store.clone(),
        transport.clone(),
        PushLoopConfig::default(),
        cancel.clone(),
    );

    wait_for_len(&store, 2).await;

    let snapshot = store.snapshot();
    // 新消息前插：n2 在 n1 之前
    assert_eq!(snapshot.notifications[0].id, "n2");
    assert_eq!(snapshot.notifications[1].id, "n1");
    assert_eq!(snapshot.unread_count, 2);
    // 两条消息消费后还会再武装一次等待下一条
    assert!(transport.arm_count.load(Ordering::SeqCst) >= 3);

    cancel.cancel();
    let _ = timeout(Duration::from_secs(1), handle).await;
}

#[tokio::test]
async fn test_loop_survives_transport_failure() {
    let store = NotificationStore::new(Arc::new(NoopApi), 20);
    // 第一次失败，退避后继续收到消息
    let transport = ScriptedTransport::new(vec![
        Step::Fail,
        Step::Deliver(payload("n1", "失败后恢复")),
    ]);
    let cancel = CancellationToken::new();

    let handle = spawn_push_loop(
        store.clone(),
        transport,
        PushLoopConfig::default(),
        cancel.clone(),
    );

    wait_for_len(&store, 1).await;
    assert_eq!(store.snapshot().notifications[0].id, "n1");

    cancel.cancel();
    let _ = timeout(Duration::from_secs(1), handle).await;
}

#[tokio::test]
async fn test_cancel_during_idle_wait_stops_promptly() {
    let store = NotificationStore::new(Arc::new(NoopApi), 20);
    let transport = ScriptedTransport::new(Vec::new());
    let cancel = CancellationToken::new();

    let handle = spawn_push_loop(
        store.clone(),
        transport,
        PushLoopConfig::default(),
        cancel.clone(),
    );

    // 给循环一点时间进入等待
    sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let joined = timeout(Duration::from_secs(1), handle).await;
    assert!(joined.is_ok(), "cancelled loop should join promptly");
    assert!(store.snapshot().notifications.is_empty());
}

#[tokio::test]
async fn test_duplicate_push_across_restart_is_deduped() {
    let store = NotificationStore::new(Arc::new(NoopApi), 20);
    let transport = ScriptedTransport::new(vec![
        Step::Deliver(payload("n1", "一")),
        Step::Deliver(payload("n1", "一")),
        Step::Deliver(payload("n2", "二")),
    ]);
    let cancel = CancellationToken::new();

    let handle = spawn_push_loop(
        store.clone(),
        transport,
        PushLoopConfig::default(),
        cancel.clone(),
    );

    wait_for_len(&store, 2).await;
    assert_eq!(store.snapshot().unread_count, 2);

    cancel.cancel();
    let _ = timeout(Duration::from_secs(1), handle).await;
}

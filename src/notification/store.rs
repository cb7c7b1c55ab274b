//! 通知 store - 进程级单一数据源
//!
//! 把三路异步生产者（分页拉取、轮询、推送投递）合并成一份一致的状态，
//! 供铃铛、面板、全量列表多个订阅方共享。合并时唯一的去重键是通知 `id`：
//! 没有这条去重，同一条通知就会在 unread_count 上重复计数或渲染两次。
//!
//! 乐观变更（标记已读 / 全部已读 / 删除）先同步改本地状态并通知订阅方，
//! 再发 REST 请求；请求失败时回滚本地改动并记录告警，不做静默漂移。

use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use super::model::Notification;
use super::push::PushTransport;
use super::rest::{NotificationApi, RegisterTokenRequest};

/// 订阅方回调
pub type Listener = Box<dyn Fn(&StoreSnapshot) + Send + Sync>;

/// 订阅标识，用于退订
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// 每次状态变更后发布的不可变快照
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    /// 按 created_at 新在前的展示顺序
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
    pub loading: bool,
    pub page: u32,
    pub has_more: bool,
    pub push_token: Option<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    notifications: Vec<Notification>,
    unread_count: u64,
    loading: bool,
    page: u32,
    has_more: bool,
    push_token: Option<String>,
}

impl StoreState {
    fn contains(&self, id: &str) -> bool {
        self.notifications.iter().any(|n| n.id == id)
    }

    /// 从集合重算未读数（拉取合并后使用；服务端真值由 fetch_unread_count 覆盖）
    fn recount_unread(&mut self) {
        self.unread_count = self.notifications.iter().filter(|n| n.is_unread()).count() as u64;
    }
}

/// 通知 store
///
/// `Arc` 共享，应用启动时创建一次，组件只通过操作集合修改状态，
/// 不直接写字段。所有变更在同一次调用内同步通知全部订阅方。
pub struct NotificationStore {
    api: Arc<dyn NotificationApi>,
    page_size: u32,
    state: Mutex<StoreState>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
}

impl NotificationStore {
    pub fn new(api: Arc<dyn NotificationApi>, page_size: u32) -> Arc<Self> {
        Arc::new(Self {
            api,
            page_size,
            state: Mutex::new(StoreState::default()),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        })
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 当前状态快照
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state();
        StoreSnapshot {
            notifications: state.notifications.clone(),
            unread_count: state.unread_count,
            loading: state.loading,
            page: state.page,
            has_more: state.has_more,
            push_token: state.push_token.clone(),
        }
    }

    /// 注册订阅方，每次状态变更后同步回调
    ///
    /// 回调内不可反过来调用 store 的变更操作（会在监听器锁上自锁），
    /// 典型用法是把快照转发进 channel。
    pub fn subscribe(
        &self,
        listener: impl Fn(&StoreSnapshot) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners().push((id, Box::new(listener)));
        id
    }

    /// 退订
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners().retain(|(existing, _)| *existing != id);
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        for (_, listener) in self.listeners().iter() {
            listener(&snapshot);
        }
    }

    /// 拉取一页通知
    ///
    /// `append = false` 时整体替换集合，`append = true` 时按 `id` 去重后
    /// 追加到尾部（已有条目保持在前）。失败只记日志，已有数据保持可见。
    pub async fn fetch_page(&self, page: u32, append: bool) -> Result<()> {
        {
            self.state().loading = true;
        }
        self.publish();

        match self.api.list(page, self.page_size, false).await {
            Ok(fetched) => {
                {
                    let mut state = self.state();
                    if append {
                        let existing: HashSet<String> =
                            state.notifications.iter().map(|n| n.id.clone()).collect();
                        for n in fetched.items {
                            if existing.contains(&n.id) {
                                debug!(id = %n.id, "duplicate entry in fetched page, skipped");
                            } else {
                                state.notifications.push(n);
                            }
                        }
                    } else {
                        state.notifications = fetched.items;
                    }
                    state.page = fetched.page;
                    state.has_more = fetched.page < fetched.total_pages;
                    state.recount_unread();
                    state.loading = false;
                }
                self.publish();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, page, "notification list fetch failed, keeping prior state");
                {
                    self.state().loading = false;
                }
                self.publish();
                Err(e)
            }
        }
    }

    /// 加载下一页；加载中或没有更多页时是 no-op（不发任何请求）
    pub async fn load_more(&self) -> Result<()> {
        let next_page = {
            let state = self.state();
            if state.loading || !state.has_more {
                return Ok(());
            }
            state.page + 1
        };
        self.fetch_page(next_page, true).await
    }

    /// 从服务端拉取未读数并直接覆盖本地值
    ///
    /// 这是未读数被服务端真值「设置」的唯一路径，其余操作只做本地增减。
    pub async fn fetch_unread_count(&self) -> Result<()> {
        match self.api.unread_count().await {
            Ok(count) => {
                {
                    self.state().unread_count = count;
                }
                self.publish();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "unread count fetch failed");
                Err(e)
            }
        }
    }

    /// 首屏加载：第一页 + 服务端未读数
    pub async fn refresh(&self) -> Result<()> {
        self.fetch_page(1, false).await?;
        self.fetch_unread_count().await
    }

    /// 标记单条已读（乐观更新，失败回滚）
    pub async fn mark_as_read(&self, id: &str) -> Result<()> {
        let was_unread = {
            let mut state = self.state();
            match state.notifications.iter_mut().find(|n| n.id == id) {
                Some(n) if n.is_unread() => {
                    n.read = true;
                    n.read_at = Some(Utc::now());
                    state.unread_count = state.unread_count.saturating_sub(1);
                    true
                }
                _ => false,
            }
        };
        if was_unread {
            self.publish();
        }

        match self.api.mark_read(id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, id, "mark-read failed, rolling back");
                if was_unread {
                    {
                        let mut state = self.state();
                        if let Some(n) = state.notifications.iter_mut().find(|n| n.id == id) {
                            n.read = false;
                            n.read_at = None;
                            state.unread_count += 1;
                        }
                    }
                    self.publish();
                }
                Err(e)
            }
        }
    }

    /// 全部标记已读（乐观更新，失败回滚）；重复调用是幂等的
    pub async fn mark_all_as_read(&self) -> Result<()> {
        let flipped: Vec<String> = {
            let mut state = self.state();
            let now = Utc::now();
            let mut flipped = Vec::new();
            for n in state.notifications.iter_mut() {
                if n.is_unread() {
                    n.read = true;
                    n.read_at = Some(now);
                    flipped.push(n.id.clone());
                }
            }
            state.unread_count = 0;
            flipped
        };
        self.publish();

        match self.api.mark_all_read().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, count = flipped.len(), "mark-all-read failed, rolling back");
                {
                    let mut state = self.state();
                    for id in &flipped {
                        if let Some(n) = state.notifications.iter_mut().find(|n| &n.id == id) {
                            n.read = false;
                            n.read_at = None;
                        }
                    }
                    state.recount_unread();
                }
                self.publish();
                Err(e)
            }
        }
    }

    /// 删除单条通知（乐观移除，失败回滚到原位置）
    pub async fn delete_notification(&self, id: &str) -> Result<()> {
        let removed: Option<(usize, Notification)> = {
            let mut state = self.state();
            match state.notifications.iter().position(|n| n.id == id) {
                Some(index) => {
                    let n = state.notifications.remove(index);
                    if n.is_unread() {
                        state.unread_count = state.unread_count.saturating_sub(1);
                    }
                    Some((index, n))
                }
                None => None,
            }
        };
        if removed.is_some() {
            self.publish();
        }

        match self.api.delete(id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, id, "delete failed, restoring entry");
                if let Some((index, n)) = removed {
                    {
                        let mut state = self.state();
                        if !state.contains(&n.id) {
                            let index = index.min(state.notifications.len());
                            if n.is_unread() {
                                state.unread_count += 1;
                            }
                            state.notifications.insert(index, n);
                        }
                    }
                    self.publish();
                }
                Err(e)
            }
        }
    }

    /// 插入一条推送投递的通知
    ///
    /// 推送可能与拉取结果竞争或重复投递，按 `id` 去重：已存在则忽略，
    /// 新条目前插（新在前），未读数恰好 +1。
    pub fn add_pushed_notification(&self, notification: Notification) {
        {
            let mut state = self.state();
            if state.contains(&notification.id) {
                debug!(id = %notification.id, "pushed notification already present, ignored");
                return;
            }
            if notification.is_unread() {
                state.unread_count += 1;
            }
            state.notifications.insert(0, notification);
        }
        self.publish();
    }

    /// 请求推送权限、注册 token 并记录到状态
    ///
    /// 权限被拒绝或平台不支持时返回 `Ok(None)`，通知功能降级为纯轮询。
    pub async fn register_push_token(
        &self,
        transport: &dyn PushTransport,
    ) -> Result<Option<String>> {
        let Some(token) = transport.request_permission_and_token().await else {
            debug!("push permission unavailable, skipping token registration");
            return Ok(None);
        };

        let request = RegisterTokenRequest::new(&token);
        self.api.register_token(&request).await?;

        {
            self.state().push_token = Some(token.clone());
        }
        self.publish();
        Ok(Some(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::model::Priority;
    use crate::notification::rest::{NotificationPage, SendRequest};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;

    /// 记录型 mock 后端
    struct MockApi {
        calls: Mutex<Vec<String>>,
        pages: Mutex<Vec<NotificationPage>>,
        count: AtomicU64,
        fail_mutations: AtomicBool,
    }

    impl MockApi {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                pages: Mutex::new(Vec::new()),
                count: AtomicU64::new(0),
                fail_mutations: AtomicBool::new(false),
            })
        }

        fn push_page(&self, page: NotificationPage) {
            self.pages.lock().unwrap().push(page);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn mutation_result(&self) -> Result<()> {
            if self.fail_mutations.load(Ordering::SeqCst) {
                Err(anyhow::anyhow!("simulated backend failure"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl NotificationApi for MockApi {
        async fn list(&self, page: u32, limit: u32, unread_only: bool) -> Result<NotificationPage> {
            self.record(format!("list:{}:{}:{}", page, limit, unread_only));
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                Err(anyhow::anyhow!("no page scripted"))
            } else {
                Ok(pages.remove(0))
            }
        }

        async fn unread_count(&self) -> Result<u64> {
            self.record("unread_count");
            Ok(self.count.load(Ordering::SeqCst))
        }

        async fn mark_read(&self, id: &str) -> Result<()> {
            self.record(format!("mark_read:{}", id));
            self.mutation_result()
        }

        async fn mark_all_read(&self) -> Result<()> {
            self.record("mark_all_read");
            self.mutation_result()
        }

        async fn delete(&self, id: &str) -> Result<()> {
            self.record(format!("delete:{}", id));
            self.mutation_result()
        }

        async fn register_token(&self, request: &RegisterTokenRequest) -> Result<()> {
            self.record(format!("register_token:{}", request.token));
            Ok(())
        }

        async fn subscribe_topic(&self, topic: &str) -> Result<()> {
            self.record(format!("subscribe:{}", topic));
            Ok(())
        }

        async fn unsubscribe_topic(&self, topic: &str) -> Result<()> {
            self.record(format!("unsubscribe:{}", topic));
            Ok(())
        }

        async fn send(&self, _request: &SendRequest) -> Result<()> {
            self.record("send");
            Ok(())
        }
    }

    fn page_of(ids: &[&str], page: u32, total_pages: u32) -> NotificationPage {
        NotificationPage {
            items: ids
                .iter()
                .map(|id| Notification::new(*id, format!("subject-{}", id), "message"))
                .collect(),
            page,
            total_pages,
            total: (ids.len() as u64) * (total_pages as u64),
        }
    }

    #[tokio::test]
    async fn test_fetch_replace_then_append_dedup() {
        let api = MockApi::new();
        api.push_page(page_of(&["a", "b"], 1, 2));
        // 第二页里 "b" 与已有条目重叠，必须被去重
        api.push_page(page_of(&["b", "c"], 2, 2));
        let store = NotificationStore::new(api.clone(), 20);

        store.fetch_page(1, false).await.unwrap();
        store.load_more().await.unwrap();

        let snapshot = store.snapshot();
        let ids: Vec<&str> = snapshot.notifications.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(snapshot.unread_count, 3);
        assert!(!snapshot.has_more);
        assert_eq!(snapshot.page, 2);
    }

    #[tokio::test]
    async fn test_load_more_is_noop_without_more_pages() {
        let api = MockApi::new();
        api.push_page(page_of(&["a"], 1, 1));
        let store = NotificationStore::new(api.clone(), 20);

        store.fetch_page(1, false).await.unwrap();
        assert!(!store.snapshot().has_more);

        store.load_more().await.unwrap();

        // 只应有最初那一次 list 调用
        let list_calls = api.calls().iter().filter(|c| c.starts_with("list:")).count();
        assert_eq!(list_calls, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_prior_state() {
        let api = MockApi::new();
        api.push_page(page_of(&["a"], 1, 1));
        let store = NotificationStore::new(api.clone(), 20);
        store.fetch_page(1, false).await.unwrap();

        // 没有下一页脚本，list 会失败
        let result = store.fetch_page(2, true).await;
        assert!(result.is_err());

        let snapshot = store.snapshot();
        assert_eq!(snapshot.notifications.len(), 1);
        assert!(!snapshot.loading);
    }

    #[tokio::test]
    async fn test_mark_as_read_optimistic_and_rest_call() {
        let api = MockApi::new();
        api.push_page(page_of(&["a"], 1, 1));
        let store = NotificationStore::new(api.clone(), 20);
        store.fetch_page(1, false).await.unwrap();
        assert_eq!(store.snapshot().unread_count, 1);

        store.mark_as_read("a").await.unwrap();

        let snapshot = store.snapshot();
        assert!(snapshot.notifications[0].read);
        assert_eq!(snapshot.unread_count, 0);
        assert!(api.calls().contains(&"mark_read:a".to_string()));
    }

    #[tokio::test]
    async fn test_mark_as_read_rolls_back_on_failure() {
        let api = MockApi::new();
        api.push_page(page_of(&["a"], 1, 1));
        let store = NotificationStore::new(api.clone(), 20);
        store.fetch_page(1, false).await.unwrap();

        api.fail_mutations.store(true, Ordering::SeqCst);
        let result = store.mark_as_read("a").await;
        assert!(result.is_err());

        let snapshot = store.snapshot();
        assert!(snapshot.notifications[0].is_unread());
        assert_eq!(snapshot.unread_count, 1);
    }

    #[tokio::test]
    async fn test_mark_all_as_read_idempotent() {
        let api = MockApi::new();
        api.push_page(page_of(&["a", "b", "c"], 1, 1));
        let store = NotificationStore::new(api.clone(), 20);
        store.fetch_page(1, false).await.unwrap();

        store.mark_all_as_read().await.unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.unread_count, 0);
        assert!(snapshot.notifications.iter().all(|n| n.read));

        // 第二次调用结果不变
        store.mark_all_as_read().await.unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.unread_count, 0);
        assert!(snapshot.notifications.iter().all(|n| n.read));
    }

    #[tokio::test]
    async fn test_delete_restores_position_on_failure() {
        let api = MockApi::new();
        api.push_page(page_of(&["a", "b", "c"], 1, 1));
        let store = NotificationStore::new(api.clone(), 20);
        store.fetch_page(1, false).await.unwrap();

        api.fail_mutations.store(true, Ordering::SeqCst);
        assert!(store.delete_notification("b").await.is_err());

        let snapshot = store.snapshot();
        let ids: Vec<&str> = snapshot.notifications.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(snapshot.unread_count, 3);
    }

    #[tokio::test]
    async fn test_pushed_notification_prepends_and_counts_once() {
        let api = MockApi::new();
        api.push_page(page_of(&["a"], 1, 1));
        let store = NotificationStore::new(api.clone(), 20);
        store.fetch_page(1, false).await.unwrap();

        store.add_pushed_notification(Notification::new("b", "s", "m"));

        let snapshot = store.snapshot();
        let ids: Vec<&str> = snapshot.notifications.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(snapshot.unread_count, 2);

        // 重复 id 的推送不改变集合和未读数
        store.add_pushed_notification(Notification::new("b", "s", "m"));
        let snapshot = store.snapshot();
        assert_eq!(snapshot.notifications.len(), 2);
        assert_eq!(snapshot.unread_count, 2);
    }

    #[tokio::test]
    async fn test_unread_count_matches_collection_after_mixed_ops() {
        let api = MockApi::new();
        api.push_page(page_of(&["a", "b"], 1, 1));
        let store = NotificationStore::new(api.clone(), 20);
        store.fetch_page(1, false).await.unwrap();

        store.add_pushed_notification(Notification::new("c", "s", "m"));
        store.mark_as_read("a").await.unwrap();
        store.delete_notification("b").await.unwrap();
        store.add_pushed_notification(Notification::new("d", "s", "m").with_priority(Priority::High));

        let snapshot = store.snapshot();
        let derived = snapshot.notifications.iter().filter(|n| n.is_unread()).count() as u64;
        assert_eq!(snapshot.unread_count, derived);
        assert_eq!(snapshot.unread_count, 2); // c 和 d
    }

    #[tokio::test]
    async fn test_fetch_unread_count_sets_server_truth() {
        let api = MockApi::new();
        api.count.store(57, Ordering::SeqCst);
        let store = NotificationStore::new(api.clone(), 20);

        store.fetch_unread_count().await.unwrap();
        assert_eq!(store.snapshot().unread_count, 57);
    }

    #[tokio::test]
    async fn test_subscribers_see_every_mutation_synchronously() {
        let api = MockApi::new();
        let store = NotificationStore::new(api.clone(), 20);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let subscription = store.subscribe(move |snapshot| {
            seen_clone.lock().unwrap().push(snapshot.unread_count);
        });

        store.add_pushed_notification(Notification::new("a", "s", "m"));
        store.add_pushed_notification(Notification::new("b", "s", "m"));
        assert_eq!(seen.lock().unwrap().clone(), vec![1, 2]);

        store.unsubscribe(subscription);
        store.add_pushed_notification(Notification::new("c", "s", "m"));
        // 退订后不再收到回调
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_two_subscribers_observe_same_state() {
        let api = MockApi::new();
        let store = NotificationStore::new(api.clone(), 20);

        let bell = Arc::new(Mutex::new(0u64));
        let panel = Arc::new(Mutex::new(0u64));
        let bell_clone = bell.clone();
        let panel_clone = panel.clone();
        store.subscribe(move |s| *bell_clone.lock().unwrap() = s.unread_count);
        store.subscribe(move |s| *panel_clone.lock().unwrap() = s.unread_count);

        store.add_pushed_notification(Notification::new("a", "s", "m"));

        assert_eq!(*bell.lock().unwrap(), 1);
        assert_eq!(*panel.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_as_read_for_absent_id_still_hits_backend() {
        let api = MockApi::new();
        let store = NotificationStore::new(api.clone(), 20);

        // 本地没有这条（可能在未加载的分页里），仍然发 REST 让服务端标记
        store.mark_as_read("ghost").await.unwrap();
        assert!(api.calls().contains(&"mark_read:ghost".to_string()));
        assert_eq!(store.snapshot().unread_count, 0);
    }
}

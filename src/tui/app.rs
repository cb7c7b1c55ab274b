//! TUI 应用状态和主循环

use anyhow::Result;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::notification::{
    spawn_push_loop, NotificationStore, PushLoopConfig, PushTransport, StoreSnapshot,
    SubscriptionId,
};
use crate::tui::{event, ui};

pub type AppResult<T> = Result<T>;

pub type Tui = Terminal<CrosstermBackend<io::Stdout>>;

/// 当前视图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    /// 铃铛面板：全部通知，新在前
    #[default]
    Panel,
    /// 全量列表：支持按已读状态和主题过滤
    All,
}

/// 当前焦点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    List,
    Detail,
}

/// TUI 应用状态
pub struct App {
    store: Arc<NotificationStore>,
    updates: mpsc::UnboundedReceiver<StoreSnapshot>,
    subscription: SubscriptionId,
    /// 最近一次收到的 store 快照
    pub snapshot: StoreSnapshot,
    pub view: View,
    pub focus: Focus,
    /// 可见列表内的选中下标
    pub selected: usize,
    pub detail_scroll: usize,
    /// 只看未读（All 视图）
    pub unread_only: bool,
    /// 主题过滤（All 视图），None 表示不过滤
    pub topic_filter: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = store.subscribe(move |snapshot| {
            let _ = tx.send(snapshot.clone());
        });
        let snapshot = store.snapshot();

        Self {
            store,
            updates: rx,
            subscription,
            snapshot,
            view: View::default(),
            focus: Focus::default(),
            selected: 0,
            detail_scroll: 0,
            unread_only: false,
            topic_filter: None,
            should_quit: false,
        }
    }

    /// 吸收 store 推来的快照更新并收敛选中位置
    pub fn drain_updates(&mut self) {
        while let Ok(snapshot) = self.updates.try_recv() {
            self.snapshot = snapshot;
        }
        self.clamp_selection();
    }

    /// 当前视图下可见通知在快照里的下标
    pub fn visible_indices(&self) -> Vec<usize> {
        self.snapshot
            .notifications
            .iter()
            .enumerate()
            .filter(|(_, n)| match self.view {
                View::Panel => true,
                View::All => {
                    (!self.unread_only || n.is_unread())
                        && self
                            .topic_filter
                            .as_ref()
                            .map(|t| &n.topic == t)
                            .unwrap_or(true)
                }
            })
            .map(|(index, _)| index)
            .collect()
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_indices().len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    /// 选中的通知
    pub fn selected_notification(&self) -> Option<&crate::notification::Notification> {
        let indices = self.visible_indices();
        indices
            .get(self.selected)
            .map(|&index| &self.snapshot.notifications[index])
    }

    pub fn select_next(&mut self) {
        let len = self.visible_indices().len();
        if len == 0 {
            return;
        }
        if self.selected + 1 < len {
            self.selected += 1;
        }
        // 滚动到底部时接上下一页
        if self.selected + 1 >= len {
            self.maybe_load_more();
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_top(&mut self) {
        self.selected = 0;
    }

    pub fn select_bottom(&mut self) {
        let len = self.visible_indices().len();
        self.selected = len.saturating_sub(1);
        self.maybe_load_more();
    }

    /// 有更多页且空闲时派发 load_more 意图
    fn maybe_load_more(&self) {
        if self.snapshot.has_more && !self.snapshot.loading {
            let store = self.store.clone();
            tokio::spawn(async move {
                let _ = store.load_more().await;
            });
        }
    }

    pub fn toggle_view(&mut self) {
        self.view = match self.view {
            View::Panel => View::All,
            View::All => View::Panel,
        };
        self.focus = Focus::List;
        self.clamp_selection();
    }

    pub fn toggle_unread_filter(&mut self) {
        self.unread_only = !self.unread_only;
        self.clamp_selection();
    }

    /// 在「不过滤 -> 各已知主题」之间循环
    pub fn cycle_topic_filter(&mut self) {
        let mut topics: Vec<String> = Vec::new();
        for n in &self.snapshot.notifications {
            if !topics.contains(&n.topic) {
                topics.push(n.topic.clone());
            }
        }
        if topics.is_empty() {
            self.topic_filter = None;
            return;
        }

        self.topic_filter = match &self.topic_filter {
            None => Some(topics[0].clone()),
            Some(current) => match topics.iter().position(|t| t == current) {
                Some(pos) if pos + 1 < topics.len() => Some(topics[pos + 1].clone()),
                _ => None,
            },
        };
        self.clamp_selection();
    }

    /// 标记选中项已读
    pub fn mark_selected_read(&self) {
        if let Some(n) = self.selected_notification() {
            if n.is_unread() {
                let id = n.id.clone();
                let store = self.store.clone();
                tokio::spawn(async move {
                    let _ = store.mark_as_read(&id).await;
                });
            }
        }
    }

    /// 全部标记已读
    pub fn mark_all_read(&self) {
        let store = self.store.clone();
        tokio::spawn(async move {
            let _ = store.mark_all_as_read().await;
        });
    }

    /// 删除选中项
    pub fn delete_selected(&self) {
        if let Some(n) = self.selected_notification() {
            let id = n.id.clone();
            let store = self.store.clone();
            tokio::spawn(async move {
                let _ = store.delete_notification(&id).await;
            });
        }
    }

    /// 重新拉取第一页和未读数
    pub fn refresh(&self) {
        let store = self.store.clone();
        tokio::spawn(async move {
            let _ = store.refresh().await;
        });
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

/// 初始化终端（raw mode + 备用屏幕）
pub fn init_terminal() -> Result<Tui> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

/// 恢复终端
pub fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// 运行通知中心 TUI
///
/// 挂载时订阅 store、触发首屏加载、启动推送监听循环；
/// 退出时取消监听循环并退订，避免任务泄漏。
pub async fn run(
    store: Arc<NotificationStore>,
    transport: Option<Arc<dyn PushTransport>>,
) -> Result<()> {
    let mut terminal = init_terminal()?;
    let mut app = App::new(store.clone());

    {
        let store = store.clone();
        tokio::spawn(async move {
            let _ = store.refresh().await;
        });
    }

    let cancel = CancellationToken::new();
    let push_handle = transport.map(|transport| {
        let registration_store = store.clone();
        let registration_transport = transport.clone();
        tokio::spawn(async move {
            let _ = registration_store
                .register_push_token(registration_transport.as_ref())
                .await;
        });
        spawn_push_loop(store.clone(), transport, PushLoopConfig::default(), cancel.clone())
    });

    let result = event_loop(&mut terminal, &mut app);

    cancel.cancel();
    if let Some(handle) = push_handle {
        handle.abort();
        let _ = handle.await;
    }
    store.unsubscribe(app.subscription);
    restore_terminal(&mut terminal)?;
    debug!("notification TUI stopped");
    result
}

fn event_loop(terminal: &mut Tui, app: &mut App) -> Result<()> {
    loop {
        app.drain_updates();
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event::TuiEvent::Key(key)) = event::poll_event(Duration::from_millis(100))? {
            event::handle_key(app, key);
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

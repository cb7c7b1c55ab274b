//! TUI 渲染模块

use chrono::{DateTime, Local, Utc};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};

use crate::notification::{topic_style, Notification, Priority};
use crate::tui::{App, Focus, View};

/// 徽标显示上限
const BADGE_CAP: u64 = 99;

/// 未读徽标文案，超过上限显示 "99+"
pub fn format_badge(count: u64) -> String {
    if count > BADGE_CAP {
        format!("{}+", BADGE_CAP)
    } else {
        count.to_string()
    }
}

/// 优先级 -> 强调色
fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::Urgent => Color::Red,
        Priority::High => Color::Yellow,
        Priority::Normal => Color::White,
        Priority::Low => Color::DarkGray,
    }
}

/// 时间展示：今天只显示时分，否则带日期
fn format_time(ts: DateTime<Utc>) -> String {
    let local = ts.with_timezone(&Local);
    if local.date_naive() == Local::now().date_naive() {
        local.format("%H:%M").to_string()
    } else {
        local.format("%m-%d %H:%M").to_string()
    }
}

/// 渲染主界面
pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let visible = app.visible_indices();

    // 垂直分割: 状态栏 | 主区域 | 底部栏
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(area);

    render_status_bar(app, frame, vertical[0]);

    // 主区域: 列表 | 详情
    let main_area = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(vertical[1]);

    render_list(app, frame, main_area[0], &visible);
    render_detail(app, frame, main_area[1]);
    render_help_bar(app, frame, vertical[2]);
}

/// 状态栏：铃铛徽标 + 视图名 + 过滤状态
fn render_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let badge = format_badge(app.snapshot.unread_count);
    let view_name = match app.view {
        View::Panel => "面板",
        View::All => "全部",
    };
    let mut status = format!(" 通知中心 │ 🔔 {} 未读 │ {}", badge, view_name);
    if app.view == View::All {
        if app.unread_only {
            status.push_str(" │ 只看未读");
        }
        if let Some(topic) = &app.topic_filter {
            status.push_str(&format!(" │ 主题: {}", topic_style(topic).label));
        }
    }
    if app.snapshot.loading {
        status.push_str(" │ 加载中…");
    }

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::Blue).fg(Color::White));
    frame.render_widget(status_bar, area);
}

/// 渲染通知列表
fn render_list(app: &App, frame: &mut Frame, area: Rect, visible: &[usize]) {
    let len = visible.len();
    let visible_height = area.height.saturating_sub(2) as usize;

    // 选中项始终保持在视窗内
    let skip = if app.selected >= visible_height && visible_height > 0 {
        app.selected - visible_height + 1
    } else {
        0
    };

    let items: Vec<ListItem> = visible
        .iter()
        .skip(skip)
        .take(visible_height.max(1))
        .enumerate()
        .map(|(i, &index)| {
            let n = &app.snapshot.notifications[index];
            let is_selected = skip + i == app.selected;
            list_item(n, is_selected)
        })
        .collect();

    let title = match app.view {
        View::Panel => format!(" 通知 ({}) ", len),
        View::All => format!(" 全部通知 ({}) ", len),
    };
    let border_style = if app.focus == Focus::List {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(border_style),
    );
    frame.render_widget(list, area);

    // 滚动条（仅当内容超出可见区域时显示）
    if len > visible_height && visible_height > 0 {
        let mut scrollbar_state = ScrollbarState::new(len)
            .position(app.selected)
            .viewport_content_length(visible_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(None)
            .end_symbol(None);
        frame.render_stateful_widget(
            scrollbar,
            area.inner(Margin { vertical: 1, horizontal: 0 }),
            &mut scrollbar_state,
        );
    }
}

fn list_item(n: &Notification, is_selected: bool) -> ListItem<'static> {
    let style_info = topic_style(&n.topic);
    let marker = if n.is_unread() { "● " } else { "  " };
    let selected_marker = if is_selected { "→ " } else { "  " };

    let text = format!(
        "{}{}{} [{}] {}",
        selected_marker,
        marker,
        style_info.icon,
        format_time(n.created_at),
        n.subject
    );

    let color = if n.is_unread() {
        priority_color(n.priority)
    } else {
        Color::DarkGray
    };
    let style = if is_selected {
        let fg = if color == Color::DarkGray { Color::White } else { color };
        Style::default().fg(fg).bg(Color::DarkGray)
    } else {
        Style::default().fg(color)
    };
    ListItem::new(text).style(style)
}

/// 渲染通知详情
fn render_detail(app: &mut App, frame: &mut Frame, area: Rect) {
    let is_focused = app.focus == Focus::Detail;
    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let title = if is_focused {
        " 详情 (j/k 滚动, Esc 返回) "
    } else {
        " 详情 "
    };

    let lines: Vec<String> = if let Some(n) = app.selected_notification() {
        let style_info = topic_style(&n.topic);
        let mut l = vec![
            format!("时间:    {}", n.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")),
            format!("主题:    {} {}", style_info.icon, style_info.label),
            format!("优先级:  {}", n.priority),
            format!("状态:    {}", if n.is_unread() { "未读" } else { "已读" }),
            String::new(),
            n.subject.clone(),
            String::new(),
        ];
        for line in n.message.lines() {
            l.push(line.to_string());
        }

        if let (Some(url), text) = (&n.action_url, &n.action_text) {
            l.push(String::new());
            l.push(format!(
                "↗ {} ({})",
                text.as_deref().unwrap_or("打开"),
                url
            ));
        }
        if let Some(data) = &n.data {
            l.push(String::new());
            l.push("─── 附加数据 ───".to_string());
            for line in serde_json::to_string_pretty(data).unwrap_or_default().lines() {
                l.push(line.to_string());
            }
        }
        l
    } else {
        vec!["没有选中的通知".to_string()]
    };

    let total_lines = lines.len();
    let visible_height = area.height.saturating_sub(2) as usize;
    let max_scroll = total_lines.saturating_sub(visible_height);
    if app.detail_scroll > max_scroll {
        app.detail_scroll = max_scroll;
    }
    let content = lines.join("\n");

    let detail = Paragraph::new(content)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(border_style),
        )
        .scroll((app.detail_scroll as u16, 0));
    frame.render_widget(detail, area);

    if total_lines > visible_height && visible_height > 0 {
        let mut scrollbar_state = ScrollbarState::new(max_scroll)
            .position(app.detail_scroll)
            .viewport_content_length(visible_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(None)
            .end_symbol(None);
        frame.render_stateful_widget(
            scrollbar,
            area.inner(Margin { vertical: 1, horizontal: 0 }),
            &mut scrollbar_state,
        );
    }
}

fn render_help_bar(app: &App, frame: &mut Frame, area: Rect) {
    let help = match (app.focus, app.view) {
        (Focus::List, View::Panel) => {
            " [j/k] 移动  [Enter] 详情  [r] 已读  [a] 全部已读  [d] 删除  [Tab] 全部视图  [R] 刷新  [q] 退出 "
        }
        (Focus::List, View::All) => {
            " [j/k] 移动  [u] 只看未读  [t] 主题过滤  [r] 已读  [d] 删除  [Tab] 面板视图  [q] 退出 "
        }
        (Focus::Detail, _) => " [j/k] 滚动  [r] 已读  [d] 删除  [Esc] 返回  [q] 退出 ",
    };
    let help_bar = Paragraph::new(help).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(help_bar, area);
}

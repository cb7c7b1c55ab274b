//! 事件处理模块

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use std::time::Duration;

use crate::tui::{App, Focus, View};

/// TUI 事件
#[derive(Debug)]
pub enum TuiEvent {
    Key(KeyEvent),
    Tick,
}

/// 轮询事件
pub fn poll_event(timeout: Duration) -> Result<Option<TuiEvent>> {
    if event::poll(timeout)? {
        if let Event::Key(key) = event::read()? {
            return Ok(Some(TuiEvent::Key(key)));
        }
    }
    Ok(None)
}

/// 处理按键事件
pub fn handle_key(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }

    match app.focus {
        Focus::List => handle_list_key(app, key),
        Focus::Detail => handle_detail_key(app, key),
    }
}

fn handle_list_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(),
        KeyCode::Char('g') => app.select_top(),
        KeyCode::Char('G') => app.select_bottom(),
        KeyCode::Tab => app.toggle_view(),
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => {
            if app.selected_notification().is_some() {
                app.focus = Focus::Detail;
                app.detail_scroll = 0;
            }
        }
        KeyCode::Char('r') => app.mark_selected_read(),
        KeyCode::Char('a') => app.mark_all_read(),
        KeyCode::Char('d') => app.delete_selected(),
        KeyCode::Char('R') => app.refresh(),
        // 过滤只在全量视图下生效
        KeyCode::Char('u') if app.view == View::All => app.toggle_unread_filter(),
        KeyCode::Char('t') if app.view == View::All => app.cycle_topic_filter(),
        _ => {}
    }
}

fn handle_detail_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Esc | KeyCode::Char('h') | KeyCode::Left => {
            app.focus = Focus::List;
            app.detail_scroll = 0;
        }
        KeyCode::Char('j') | KeyCode::Down => app.detail_scroll = app.detail_scroll.saturating_add(1),
        KeyCode::Char('k') | KeyCode::Up => app.detail_scroll = app.detail_scroll.saturating_sub(1),
        KeyCode::Char('r') => app.mark_selected_read(),
        KeyCode::Char('d') => {
            app.delete_selected();
            app.focus = Focus::List;
        }
        _ => {}
    }
}

//! 通知中心 TUI - 铃铛徽标、通知面板与全量列表

mod app;
mod event;
mod ui;

pub use app::{init_terminal, restore_terminal, run, App, AppResult, Focus, Tui, View};
pub use event::{handle_key, poll_event, TuiEvent};
pub use ui::{format_badge, render};

//! CLI 输出格式化

use anyhow::Result;

use crate::notification::{topic_style, Notification, NotificationPage};

/// 单行预览的正文截断长度（字符数）
const PREVIEW_CHARS: usize = 48;

/// UTF-8 安全截断，超长追加省略号
fn truncate_preview(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    if first_line.chars().count() > PREVIEW_CHARS {
        let truncated: String = first_line.chars().take(PREVIEW_CHARS).collect();
        format!("{}…", truncated)
    } else {
        first_line.to_string()
    }
}

/// 单条通知的表格行
pub fn format_notification_row(n: &Notification) -> String {
    let marker = if n.is_unread() { "●" } else { " " };
    let style = topic_style(&n.topic);
    format!(
        "{} {} {} [{}] {} — {}",
        marker,
        style.icon,
        n.created_at.format("%Y-%m-%d %H:%M"),
        n.priority,
        n.subject,
        truncate_preview(&n.message)
    )
}

/// 打印一页通知
pub fn print_page(page: &NotificationPage, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&page.items)?);
        return Ok(());
    }

    if page.items.is_empty() {
        println!("没有通知");
        return Ok(());
    }
    for n in &page.items {
        println!("{}", format_notification_row(n));
    }
    println!();
    println!("第 {}/{} 页，共 {} 条", page.page, page.total_pages.max(1), page.total);
    Ok(())
}

/// 打印未读数
pub fn print_unread_count(count: u64, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::json!({ "count": count }));
    } else {
        println!("🔔 未读通知: {}", count);
    }
    Ok(())
}

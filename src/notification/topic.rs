//! 主题样式表 - 图标与颜色
//!
//! 主题是服务端可扩展的开放字符串集合，这里用查表加默认项的方式映射，
//! 新主题无需客户端发版即可渲染。

use ratatui::style::Color;

/// 单个主题的展示样式
#[derive(Debug, Clone, Copy)]
pub struct TopicStyle {
    pub icon: &'static str,
    pub color: Color,
    pub label: &'static str,
}

/// 未知主题的兜底样式
const DEFAULT_STYLE: TopicStyle = TopicStyle {
    icon: "🔔",
    color: Color::White,
    label: "通知",
};

/// 已知主题表
const STYLES: &[(&str, TopicStyle)] = &[
    ("order_created", TopicStyle { icon: "🛒", color: Color::Green, label: "新订单" }),
    ("order_shipped", TopicStyle { icon: "🚚", color: Color::Cyan, label: "已发货" }),
    ("payment_failed", TopicStyle { icon: "💳", color: Color::Red, label: "支付失败" }),
    ("ticket_assigned", TopicStyle { icon: "🎫", color: Color::Yellow, label: "工单指派" }),
    ("stock_low", TopicStyle { icon: "📦", color: Color::Magenta, label: "库存预警" }),
    ("campaign", TopicStyle { icon: "📣", color: Color::Blue, label: "营销活动" }),
    ("system", TopicStyle { icon: "⚙", color: Color::DarkGray, label: "系统" }),
    ("custom", TopicStyle { icon: "✉", color: Color::White, label: "自定义" }),
];

/// 查询主题样式，未知主题返回默认样式
pub fn topic_style(topic: &str) -> &'static TopicStyle {
    STYLES
        .iter()
        .find(|(key, _)| *key == topic)
        .map(|(_, style)| style)
        .unwrap_or(&DEFAULT_STYLE)
}

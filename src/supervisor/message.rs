//! Notification messages and their outbound text templates
//!
//! Every kind has a fixed field set rendered in insertion order; downstream
//! chat consumers parse these labels, so they must not change.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const SEPARATOR: &str = "━━━━━━━━━━━━━━━━━━━━";
const TIME_LABEL: &str = "Time";

/// Column where values start in block layouts (label plus colon, padded)
const LABEL_WIDTH: usize = 13;
const BOT_EVENT_LABEL_WIDTH: usize = 10;

/// Delivery filter. A message is delivered only when its level is at or
/// above the configured level (`All` < `Trades` < `Alerts` < `Critical`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationLevel {
    /// Every event including heartbeats
    All,
    /// Trade open/close events and above
    Trades,
    /// Regulation and lifecycle alerts
    Alerts,
    /// Critical errors only
    Critical,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationLevel::All => "ALL",
            NotificationLevel::Trades => "TRADES",
            NotificationLevel::Alerts => "ALERTS",
            NotificationLevel::Critical => "CRITICAL",
        }
    }

    /// Whether a message at `level` passes a filter configured at `self`
    pub fn admits(&self, level: NotificationLevel) -> bool {
        level >= *self
    }
}

impl std::fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NotificationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(NotificationLevel::All),
            "TRADES" => Ok(NotificationLevel::Trades),
            "ALERTS" => Ok(NotificationLevel::Alerts),
            "CRITICAL" => Ok(NotificationLevel::Critical),
            other => Err(format!("unknown notification level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    TradeOpened,
    TradeClosed,
    Adjustment,
    Emergency,
    EmergencyCleared,
    BotEvent,
    DailySummary,
    Heartbeat,
}

/// Lifecycle events reported through [`NotificationMessage::bot_event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotEvent {
    Started,
    Stopped,
    Connected,
    Disconnected,
    Reconnected,
    Error,
}

impl BotEvent {
    fn as_str(&self) -> &'static str {
        match self {
            BotEvent::Started => "started",
            BotEvent::Stopped => "stopped",
            BotEvent::Connected => "connected",
            BotEvent::Disconnected => "disconnected",
            BotEvent::Reconnected => "reconnected",
            BotEvent::Error => "error",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            BotEvent::Started => "▶️",
            BotEvent::Stopped => "⏹️",
            BotEvent::Connected => "🔗",
            BotEvent::Disconnected => "🔌",
            BotEvent::Reconnected => "♻️",
            BotEvent::Error => "⛔",
        }
    }
}

/// One labelled value. `suffix` is rendered after the code span.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: String,
    pub suffix: Option<String>,
}

/// A single outbound notification. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub kind: NotificationKind,
    pub level: NotificationLevel,
    pub icon: &'static str,
    pub title: String,
    pub fields: Vec<Field>,
    pub footer: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NotificationMessage {
    fn build(
        kind: NotificationKind,
        level: NotificationLevel,
        icon: &'static str,
        title: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            level,
            icon,
            title: title.into(),
            fields: Vec::new(),
            footer: None,
            created_at: Utc::now(),
        }
    }

    fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push(Field {
            key: key.to_string(),
            value: value.into(),
            suffix: None,
        });
        self
    }

    fn suffix(mut self, suffix: String) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.suffix = Some(suffix);
        }
        self
    }

    fn time(self) -> Self {
        let ts = self.created_at.format("%H:%M:%S UTC").to_string();
        self.field(TIME_LABEL, ts)
    }

    fn footer(mut self, footer: &str) -> Self {
        self.footer = Some(footer.to_string());
        self
    }

    pub fn trade_opened(
        asset: &str,
        direction: &str,
        amount: Decimal,
        confidence: f64,
        mode: &str,
    ) -> Self {
        let direction = direction.to_uppercase();
        let icon = if direction == "CALL" { "📈" } else { "📉" };
        Self::build(
            NotificationKind::TradeOpened,
            NotificationLevel::Trades,
            icon,
            "TRADE OPENED",
        )
        .field("Asset", asset)
        .field("Direction", direction)
        .field("Amount", format!("${:.2}", amount))
        .field("Confidence", format!("{:.0}%", confidence * 100.0))
        .field("Mode", mode)
        .time()
    }

    pub fn trade_closed(
        asset: &str,
        won: bool,
        profit: Decimal,
        session_win_rate: f64,
        balance: Decimal,
    ) -> Self {
        let (icon, result, pnl) = if won {
            ("✅", "WIN", format!("+${:.2}", profit.abs()))
        } else {
            ("❌", "LOSS", format!("-${:.2}", profit.abs()))
        };
        Self::build(
            NotificationKind::TradeClosed,
            NotificationLevel::Trades,
            icon,
            format!("TRADE CLOSED — {result}"),
        )
        .field("Asset", asset)
        .field("P&L", pnl)
        .field("Session WR", format!("{:.1}%", session_win_rate))
        .field("Balance", format!("${:.2}", balance))
        .time()
    }

    pub fn adjustment(trigger: &str, new_confidence: f64, consecutive_losses: u32) -> Self {
        Self::build(
            NotificationKind::Adjustment,
            NotificationLevel::Alerts,
            "⚙️",
            "AUTO-ADJUSTMENT",
        )
        .field("Trigger", trigger)
        .field("Con. Losses", consecutive_losses.to_string())
        .field("New Conf", format!("{:.0}%", new_confidence * 100.0))
        .time()
    }

    pub fn emergency(reason: &str, consecutive_losses: u32, new_mode: &str) -> Self {
        Self::build(
            NotificationKind::Emergency,
            NotificationLevel::Alerts,
            "🚨",
            "EMERGENCY MODE ACTIVATED",
        )
        .field("Reason", reason)
        .field("Con. Losses", consecutive_losses.to_string())
        .field("New Mode", new_mode)
        .time()
        .footer("⚠️ Bot has paused trading. Review required.")
    }

    pub fn emergency_cleared(wins: u32) -> Self {
        Self::build(
            NotificationKind::EmergencyCleared,
            NotificationLevel::Alerts,
            "✅",
            "EMERGENCY MODE CLEARED",
        )
        .field("Recovery", format!("{wins} consecutive wins"))
        .time()
        .footer("▶️ Bot resuming normal operation.")
    }

    pub fn bot_event(event: BotEvent, detail: &str, balance: Decimal) -> Self {
        let level = match event {
            BotEvent::Error => NotificationLevel::Critical,
            _ => NotificationLevel::Alerts,
        };
        let mut msg = Self::build(
            NotificationKind::BotEvent,
            level,
            event.icon(),
            format!("BOT {}", event.as_str().to_uppercase()),
        )
        .field("Info", detail);
        if !balance.is_zero() {
            msg = msg.field("Balance", format!("${:.2}", balance));
        }
        msg.time()
    }

    pub fn daily_summary(
        wins: u32,
        losses: u32,
        profit: Decimal,
        balance: Decimal,
        top_asset: &str,
    ) -> Self {
        let total = wins + losses;
        let win_rate = if total > 0 {
            f64::from(wins) / f64::from(total) * 100.0
        } else {
            0.0
        };
        let sign = if profit >= Decimal::ZERO { "+" } else { "" };
        let msg = Self::build(
            NotificationKind::DailySummary,
            NotificationLevel::Alerts,
            "📊",
            "DAILY SUMMARY",
        );
        let date = msg.created_at.format("%Y-%m-%d").to_string();
        msg.field("Trades", total.to_string())
            .suffix(format!(" (W:{wins} / L:{losses})"))
            .field("Win Rate", format!("{:.1}%", win_rate))
            .field("Total P&L", format!("{sign}${:.2}", profit))
            .field("Balance", format!("${:.2}", balance))
            .field("Best Asset", top_asset)
            .field("Date", date)
    }

    pub fn heartbeat(cycle: u64, balance: Decimal, mode: &str) -> Self {
        Self::build(
            NotificationKind::Heartbeat,
            NotificationLevel::All,
            "💓",
            "HEARTBEAT",
        )
        .field("Cycle", cycle.to_string())
        .field("Balance", format!("${:.2}", balance))
        .field("Mode", mode)
        .time()
    }

    /// Value of a rendered field, if present
    pub fn field_value(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.key.as_str()).collect()
    }

    /// Render as Markdown text for a chat transport
    pub fn render(&self) -> String {
        match self.kind {
            NotificationKind::Heartbeat => self.render_inline(),
            NotificationKind::BotEvent => self.render_block(BOT_EVENT_LABEL_WIDTH),
            _ => self.render_block(LABEL_WIDTH),
        }
    }

    fn render_block(&self, width: usize) -> String {
        let mut lines = Vec::with_capacity(self.fields.len() + 2);
        lines.push(format!("{} *{}*", self.icon, self.title));
        lines.push(SEPARATOR.to_string());
        for field in &self.fields {
            lines.push(format!(
                "{:<width$}`{}`{}",
                format!("{}:", field.key),
                field.value,
                field.suffix.as_deref().unwrap_or(""),
            ));
        }
        let mut text = lines.join("\n");
        if let Some(footer) = &self.footer {
            text.push_str("\n\n");
            text.push_str(footer);
        }
        text
    }

    /// Title line carries the first field, the rest share one line
    fn render_inline(&self) -> String {
        let mut fields = self.fields.iter();
        let mut header = format!("{} *{}*", self.icon, self.title);
        if let Some(first) = fields.next() {
            header.push_str(&format!(" — {} {}", first.key, first.value));
        }
        let rest: Vec<String> = fields
            .map(|f| {
                if f.key == TIME_LABEL {
                    format!("`{}`", f.value)
                } else {
                    format!("{}: `{}`", f.key, f.value)
                }
            })
            .collect();
        format!("{header}\n{}", rest.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_level_ordering_and_filter() {
        assert!(NotificationLevel::All < NotificationLevel::Trades);
        assert!(NotificationLevel::Alerts < NotificationLevel::Critical);

        let configured = NotificationLevel::Trades;
        assert!(!configured.admits(NotificationLevel::All));
        assert!(configured.admits(NotificationLevel::Trades));
        assert!(configured.admits(NotificationLevel::Critical));
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("alerts".parse::<NotificationLevel>(), Ok(NotificationLevel::Alerts));
        assert!("loud".parse::<NotificationLevel>().is_err());
    }

    #[test]
    fn test_field_sets_per_kind() {
        let opened = NotificationMessage::trade_opened("EURUSD", "call", dec!(2), 0.73, "NORMAL");
        assert_eq!(
            opened.field_names(),
            vec!["Asset", "Direction", "Amount", "Confidence", "Mode", "Time"]
        );
        assert_eq!(opened.field_value("Direction"), Some("CALL"));
        assert_eq!(opened.field_value("Amount"), Some("$2.00"));
        assert_eq!(opened.field_value("Confidence"), Some("73%"));

        let closed = NotificationMessage::trade_closed("EURUSD", false, dec!(-2), 61.34, dec!(998));
        assert_eq!(
            closed.field_names(),
            vec!["Asset", "P&L", "Session WR", "Balance", "Time"]
        );
        assert_eq!(closed.field_value("P&L"), Some("-$2.00"));
        assert_eq!(closed.field_value("Session WR"), Some("61.3%"));

        let emergency = NotificationMessage::emergency("5 consecutive losses", 5, "CONSERVATIVE");
        assert_eq!(
            emergency.field_names(),
            vec!["Reason", "Con. Losses", "New Mode", "Time"]
        );
    }

    #[test]
    fn test_levels_per_kind() {
        assert_eq!(
            NotificationMessage::heartbeat(10, dec!(100), "NORMAL").level,
            NotificationLevel::All
        );
        assert_eq!(
            NotificationMessage::adjustment("3 consecutive losses", 0.6, 3).level,
            NotificationLevel::Alerts
        );
        assert_eq!(
            NotificationMessage::bot_event(BotEvent::Error, "boom", Decimal::ZERO).level,
            NotificationLevel::Critical
        );
    }

    #[test]
    fn test_bot_event_omits_zero_balance() {
        let msg = NotificationMessage::bot_event(BotEvent::Disconnected, "attempt 2 failed", Decimal::ZERO);
        assert_eq!(msg.field_names(), vec!["Info", "Time"]);

        let msg = NotificationMessage::bot_event(BotEvent::Reconnected, "restored", dec!(1050));
        assert_eq!(msg.field_names(), vec!["Info", "Balance", "Time"]);
        assert_eq!(msg.title, "BOT RECONNECTED");
    }

    #[test]
    fn test_render_keeps_field_order() {
        let text = NotificationMessage::emergency("5 consecutive losses", 5, "CONSERVATIVE").render();
        let reason = text.find("Reason:").unwrap();
        let losses = text.find("Con. Losses:").unwrap();
        let mode = text.find("New Mode:").unwrap();
        assert!(reason < losses && losses < mode);
        assert!(text.starts_with("🚨 *EMERGENCY MODE ACTIVATED*"));
        assert!(text.contains("Con. Losses: `5`"));
        assert!(text.ends_with("Review required."));
    }

    #[test]
    fn test_daily_summary_sign() {
        let msg = NotificationMessage::daily_summary(18, 7, dec!(12.5), dec!(1012.5), "EURUSD");
        assert_eq!(msg.field_value("Trades"), Some("25"));
        assert_eq!(msg.field_value("Win Rate"), Some("72.0%"));
        assert_eq!(msg.field_value("Total P&L"), Some("+$12.50"));
    }

    #[test]
    fn test_daily_summary_renders_breakdown_outside_code_span() {
        let msg = NotificationMessage::daily_summary(18, 7, dec!(12.5), dec!(1012.5), "EURUSD");
        let date = msg.created_at.format("%Y-%m-%d");
        let expected = format!(
            "📊 *DAILY SUMMARY*\n\
             ━━━━━━━━━━━━━━━━━━━━\n\
             Trades:      `25` (W:18 / L:7)\n\
             Win Rate:    `72.0%`\n\
             Total P&L:   `+$12.50`\n\
             Balance:     `$1012.50`\n\
             Best Asset:  `EURUSD`\n\
             Date:        `{date}`"
        );
        assert_eq!(msg.render(), expected);
    }

    #[test]
    fn test_bot_event_uses_narrow_labels() {
        let msg = NotificationMessage::bot_event(BotEvent::Started, "x", Decimal::ZERO);
        let ts = msg.created_at.format("%H:%M:%S UTC");
        let expected = format!(
            "▶️ *BOT STARTED*\n\
             ━━━━━━━━━━━━━━━━━━━━\n\
             Info:     `x`\n\
             Time:     `{ts}`"
        );
        assert_eq!(msg.render(), expected);

        let msg = NotificationMessage::bot_event(BotEvent::Reconnected, "restored", dec!(1050));
        assert!(msg.render().contains("\nBalance:  `$1050.00`\n"));
    }

    #[test]
    fn test_heartbeat_renders_on_two_lines() {
        let msg = NotificationMessage::heartbeat(42, dec!(1000), "NORMAL");
        let ts = msg.created_at.format("%H:%M:%S UTC");
        let expected = format!(
            "💓 *HEARTBEAT* — Cycle 42\n\
             Balance: `$1000.00` | Mode: `NORMAL` | `{ts}`"
        );
        assert_eq!(msg.render(), expected);
    }

    #[test]
    fn test_trade_opened_renders_block() {
        let msg = NotificationMessage::trade_opened("EURUSD", "call", dec!(2), 0.73, "NORMAL");
        let ts = msg.created_at.format("%H:%M:%S UTC");
        let expected = format!(
            "📈 *TRADE OPENED*\n\
             ━━━━━━━━━━━━━━━━━━━━\n\
             Asset:       `EURUSD`\n\
             Direction:   `CALL`\n\
             Amount:      `$2.00`\n\
             Confidence:  `73%`\n\
             Mode:        `NORMAL`\n\
             Time:        `{ts}`"
        );
        assert_eq!(msg.render(), expected);
    }
}

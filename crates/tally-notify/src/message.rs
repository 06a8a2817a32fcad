//! Slack Block Kit payloads and the milestone message layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_events::{MilestoneCreated, MilestoneType, SkipReason};

/// Display name the webhook posts under.
pub const SLACK_USERNAME: &str = "Ghost Milestone Service";

/// Incoming-webhook message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackMessage {
    pub unfurl_links: bool,
    pub username: String,
    pub blocks: Vec<Block>,
}

/// A layout block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        text: Text,
    },
    Section {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<Text>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        fields: Vec<Text>,
    },
    Divider,
}

impl Block {
    fn section(text: String) -> Self {
        Self::Section {
            text: Some(Text::mrkdwn(text)),
            fields: Vec::new(),
        }
    }
}

/// A text object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Text {
    PlainText { text: String, emoji: bool },
    Mrkdwn { text: String },
}

impl Text {
    fn mrkdwn(text: String) -> Self {
        Self::Mrkdwn { text }
    }
}

/// Formats a whole amount for display.
///
/// Without a currency the value is only grouped (`12,345`). With one it is
/// prefixed by the currency symbol, or the upper-case code and a space when
/// there is no well-known symbol, and carries two decimals unless the
/// currency has no minor unit.
pub fn format_amount(amount: u64, currency: Option<&str>) -> String {
    let grouped = group_thousands(amount);
    let Some(currency) = currency.filter(|code| !code.trim().is_empty()) else {
        return grouped;
    };

    let code = currency.trim().to_ascii_uppercase();
    let prefix = match code.as_str() {
        "USD" => "$".to_string(),
        "EUR" => "€".to_string(),
        "GBP" => "£".to_string(),
        "JPY" => "¥".to_string(),
        "CAD" => "CA$".to_string(),
        "AUD" => "A$".to_string(),
        "INR" => "₹".to_string(),
        _ => format!("{code} "),
    };

    if matches!(code.as_str(), "JPY" | "KRW") {
        format!("{prefix}{grouped}")
    } else {
        format!("{prefix}{grouped}.00")
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Formats a date as `D MMM YYYY`, e.g. `5 Jan 2024`.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%-d %b %Y").to_string()
}

fn email_sent_text(payload: &MilestoneCreated) -> String {
    if let Some(sent_at) = &payload.milestone.email_sent_at {
        return format_date(sent_at);
    }
    match payload.meta.as_ref().and_then(|meta| meta.reason) {
        Some(SkipReason::Import) => "no / has imported members".to_string(),
        Some(SkipReason::Email) => "no / last email too recent".to_string(),
        None => "no".to_string(),
    }
}

/// Lays out the celebration message for a reached milestone.
pub fn milestone_message(payload: &MilestoneCreated, site_url: &str) -> SlackMessage {
    let milestone = &payload.milestone;
    let is_arr = milestone.kind == MilestoneType::Arr;
    let pretty = if is_arr { "ARR" } else { "Members" };
    let currency = milestone.currency.as_deref();
    let value = format_amount(milestone.value, currency);

    let mut fields = vec![Text::mrkdwn(format!("*Milestone:*\n{value}"))];
    let meta = payload.meta.as_ref();
    if is_arr {
        if let Some(current) = meta.and_then(|meta| meta.current_arr).filter(|n| *n > 0) {
            fields.push(Text::mrkdwn(format!(
                "*Current ARR:*\n{}",
                format_amount(current, currency)
            )));
        }
    } else if let Some(current) = meta
        .and_then(|meta| meta.current_members)
        .filter(|n| *n > 0)
    {
        fields.push(Text::mrkdwn(format!(
            "*Current Members:*\n{}",
            format_amount(current, None)
        )));
    }

    let blocks = vec![
        Block::Header {
            text: Text::PlainText {
                text: format!(":tada: {pretty} Milestone {value} reached!"),
                emoji: true,
            },
        },
        Block::section(format!(
            "New *{pretty} Milestone* achieved for <{site_url}|{site_url}>"
        )),
        Block::Divider,
        Block::Section { text: None, fields },
        Block::section(format!("*Email sent:*\n{}", email_sent_text(payload))),
    ];

    SlackMessage {
        unfurl_links: false,
        username: SLACK_USERNAME.to_string(),
        blocks,
    }
}

//! Inbox message schema and control/human classification

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Classified message body.
///
/// An inbox file mixes human-readable chatter with machine control traffic
/// (task assignments, shutdown requests) whose `text` is itself a JSON
/// object. The scanner classifies each message exactly once at ingestion;
/// consumers such as the Markdown export branch on the stored variant
/// instead of re-parsing text.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MessageBody {
    /// Machine control message: `kind` is the embedded `type` tag (or
    /// "control" when untagged), `payload` the parsed object.
    Control {
        kind: String,
        payload: serde_json::Value,
    },
    /// Plain human-readable text.
    #[default]
    Human,
}

impl MessageBody {
    /// Classify raw message text. Only a JSON object counts as control
    /// traffic; bare strings, numbers, and arrays read as human text.
    pub fn classify(text: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(text.trim()) {
            Ok(value @ serde_json::Value::Object(_)) => {
                let kind = value
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("control")
                    .to_string();
                MessageBody::Control {
                    kind,
                    payload: value,
                }
            }
            _ => MessageBody::Human,
        }
    }

    /// Whether this is control traffic.
    pub fn is_control(&self) -> bool {
        matches!(self, MessageBody::Control { .. })
    }
}

/// Message in an agent's inbox.
///
/// Stored in `~/.claude/teams/{team_name}/inboxes/{agent_name}.json` as an
/// append-only JSON array. Messages are never mutated or reordered once
/// written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxMessage {
    /// Sender agent name or 'team-lead'
    pub from: String,

    /// Message content (may itself be a JSON-encoded control message)
    pub text: String,

    /// ISO 8601 UTC timestamp
    #[serde(default)]
    pub timestamp: String,

    /// Whether the message has been read
    #[serde(default)]
    pub read: bool,

    /// Brief summary (5-10 words)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Classified body, filled by the scanner after parsing. Not part of the
    /// wire format.
    #[serde(skip)]
    pub body: MessageBody,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl InboxMessage {
    /// Classify this message's text into [`MessageBody`]. Called once per
    /// message during a scan.
    pub fn classify_body(&mut self) {
        self.body = MessageBody::classify(&self.text);
    }
}

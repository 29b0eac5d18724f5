//! Incremental transcript tailing.
//!
//! Transcripts are append-only JSONL logs. [`tail_new`] remembers progress
//! as a count of non-empty raw lines and parses only the suffix appended
//! since the last call. A shrinking line count means the file was truncated
//! externally; the cursor resets to the new total and no entries are
//! emitted for that call.

use crate::text::clip_chars;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::warn;

const TOOL_DETAIL_CHARS: usize = 80;

/// One parsed transcript entry. Transcript lines of any other type are
/// consumed without producing an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEntry {
    /// A user turn.
    User {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uuid: Option<String>,
        text: String,
    },
    /// An assistant turn: text and/or tool-use summaries.
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uuid: Option<String>,
        parts: Vec<AssistantPart>,
    },
}

/// One block of an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantPart {
    Text { text: String },
    ToolUse { name: String, detail: String },
}

/// Compress a tool invocation's input into a one-line detail string.
pub fn summarize_tool_input(name: &str, input: Option<&Value>) -> String {
    let Some(input) = input else {
        return String::new();
    };
    let field = |key: &str| {
        input
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    match name {
        "Bash" | "bash" => field("command"),
        "Read" | "read" | "Write" | "write" | "Edit" | "edit" => field("file_path"),
        "Glob" | "glob" => field("pattern"),
        "Grep" | "grep" => format!("{} {}", field("pattern"), field("path"))
            .trim()
            .to_string(),
        "Task" => field("description"),
        "WebSearch" | "WebFetch" => {
            let query = field("query");
            if query.is_empty() { field("url") } else { query }
        }
        _ => {
            let description = field("description");
            if !description.is_empty() {
                return description;
            }
            let prompt = field("prompt");
            if !prompt.is_empty() {
                return prompt;
            }
            clip_chars(&input.to_string(), TOOL_DETAIL_CHARS).to_string()
        }
    }
}

/// Parse one raw transcript line into a [`SessionEntry`].
///
/// Unrecognized entry types (progress markers, summaries, hooks) yield
/// `None`: consumed, not propagated.
pub fn parse_session_entry(obj: &Value) -> Option<SessionEntry> {
    let timestamp = obj
        .get("timestamp")
        .and_then(Value::as_str)
        .map(str::to_string);
    let uuid = obj.get("uuid").and_then(Value::as_str).map(str::to_string);

    match obj.get("type").and_then(Value::as_str) {
        Some("user") => {
            let content = obj.get("message").and_then(|m| m.get("content"));
            let text = match content {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Array(blocks)) => blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n"),
                _ => String::new(),
            };
            Some(SessionEntry::User {
                timestamp,
                uuid,
                text,
            })
        }
        Some("assistant") => {
            let content = obj.get("message").and_then(|m| m.get("content"));
            let mut parts = Vec::new();
            match content {
                Some(Value::String(s)) => parts.push(AssistantPart::Text { text: s.clone() }),
                Some(Value::Array(blocks)) => {
                    for block in blocks {
                        match block.get("type").and_then(Value::as_str) {
                            Some("text") => {
                                if let Some(text) = block.get("text").and_then(Value::as_str) {
                                    if !text.is_empty() {
                                        parts.push(AssistantPart::Text {
                                            text: text.to_string(),
                                        });
                                    }
                                }
                            }
                            Some("tool_use") => {
                                let name = block
                                    .get("name")
                                    .and_then(Value::as_str)
                                    .unwrap_or("unknown");
                                parts.push(AssistantPart::ToolUse {
                                    name: name.to_string(),
                                    detail: summarize_tool_input(name, block.get("input")),
                                });
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
            if parts.is_empty() {
                return None;
            }
            Some(SessionEntry::Assistant {
                timestamp,
                uuid,
                parts,
            })
        }
        _ => None,
    }
}

fn non_empty_lines(raw: &str) -> Vec<&str> {
    raw.lines().filter(|l| !l.trim().is_empty()).collect()
}

/// Count a transcript's non-empty lines. Unreadable files count zero.
pub fn count_lines(jsonl_path: &Path) -> usize {
    fs::read_to_string(jsonl_path)
        .map(|raw| non_empty_lines(&raw).len())
        .unwrap_or(0)
}

fn parse_lines(lines: &[&str]) -> Vec<SessionEntry> {
    lines
        .iter()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|obj| parse_session_entry(&obj))
        .collect()
}

/// Parse the last `tail` raw lines of a transcript. `tail == 0` parses the
/// whole file. Unreadable files yield nothing.
pub fn read_tail(jsonl_path: &Path, tail: usize) -> Vec<SessionEntry> {
    let Ok(raw) = fs::read_to_string(jsonl_path) else {
        return Vec::new();
    };
    let lines = non_empty_lines(&raw);
    let start = if tail == 0 || tail >= lines.len() {
        0
    } else {
        lines.len() - tail
    };
    parse_lines(&lines[start..])
}

/// Parse the lines appended since `since_lines` and return them with the new
/// cursor.
///
/// The cursor advances by raw lines consumed, not by entries produced. A
/// line count below `since_lines` is a truncation: the cursor resets to the
/// new total and the call emits no entries. An unreadable transcript leaves
/// the cursor untouched.
pub fn tail_new(jsonl_path: &Path, since_lines: usize) -> (Vec<SessionEntry>, usize) {
    let Ok(raw) = fs::read_to_string(jsonl_path) else {
        return (Vec::new(), since_lines);
    };
    let lines = non_empty_lines(&raw);
    let total = lines.len();

    if total < since_lines {
        warn!(
            "Transcript {} shrank from {} to {} lines; resetting cursor",
            jsonl_path.display(),
            since_lines,
            total
        );
        return (Vec::new(), total);
    }
    if total == since_lines {
        return (Vec::new(), total);
    }
    (parse_lines(&lines[since_lines..]), total)
}

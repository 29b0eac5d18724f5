//! Markdown report generation for a team.
//!
//! The report is a human-readable summary of one live (or archived) team:
//! roster, task board with blocking relations, and a deduplicated activity
//! log built from the human-readable half of the inboxes. Control traffic is
//! excluded using the classification done at ingestion.

use crate::schema::{TaskStatus, TeamConfig};
use crate::snapshot::Team;
use crate::text::clip_chars;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt::Write as _;

const DEDUP_TEXT_CHARS: usize = 80;
const LOG_TEXT_CHARS: usize = 120;

fn status_icon(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Completed => "✅",
        TaskStatus::InProgress => "🔄",
        TaskStatus::Blocked => "🚫",
        TaskStatus::Pending => "⏳",
    }
}

fn format_created(config: &TeamConfig) -> String {
    config
        .created_at
        .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms as i64))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn format_log_time(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

fn id_list(ids: &[String]) -> String {
    ids.iter()
        .map(|id| format!("#{id}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a full Markdown report for `team`.
pub fn markdown_report(team: &Team) -> String {
    let config = &team.config;
    let completed = team
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();

    let mut md = String::new();
    let _ = writeln!(md, "# Swarm Report: {}\n", team.name);
    let _ = writeln!(md, "> {}\n", config.description.as_deref().unwrap_or(""));
    let _ = writeln!(md, "**Created:** {}\n", format_created(config));

    let _ = writeln!(md, "## Summary\n");
    let _ = writeln!(md, "- **Agents:** {}", config.members.len());
    let _ = writeln!(md, "- **Tasks:** {} ({} completed)", team.tasks.len(), completed);
    let _ = writeln!(md, "- **Messages:** {}\n", team.message_count());

    let _ = writeln!(md, "## Agents\n");
    let _ = writeln!(md, "| Name | Role | Model |");
    let _ = writeln!(md, "|------|------|-------|");
    for member in &config.members {
        let _ = writeln!(
            md,
            "| {} | {} | {} |",
            member.name,
            member.agent_type.as_deref().unwrap_or(""),
            member.model.as_deref().unwrap_or(""),
        );
    }
    md.push('\n');

    let _ = writeln!(md, "## Tasks\n");
    for task in &team.tasks {
        let _ = writeln!(
            md,
            "### {} #{}: {}\n",
            status_icon(task.status),
            task.id,
            task.subject
        );
        let _ = writeln!(md, "- **Status:** {}", task.status.as_str());
        if let Some(owner) = &task.owner {
            let _ = writeln!(md, "- **Owner:** {owner}");
        }
        if !task.blocked_by.is_empty() {
            let _ = writeln!(md, "- **Blocked by:** {}", id_list(&task.blocked_by));
        }
        if !task.blocks.is_empty() {
            let _ = writeln!(md, "- **Blocks:** {}", id_list(&task.blocks));
        }
        md.push('\n');
    }

    let _ = writeln!(md, "## Activity Log\n");
    let mut log: Vec<(&str, &crate::schema::InboxMessage)> = Vec::new();
    for (to, messages) in &team.inboxes {
        for msg in messages {
            if msg.body.is_control() {
                continue;
            }
            log.push((to, msg));
        }
    }
    log.sort_by(|a, b| a.1.timestamp.cmp(&b.1.timestamp));

    let mut seen = HashSet::new();
    for (to, msg) in log {
        let key = format!(
            "{}|{}|{}",
            msg.from,
            msg.timestamp,
            clip_chars(&msg.text, DEDUP_TEXT_CHARS)
        );
        if !seen.insert(key) {
            continue;
        }
        let line = msg
            .summary
            .clone()
            .unwrap_or_else(|| clip_chars(&msg.text, LOG_TEXT_CHARS).to_string());
        let _ = writeln!(
            md,
            "- **{}** `{}` → `{}`: {}",
            format_log_time(&msg.timestamp),
            msg.from,
            to,
            line
        );
    }

    md
}

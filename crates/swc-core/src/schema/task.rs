//! Task record schema for the team task board

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Task status.
///
/// `Blocked` is derived from open blocking relationships by whatever writes
/// the task files; this engine only mirrors it. Any other string fails
/// deserialization, which drops that single record from the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task created but not started
    Pending,
    /// Task currently being worked on
    InProgress,
    /// Task finished successfully
    Completed,
    /// Task waiting on unfinished blockers
    Blocked,
}

/// Task record stored at `~/.claude/tasks/{team_name}/{id}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Task identifier, a string of digits ("1", "2", ...), unique per team
    pub id: String,

    /// Brief imperative title
    #[serde(default)]
    pub subject: String,

    /// Current status
    pub status: TaskStatus,

    /// Agent name assigned to this task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Task ids that must complete before this one can start
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<String>,

    /// Task ids that depend on this one completing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<String>,

    /// Custom key-value pairs; `_internal: true` hides the task from snapshots
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl TaskStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
        }
    }
}

impl TaskRecord {
    /// Numeric view of the id for board ordering. Non-numeric ids sort last.
    pub fn numeric_id(&self) -> i64 {
        self.id.parse().unwrap_or(i64::MAX)
    }

    /// Whether the task is flagged internal and must be excluded from
    /// snapshots.
    pub fn is_internal(&self) -> bool {
        self.metadata
            .get("_internal")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::from_str::<TaskStatus>("\"blocked\"").unwrap(),
            TaskStatus::Blocked
        );
    }

    #[test]
    fn status_unknown_string_rejected() {
        assert!(serde_json::from_str::<TaskStatus>("\"cancelled\"").is_err());
    }

    #[test]
    fn task_roundtrip_complete() {
        let json = r#"{
            "id": "3",
            "subject": "Wire the broadcast hub",
            "status": "in_progress",
            "owner": "builder-1",
            "blockedBy": ["1"],
            "blocks": ["4", "5"],
            "metadata": {"priority": "high"},
            "created_at": "2026-02-11T14:30:00Z"
        }"#;

        let task: TaskRecord = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, "3");
        assert_eq!(task.numeric_id(), 3);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.owner.as_deref(), Some("builder-1"));
        assert_eq!(task.blocked_by, vec!["1"]);
        assert_eq!(task.blocks, vec!["4", "5"]);
        assert!(!task.is_internal());
        assert!(task.unknown_fields.contains_key("created_at"));

        let serialized = serde_json::to_string(&task).unwrap();
        let reparsed: TaskRecord = serde_json::from_str(&serialized).unwrap();
        assert_eq!(task.id, reparsed.id);
        assert_eq!(task.blocks, reparsed.blocks);
    }

    #[test]
    fn task_internal_flag() {
        let json = r#"{
            "id": "99",
            "subject": "bookkeeping",
            "status": "pending",
            "metadata": {"_internal": true}
        }"#;
        let task: TaskRecord = serde_json::from_str(json).unwrap();
        assert!(task.is_internal());
    }

    #[test]
    fn task_non_numeric_id_sorts_last() {
        let json = r#"{"id": "abc", "subject": "x", "status": "pending"}"#;
        let task: TaskRecord = serde_json::from_str(json).unwrap();
        assert_eq!(task.numeric_id(), i64::MAX);
    }

    #[test]
    fn task_missing_id_rejected() {
        let json = r#"{"subject": "x", "status": "pending"}"#;
        assert!(serde_json::from_str::<TaskRecord>(json).is_err());
    }
}

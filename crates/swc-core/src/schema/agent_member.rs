//! Agent member schema for the team roster

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Agent member in a team's config roster.
///
/// Only the fields surfaced by viewers and the Markdown export are typed;
/// spawn-time details (prompts, pane ids, working directories) stay in
/// `unknown_fields`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMember {
    /// Agent instance name (unique within the team)
    pub name: String,

    /// Agent capability type (e.g., "general-purpose", "code-reviewer")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,

    /// Model identifier the agent runs on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// UI color code (e.g., "blue", "green")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Unix timestamp in milliseconds when the agent joined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<u64>,

    /// Whether the agent is currently running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

//! Team configuration schema

use super::AgentMember;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Team configuration blob.
///
/// Stored at `~/.claude/teams/{team_name}/config.json`. The blob is
/// free-form; only the fields the console displays are typed, everything
/// else rides along in `unknown_fields`. A team directory without a readable
/// config is treated as not-yet-initialized and skipped by the scanner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamConfig {
    /// Team name as recorded in the config (the directory name is canonical)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Human-readable team purpose
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Unix timestamp in milliseconds when the team was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,

    /// Member roster (team lead first, by convention)
    #[serde(default)]
    pub members: Vec<AgentMember>,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

//! Session listing schema and the optional per-project session index

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One session in the snapshot's session list.
///
/// Built by session discovery from either the per-project index or a direct
/// transcript parse. Side-chain sessions never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Session id (transcript file stem, or the id recorded in the lines)
    pub session_id: String,

    /// Short display title derived from the first prompt
    pub summary: String,

    /// First informative user prompt, clipped
    pub first_prompt: String,

    /// Count of user + assistant transcript lines
    pub message_count: usize,

    /// ISO 8601 creation time, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    /// ISO 8601 last-modified time, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,

    /// Project working directory
    pub project_path: String,

    /// Git branch recorded in the transcript
    pub git_branch: String,

    /// Modified within the recency window, or holding a lock marker
    pub is_active: bool,

    /// Absolute path of the transcript file
    pub jsonl_path: PathBuf,
}

/// Parsed `sessions-index.json`: a cache of session metadata maintained by
/// the tooling that writes the transcripts. Entirely optional; discovery
/// falls back to parsing transcripts directly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIndex {
    #[serde(default)]
    pub entries: Vec<SessionIndexEntry>,

    /// Original project path before filesystem-safe encoding
    #[serde(default)]
    pub original_path: Option<String>,
}

/// One cached entry in `sessions-index.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIndexEntry {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub first_prompt: Option<String>,
    #[serde(default)]
    pub message_count: Option<usize>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub is_sidechain: Option<bool>,
}

//! Session discovery and liveness.
//!
//! Each project directory under `~/.claude/projects/` holds one `.jsonl`
//! transcript per coding session, plus an optional `sessions-index.json`
//! cache of per-session metadata. Discovery prefers the cache and falls back
//! to parsing a bounded transcript prefix; both paths flow through
//! [`resolve_session_metadata`]. Side-chain sessions (sub-agent-internal
//! transcripts) are excluded entirely.

pub mod tail;

use crate::home::ClaudeDirs;
use crate::reader::read_json;
use crate::schema::{SessionIndex, SessionIndexEntry, SessionInfo};
use crate::text::clip_chars;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// A transcript counts as active while its last write is this recent.
pub const ACTIVE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// How many leading transcript lines are parsed for header metadata.
const HEADER_SCAN_LINES: usize = 40;

const FIRST_PROMPT_CHARS: usize = 120;
const SUMMARY_CHARS: usize = 100;

/// Header metadata recovered from a transcript's leading lines, plus the
/// whole-file message count.
#[derive(Debug, Clone, Default)]
pub struct TranscriptHeader {
    pub session_id: String,
    pub first_prompt: String,
    pub project_path: String,
    pub git_branch: String,
    pub is_sidechain: bool,
    pub message_count: usize,
}

/// Whether a user prompt carries no information worth displaying.
fn is_noise_prompt(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.starts_with("[Request interrupted")
}

/// Derive a short display title from a prompt.
///
/// A markdown heading anywhere in the prompt wins; otherwise the first
/// informative line, clipped.
pub fn derive_summary(text: &str) -> String {
    if text.trim().is_empty() {
        return "Untitled".to_string();
    }
    for line in text.lines() {
        let trimmed = line.trim();
        let heading = trimmed.trim_start_matches('#');
        let starts_with_space = heading.chars().next().is_some_and(char::is_whitespace);
        if heading.len() < trimmed.len() && starts_with_space && !heading.trim().is_empty() {
            return clip_chars(heading.trim(), SUMMARY_CHARS).to_string();
        }
    }
    let first = text
        .lines()
        .map(str::trim)
        .find(|l| !is_noise_prompt(l))
        .unwrap_or(text);
    clip_chars(first, SUMMARY_CHARS).to_string()
}

/// Pull the user-visible text out of a transcript line's `message` field.
/// Content is either a bare string or an array of typed blocks.
fn extract_user_text(obj: &Value) -> String {
    let Some(content) = obj.get("message").and_then(|m| m.get("content")) else {
        return String::new();
    };
    match content {
        Value::String(s) => s.trim().to_string(),
        Value::Array(blocks) => blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string(),
        _ => String::new(),
    }
}

/// Parse a transcript's leading lines for header metadata and count its
/// user/assistant lines. Returns `None` when the file cannot be read.
pub fn extract_transcript_header(jsonl_path: &Path) -> Option<TranscriptHeader> {
    let raw = fs::read_to_string(jsonl_path).ok()?;
    let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();

    let mut header = TranscriptHeader::default();
    for line in lines.iter().take(HEADER_SCAN_LINES) {
        let Ok(obj) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if header.session_id.is_empty() {
            if let Some(id) = obj.get("sessionId").and_then(Value::as_str) {
                header.session_id = id.to_string();
            }
        }
        if obj.get("isSidechain").and_then(Value::as_bool) == Some(true) {
            header.is_sidechain = true;
        }
        if header.project_path.is_empty() {
            if let Some(cwd) = obj.get("cwd").and_then(Value::as_str) {
                header.project_path = cwd.to_string();
            }
        }
        if header.git_branch.is_empty() {
            if let Some(branch) = obj.get("gitBranch").and_then(Value::as_str) {
                header.git_branch = branch.to_string();
            }
        }
        if header.first_prompt.is_empty() && obj.get("type").and_then(Value::as_str) == Some("user")
        {
            let text = extract_user_text(&obj);
            if !is_noise_prompt(&text) {
                header.first_prompt = clip_chars(&text, FIRST_PROMPT_CHARS).to_string();
            }
        }
    }

    header.message_count = lines
        .iter()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(|obj| {
            matches!(
                obj.get("type").and_then(Value::as_str),
                Some("user") | Some("assistant")
            )
        })
        .count();

    Some(header)
}

/// Resolve one session's metadata, preferring a cached index entry over a
/// fresh transcript parse. Returns `None` for side-chain sessions and for
/// transcripts that cannot be read at all. Liveness is the caller's concern;
/// `is_active` starts out false.
pub fn resolve_session_metadata(
    jsonl_path: &Path,
    fallback_id: &str,
    cached: Option<&SessionIndexEntry>,
    index_original_path: Option<&str>,
    file_mtime: Option<&str>,
) -> Option<SessionInfo> {
    if let Some(entry) = cached {
        if entry.is_sidechain == Some(true) {
            return None;
        }
        let first_prompt = entry.first_prompt.clone().unwrap_or_default();
        return Some(SessionInfo {
            session_id: fallback_id.to_string(),
            summary: entry
                .summary
                .clone()
                .unwrap_or_else(|| derive_summary(&first_prompt)),
            first_prompt,
            message_count: entry.message_count.unwrap_or(0),
            created: entry.created.clone(),
            modified: entry
                .modified
                .clone()
                .or_else(|| file_mtime.map(str::to_string)),
            project_path: entry
                .project_path
                .clone()
                .or_else(|| index_original_path.map(str::to_string))
                .unwrap_or_default(),
            git_branch: entry.git_branch.clone().unwrap_or_default(),
            is_active: false,
            jsonl_path: jsonl_path.to_path_buf(),
        });
    }

    let header = extract_transcript_header(jsonl_path)?;
    if header.is_sidechain {
        return None;
    }
    let session_id = if header.session_id.is_empty() {
        fallback_id.to_string()
    } else {
        header.session_id
    };
    let project_path = if header.project_path.is_empty() {
        index_original_path.unwrap_or_default().to_string()
    } else {
        header.project_path
    };
    Some(SessionInfo {
        session_id,
        summary: derive_summary(&header.first_prompt),
        first_prompt: header.first_prompt,
        message_count: header.message_count,
        created: file_mtime.map(str::to_string),
        modified: file_mtime.map(str::to_string),
        project_path,
        git_branch: header.git_branch,
        is_active: false,
        jsonl_path: jsonl_path.to_path_buf(),
    })
}

/// Discover all sessions under the projects root.
///
/// A session is active when its transcript was modified within
/// [`ACTIVE_WINDOW`] or a sibling lock marker exists at
/// `tasks/<session_id>/.lock`. Active sessions sort first, then by
/// last-modified descending.
pub fn scan_sessions(dirs: &ClaudeDirs) -> Vec<SessionInfo> {
    let mut sessions = Vec::new();
    let Ok(projects) = fs::read_dir(&dirs.projects) else {
        return sessions;
    };

    for project in projects.flatten() {
        let proj_path = project.path();
        if !proj_path.is_dir() {
            continue;
        }

        let index: Option<SessionIndex> = read_json(&proj_path.join("sessions-index.json"));
        let original_path = index.as_ref().and_then(|i| i.original_path.as_deref());

        let Ok(files) = fs::read_dir(&proj_path) else {
            continue;
        };
        let mut seen: HashSet<String> = HashSet::new();
        for file in files.flatten() {
            let jsonl_path = file.path();
            if jsonl_path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = jsonl_path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !seen.insert(stem.to_string()) {
                continue;
            }

            let Ok(meta) = fs::metadata(&jsonl_path) else {
                continue;
            };
            let mtime = meta.modified().ok();
            let mtime_iso = mtime.map(iso_time);
            let recently_modified = mtime
                .and_then(|t| SystemTime::now().duration_since(t).ok())
                .is_some_and(|age| age < ACTIVE_WINDOW);
            let has_lock = dirs.tasks.join(stem).join(".lock").exists();

            let cached = index
                .as_ref()
                .and_then(|i| i.entries.iter().find(|e| e.session_id.as_deref() == Some(stem)));

            if let Some(mut session) = resolve_session_metadata(
                &jsonl_path,
                stem,
                cached,
                original_path,
                mtime_iso.as_deref(),
            ) {
                session.is_active = recently_modified || has_lock;
                sessions.push(session);
            }
        }
    }

    sort_sessions(&mut sessions);
    sessions
}

/// Active sessions first, then most recently modified.
fn sort_sessions(sessions: &mut [SessionInfo]) {
    sessions.sort_by(|a, b| {
        b.is_active
            .cmp(&a.is_active)
            .then_with(|| b.modified.cmp(&a.modified))
    });
}

fn iso_time(t: SystemTime) -> String {
    DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Millis, true)
}

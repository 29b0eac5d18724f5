//! Archival store for disappeared teams.
//!
//! When a team that was live in the previous scan vanishes from the current
//! one, its last-known state is persisted as an immutable record under the
//! history directory. Records are never mutated after creation; re-archival
//! produces a new timestamped filename and cannot corrupt existing entries.

use crate::reader::read_json;
use crate::snapshot::Team;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from archival writes.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Failed to create or write under the history directory
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize the archive record
    #[error("Failed to serialize archive record for team {team}: {source}")]
    Serialize {
        team: String,
        source: serde_json::Error,
    },
}

/// Lightweight index entry for one archived record.
///
/// Extracted without keeping message bodies in memory longer than the
/// listing pass itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Archive filename (`<team>--<timestamp>.json`)
    pub file: String,
    /// Team name
    pub name: String,
    /// ISO 8601 archival time, absent for records written by older versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<String>,
    /// Team description at archival time
    pub description: String,
    /// Roster size at archival time
    pub agent_count: usize,
    /// Visible task count at archival time
    pub task_count: usize,
}

/// The full on-disk archive record: the team plus its archival time.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArchiveRecord<'a> {
    #[serde(flatten)]
    team: &'a Team,
    archived_at: String,
}

/// Persist `team` as a new immutable history record.
///
/// The filename combines the team name with an ISO timestamp whose
/// filesystem-unsafe characters (`:`, `.`) are replaced by dashes, so
/// repeated archival of the same name never collides.
///
/// # Errors
///
/// Returns [`HistoryError`] when the directory cannot be created or the
/// record cannot be written.
pub fn archive(history_dir: &Path, team: &Team) -> Result<PathBuf, HistoryError> {
    fs::create_dir_all(history_dir).map_err(|e| HistoryError::Io {
        path: history_dir.to_path_buf(),
        source: e,
    })?;

    let archived_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let file_stamp = archived_at.replace([':', '.'], "-");
    let path = history_dir.join(format!("{}--{}.json", team.name, file_stamp));

    let record = ArchiveRecord { team, archived_at };
    let json = serde_json::to_string_pretty(&record).map_err(|e| HistoryError::Serialize {
        team: team.name.clone(),
        source: e,
    })?;
    fs::write(&path, json).map_err(|e| HistoryError::Io {
        path: path.clone(),
        source: e,
    })?;
    Ok(path)
}

/// List all archived records as lightweight index entries, most recently
/// archived first; entries without a timestamp sort last. Unreadable records
/// are skipped.
pub fn list(history_dir: &Path) -> Vec<HistoryEntry> {
    let mut entries = Vec::new();
    let Ok(dir) = fs::read_dir(history_dir) else {
        return entries;
    };
    for entry in dir.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(data) = read_json::<Value>(&path) else {
            continue;
        };
        let Some(name) = data.get("name").and_then(Value::as_str) else {
            continue;
        };
        let Some(file) = path.file_name().and_then(|f| f.to_str()) else {
            continue;
        };
        entries.push(HistoryEntry {
            file: file.to_string(),
            name: name.to_string(),
            archived_at: data
                .get("archivedAt")
                .and_then(Value::as_str)
                .map(str::to_string),
            description: data
                .get("config")
                .and_then(|c| c.get("description"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            agent_count: data
                .get("config")
                .and_then(|c| c.get("members"))
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
            task_count: data
                .get("tasks")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
        });
    }
    // most recent first; missing timestamps last
    entries.sort_by(|a, b| match (&b.archived_at, &a.archived_at) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (None, None) => std::cmp::Ordering::Equal,
    });
    entries
}

/// Load one archived record verbatim by filename.
///
/// The name is reduced to its basename before the lookup, so a traversal
/// attempt like `../../etc/passwd` resolves inside the history directory or
/// not at all. Unknown files read as `None`.
pub fn load(history_dir: &Path, file_name: &str) -> Option<Value> {
    let base = Path::new(file_name).file_name()?;
    read_json(&history_dir.join(base))
}

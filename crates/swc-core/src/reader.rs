//! Tolerant on-disk record reading.
//!
//! Every function here returns `Option`/empty on failure: a missing file,
//! an empty file, malformed JSON, or a record of the wrong shape all read as
//! "no data", so one corrupt record can never abort a scan. Nothing in this
//! module writes.

use crate::home::ClaudeDirs;
use crate::schema::{InboxMessage, TaskRecord, TeamConfig};
use crate::snapshot::Team;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read and parse a JSON file, normalizing every failure to `None`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = fs::read_to_string(path).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Skipping malformed JSON at {}: {}", path.display(), e);
            None
        }
    }
}

/// Scan one team directory into a [`Team`].
///
/// Returns `None` when the team has no readable `config.json` (treated as
/// not-yet-initialized). Task and inbox records that fail to parse are
/// dropped individually.
pub fn scan_team(dirs: &ClaudeDirs, team_name: &str) -> Option<Team> {
    let config: TeamConfig = read_json(&dirs.teams.join(team_name).join("config.json"))?;

    Some(Team {
        name: team_name.to_string(),
        tasks: read_tasks(&dirs.tasks.join(team_name)),
        inboxes: read_inboxes(&dirs.teams.join(team_name).join("inboxes")),
        config,
    })
}

/// Read all task records under `tasks_dir`, excluding internal tasks,
/// sorted ascending by numeric id.
pub fn read_tasks(tasks_dir: &Path) -> Vec<TaskRecord> {
    let mut tasks: Vec<TaskRecord> = json_files(tasks_dir)
        .filter_map(|path| read_json::<TaskRecord>(&path))
        .filter(|task| !task.is_internal())
        .collect();
    tasks.sort_by_key(|t| t.numeric_id());
    tasks
}

/// Read every inbox under `inbox_dir`, keyed by agent name (file stem).
///
/// Message order is preserved exactly as stored; bodies are classified here,
/// once, so downstream consumers never re-sniff text.
pub fn read_inboxes(inbox_dir: &Path) -> BTreeMap<String, Vec<InboxMessage>> {
    let mut inboxes = BTreeMap::new();
    for path in json_files(inbox_dir) {
        let Some(agent) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some(mut messages) = read_json::<Vec<InboxMessage>>(&path) {
            for msg in &mut messages {
                msg.classify_body();
            }
            inboxes.insert(agent.to_string(), messages);
        }
    }
    inboxes
}

/// Iterate the `.json` files directly under `dir`, sorted by name for
/// deterministic scans. A missing or unreadable directory yields nothing.
fn json_files(dir: &Path) -> impl Iterator<Item = std::path::PathBuf> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    paths.sort();
    paths.into_iter()
}

//! Full-state snapshot assembly.
//!
//! A [`Snapshot`] is the complete in-memory mirror of on-disk swarm state at
//! one instant. It is rebuilt from scratch on every scan and replaced as a
//! unit, so readers never observe a half-updated snapshot. Team
//! disappearance between consecutive scans triggers archival of the
//! last-known team data.

use crate::history;
use crate::home::ClaudeDirs;
use crate::reader;
use crate::schema::{InboxMessage, SessionInfo, TaskRecord, TeamConfig};
use crate::session;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use tracing::{info, warn};

/// One team's live state: config, task board, and agent inboxes.
///
/// Replaced wholesale on every scan; the new value supersedes the old by
/// name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Team name (canonical: the directory name under the teams root)
    pub name: String,
    /// Configuration blob
    pub config: TeamConfig,
    /// Visible tasks, ascending by numeric id
    pub tasks: Vec<TaskRecord>,
    /// Agent name → inbox, message order as stored
    pub inboxes: BTreeMap<String, Vec<InboxMessage>>,
}

impl Team {
    /// Total number of messages across all inboxes.
    pub fn message_count(&self) -> usize {
        self.inboxes.values().map(Vec::len).sum()
    }
}

/// The aggregate mirror: all teams, sessions, and archival history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Team name → team state
    pub teams: BTreeMap<String, Team>,
    /// Discovered sessions, active first then most recently modified
    pub sessions: Vec<SessionInfo>,
    /// Archived team index, most recent first
    pub history: Vec<history::HistoryEntry>,
    /// Epoch milliseconds when this snapshot was built
    pub timestamp: i64,
}

impl Snapshot {
    /// Look up a session by id.
    pub fn find_session(&self, session_id: &str) -> Option<&SessionInfo> {
        self.sessions.iter().find(|s| s.session_id == session_id)
    }
}

/// Build a full snapshot of the on-disk state.
///
/// Every teams-root subdirectory with a readable config becomes exactly one
/// [`Team`]. Names present in `previous` but absent from the new scan are
/// archived with their last-known data before being discarded. Sessions and
/// history are rebuilt independently. Single-record parse failures drop that
/// record only; they never abort the build.
pub fn build_snapshot(dirs: &ClaudeDirs, previous: &Snapshot) -> Snapshot {
    let mut teams = BTreeMap::new();
    if let Ok(entries) = fs::read_dir(&dirs.teams) {
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Some(team) = reader::scan_team(dirs, &name) {
                teams.insert(name, team);
            }
        }
    }

    archive_missing(dirs, previous, &teams);

    Snapshot {
        teams,
        sessions: session::scan_sessions(dirs),
        history: history::list(&dirs.history),
        timestamp: chrono::Utc::now().timestamp_millis(),
    }
}

/// Archive every team that was live in `previous` but is absent from the
/// current scan.
fn archive_missing(dirs: &ClaudeDirs, previous: &Snapshot, current: &BTreeMap<String, Team>) {
    for (name, team) in &previous.teams {
        if current.contains_key(name) {
            continue;
        }
        match history::archive(&dirs.history, team) {
            Ok(path) => info!("Archived team \"{}\" -> {}", name, path.display()),
            Err(e) => warn!("Failed to archive team \"{}\": {}", name, e),
        }
    }
}

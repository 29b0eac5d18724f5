//! Core types and scanning logic for swarm-console.
//!
//! This crate mirrors the file-based agent team API at `~/.claude/` into an
//! in-memory [`snapshot::Snapshot`]: team configurations, task boards, agent
//! inboxes, archived team history, and live coding-session transcripts.
//!
//! Everything here is read-only with respect to live state: the filesystem
//! is the single source of truth and the only write this crate ever performs
//! is archiving a disappeared team into the history directory. Parsing is
//! deliberately tolerant: one corrupt record is dropped, never allowed to
//! abort a scan.

pub mod export;
pub mod history;
pub mod home;
pub mod logging;
pub mod reader;
pub mod schema;
pub mod session;
pub mod snapshot;
pub mod text;

pub use schema::{
    AgentMember, InboxMessage, MessageBody, SessionInfo, TaskRecord, TaskStatus, TeamConfig,
};
pub use snapshot::{Snapshot, Team, build_snapshot};

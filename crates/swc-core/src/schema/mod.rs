//! On-disk record schemas for the file-based agent team API.
//!
//! All schema types preserve unknown fields for forward compatibility and
//! use the camelCase wire naming of the files under `~/.claude/`.

pub mod agent_member;
pub mod inbox_message;
pub mod session;
pub mod task;
pub mod team_config;

pub use agent_member::AgentMember;
pub use inbox_message::{InboxMessage, MessageBody};
pub use session::{SessionIndex, SessionIndexEntry, SessionInfo};
pub use task::{TaskRecord, TaskStatus};
pub use team_config::TeamConfig;

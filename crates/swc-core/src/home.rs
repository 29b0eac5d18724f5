//! Canonical directory resolution for swarm-console.
//!
//! All scanning roots hang off a single Claude home directory, normally
//! `~/.claude`. The `SWARM_CONSOLE_HOME` environment variable overrides the
//! home directory for tests and custom deployments.
//!
//! # Precedence
//!
//! 1. `SWARM_CONSOLE_HOME` environment variable (if set and non-empty)
//! 2. `dirs::home_dir()` platform default

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Get the home directory for swarm-console operations.
///
/// # Errors
///
/// Returns an error if `SWARM_CONSOLE_HOME` is not set and the platform home
/// directory cannot be determined.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("SWARM_CONSOLE_HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }
    dirs::home_dir().context("Could not determine home directory")
}

/// The four scanning roots under the Claude home directory.
///
/// `teams` and `tasks` feed the state pipeline, `projects` feeds the
/// transcript pipeline, and `history` receives archived teams.
#[derive(Debug, Clone)]
pub struct ClaudeDirs {
    /// The `~/.claude` root itself (watched as a fallback when the team and
    /// task roots do not exist yet).
    pub claude_root: PathBuf,
    /// `~/.claude/teams`: one subdirectory per team.
    pub teams: PathBuf,
    /// `~/.claude/tasks`: task records per team, lock markers per session.
    pub tasks: PathBuf,
    /// `~/.claude/swarm-history`: archived team records.
    pub history: PathBuf,
    /// `~/.claude/projects`: session transcripts grouped by project.
    pub projects: PathBuf,
}

impl ClaudeDirs {
    /// Resolve the scanning roots from the user's home directory.
    pub fn resolve() -> Result<Self> {
        Ok(Self::from_claude_root(get_home_dir()?.join(".claude")))
    }

    /// Build the scanning roots from an explicit Claude root directory.
    pub fn from_claude_root(claude_root: PathBuf) -> Self {
        Self {
            teams: claude_root.join("teams"),
            tasks: claude_root.join("tasks"),
            history: claude_root.join("swarm-history"),
            projects: claude_root.join("projects"),
            claude_root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_home_override_set() {
        let original = env::var("SWARM_CONSOLE_HOME").ok();
        unsafe { env::set_var("SWARM_CONSOLE_HOME", "/custom/home") };

        let home = get_home_dir().unwrap();
        assert_eq!(home, PathBuf::from("/custom/home"));

        unsafe {
            match original {
                Some(v) => env::set_var("SWARM_CONSOLE_HOME", v),
                None => env::remove_var("SWARM_CONSOLE_HOME"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_home_override_empty_uses_platform_default() {
        let original = env::var("SWARM_CONSOLE_HOME").ok();
        unsafe { env::set_var("SWARM_CONSOLE_HOME", "  ") };

        let home = get_home_dir().unwrap();
        assert_eq!(home, dirs::home_dir().unwrap());

        unsafe {
            match original {
                Some(v) => env::set_var("SWARM_CONSOLE_HOME", v),
                None => env::remove_var("SWARM_CONSOLE_HOME"),
            }
        }
    }

    #[test]
    fn test_claude_dirs_layout() {
        let dirs = ClaudeDirs::from_claude_root(PathBuf::from("/tmp/claude"));
        assert_eq!(dirs.teams, PathBuf::from("/tmp/claude/teams"));
        assert_eq!(dirs.tasks, PathBuf::from("/tmp/claude/tasks"));
        assert_eq!(dirs.history, PathBuf::from("/tmp/claude/swarm-history"));
        assert_eq!(dirs.projects, PathBuf::from("/tmp/claude/projects"));
        assert_eq!(dirs.claude_root, PathBuf::from("/tmp/claude"));
    }
}

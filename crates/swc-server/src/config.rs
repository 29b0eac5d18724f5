//! Server configuration resolution.
//!
//! Precedence, highest first: CLI flags, then an optional TOML config file
//! (`~/.claude/swarm-console.toml` unless `--config` points elsewhere), then
//! built-in defaults. A missing config file is normal; a malformed one is
//! logged and ignored rather than fatal.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_PORT: u16 = 3333;
pub const DEFAULT_STATE_DEBOUNCE_MS: u64 = 200;
pub const DEFAULT_TRANSCRIPT_DEBOUNCE_MS: u64 = 300;

/// Raw config file contents; every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    port: Option<u16>,
    state_debounce_ms: Option<u64>,
    transcript_debounce_ms: Option<u64>,
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port for the HTTP/WebSocket listener
    pub port: u16,
    /// Debounce window for the state pipeline
    pub state_debounce_ms: u64,
    /// Debounce window for the transcript pipeline
    pub transcript_debounce_ms: u64,
}

/// Overrides gathered from the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub port: Option<u16>,
}

fn load_file(path: &Path) -> FileConfig {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return FileConfig::default();
    };
    match toml::from_str(&raw) {
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring malformed config {}: {}", path.display(), e);
            FileConfig::default()
        }
    }
}

/// Resolve the effective configuration.
pub fn resolve_config(overrides: &ConfigOverrides, claude_root: &Path) -> ServerConfig {
    let path = overrides
        .config_path
        .clone()
        .unwrap_or_else(|| claude_root.join("swarm-console.toml"));
    let file = load_file(&path);

    ServerConfig {
        port: overrides.port.or(file.port).unwrap_or(DEFAULT_PORT),
        state_debounce_ms: file.state_debounce_ms.unwrap_or(DEFAULT_STATE_DEBOUNCE_MS),
        transcript_debounce_ms: file
            .transcript_debounce_ms
            .unwrap_or(DEFAULT_TRANSCRIPT_DEBOUNCE_MS),
    }
}

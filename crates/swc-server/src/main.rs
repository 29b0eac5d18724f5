//! swarm-console server: mirrors on-disk swarm state and streams it to
//! viewers over HTTP and WebSocket.

mod config;
mod hub;
mod routes;
mod watcher;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use swarm_console_core::home::ClaudeDirs;
use swarm_console_core::snapshot::{Snapshot, build_snapshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::hub::Hub;

/// Live dashboard server for on-disk agent swarm state
#[derive(Parser, Debug)]
#[command(name = "swarm-console")]
#[command(about = "Watches agent team state and streams it to viewers")]
#[command(version)]
struct Args {
    /// TCP port to listen on (default 3333)
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,

    /// Claude root directory to mirror (default: ~/.claude)
    #[arg(long, value_name = "PATH")]
    claude_dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        swarm_console_core::logging::init_with_level(tracing::Level::DEBUG);
    } else {
        swarm_console_core::logging::init();
    }

    let dirs = match args.claude_dir {
        Some(root) => ClaudeDirs::from_claude_root(root),
        None => ClaudeDirs::resolve().context("Failed to resolve Claude directory")?,
    };
    info!("Mirroring {}", dirs.claude_root.display());

    let overrides = config::ConfigOverrides {
        config_path: args.config,
        port: args.port,
    };
    let server_config = config::resolve_config(&overrides, &dirs.claude_root);

    // first scan happens before the listener comes up, so the first viewer
    // always receives a populated snapshot
    let scan_dirs = dirs.clone();
    let initial = tokio::task::spawn_blocking(move || {
        build_snapshot(&scan_dirs, &Snapshot::default())
    })
    .await
    .context("Initial scan panicked")?;

    let active = initial.sessions.iter().filter(|s| s.is_active).count();
    info!(
        "{} team(s), {} session(s) ({} active)",
        initial.teams.len(),
        initial.sessions.len(),
        active
    );

    let hub = Arc::new(Hub::new(dirs.clone(), initial));
    let cancel = CancellationToken::new();

    let state_task = tokio::spawn(watcher::run_state_pipeline(
        dirs.clone(),
        hub.clone(),
        Duration::from_millis(server_config.state_debounce_ms),
        cancel.clone(),
    ));
    let transcript_task = tokio::spawn(watcher::run_transcript_pipeline(
        dirs.clone(),
        hub.clone(),
        Duration::from_millis(server_config.transcript_debounce_ms),
        cancel.clone(),
    ));

    let app = routes::router(hub);
    let addr = format!("127.0.0.1:{}", server_config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{addr}");

    let shutdown_cancel = cancel.clone();
    let shutdown = async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
        shutdown_cancel.cancel();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    cancel.cancel();
    for (name, task) in [("state", state_task), ("transcript", transcript_task)] {
        match tokio::time::timeout(Duration::from_secs(5), task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => error!("{name} pipeline failed: {e}"),
            Ok(Err(e)) => error!("{name} pipeline panicked: {e}"),
            Err(_) => error!("{name} pipeline did not stop in time"),
        }
    }

    info!("swarm-console stopped");
    Ok(())
}

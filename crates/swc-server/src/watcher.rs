//! Filesystem change watching with debounced re-scan scheduling.
//!
//! Two independent pipelines share one shape: a notify watcher feeds raw
//! events through a std mpsc channel into a blocking forwarder task, which
//! filters them and ticks a tokio channel; an async loop turns ticks into a
//! debounced scan. The debounce is an explicit idle/pending value; every
//! tick RESETS the deadline, so a steady stream of writes defers the scan
//! until activity settles, and a burst of events coalesces into one scan.
//! Scans are awaited inline in the loop, which keeps them strictly
//! sequential within a pipeline. No ordering holds between the two
//! pipelines.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::CreateKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;
use tokio::time::Instant;
use swarm_console_core::home::ClaudeDirs;
use swarm_console_core::session::scan_sessions;
use swarm_console_core::snapshot::build_snapshot;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::hub::Hub;

/// Debounce timer for one pipeline: idle, or pending until a deadline.
///
/// `trigger` always replaces the deadline (a reset, not an extension), which
/// is the only cancellation primitive in the model: it discards the pending
/// scan in favor of a fresh one.
#[derive(Debug)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Enter (or re-enter) the pending state with a fresh deadline.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// The pending deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Leave the pending state. Called when the deadline fires.
    pub fn clear(&mut self) {
        self.deadline = None;
    }
}

/// Whether an event should schedule a state re-scan: `.json` records under
/// the teams/tasks roots, or a new directory appearing (a fresh team or task
/// board).
pub fn is_state_event(event: &Event) -> bool {
    if matches!(event.kind, EventKind::Create(CreateKind::Folder)) {
        return true;
    }
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return false;
    }
    event.paths.iter().any(|p| has_extension(p, "json"))
}

/// Whether an event should schedule a session refresh: transcript appends or
/// session-index rewrites.
pub fn is_transcript_event(event: &Event) -> bool {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return false;
    }
    event.paths.iter().any(|p| {
        has_extension(p, "jsonl")
            || p.file_name().and_then(|f| f.to_str()) == Some("sessions-index.json")
    })
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

/// Build a notify watcher feeding a std channel, watching every root that
/// exists. Returns `None` when nothing can be watched yet.
fn start_watcher(roots: &[&Path]) -> Result<Option<(RecommendedWatcher, Receiver<Event>)>> {
    let (tx, rx) = channel();
    let mut watcher: RecommendedWatcher =
        notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => {
                error!("File system watcher error: {}", e);
            }
        })
        .context("Failed to create file system watcher")?;

    let mut watching = false;
    for root in roots {
        if !root.exists() {
            continue;
        }
        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;
        info!("Watching {}", root.display());
        watching = true;
    }
    if !watching {
        return Ok(None);
    }
    Ok(Some((watcher, rx)))
}

/// Forward filtered watch events from the std channel as ticks on a tokio
/// channel, from a blocking task.
fn spawn_forwarder(
    raw_rx: Receiver<Event>,
    filter: fn(&Event) -> bool,
    tick_tx: mpsc::Sender<()>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            // recv_timeout keeps the cancellation check responsive
            match raw_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => {
                    if filter(&event) {
                        debug!("Relevant file system event: {:?}", event.kind);
                        if tick_tx.blocking_send(()).is_err() {
                            break;
                        }
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    })
}

/// One debounce loop: turn ticks into scans until cancelled.
async fn debounce_loop<F, Fut>(
    mut tick_rx: mpsc::Receiver<()>,
    delay: Duration,
    cancel: CancellationToken,
    mut scan: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut debounce = Debounce::new(delay);
    loop {
        let deadline = debounce.deadline();
        tokio::select! {
            _ = cancel.cancelled() => break,
            tick = tick_rx.recv() => match tick {
                Some(()) => debounce.trigger(Instant::now()),
                None => break,
            },
            _ = sleep_until(deadline), if deadline.is_some() => {
                debounce.clear();
                // awaited inline: the next scan cannot start while this one
                // is in flight
                scan().await;
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Run the state pipeline: watch the teams and tasks roots for `.json`
/// changes and rebuild the full snapshot after each debounce window.
pub async fn run_state_pipeline(
    dirs: ClaudeDirs,
    hub: Arc<Hub>,
    debounce: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let roots: Vec<&Path> = vec![&dirs.teams, &dirs.tasks];
    let started = match start_watcher(&roots)? {
        Some(pair) => Some(pair),
        None => {
            // neither root exists yet; fall back to the claude root so team
            // creation is still observed
            warn!(
                "No teams/tasks directories found yet; watching {}",
                dirs.claude_root.display()
            );
            start_watcher(&[&dirs.claude_root])?
        }
    };
    let Some((_watcher, raw_rx)) = started else {
        warn!("Nothing to watch for the state pipeline; it stays idle");
        cancel.cancelled().await;
        return Ok(());
    };

    let (tick_tx, tick_rx) = mpsc::channel(64);
    let forwarder = spawn_forwarder(raw_rx, is_state_event, tick_tx, cancel.clone());

    let scan_dirs = dirs.clone();
    let scan_hub = hub.clone();
    debounce_loop(tick_rx, debounce, cancel.clone(), move || {
        let dirs = scan_dirs.clone();
        let hub = scan_hub.clone();
        async move {
            let previous = hub.current().await;
            let snapshot =
                tokio::task::spawn_blocking(move || build_snapshot(&dirs, &previous)).await;
            match snapshot {
                Ok(snapshot) => {
                    debug!(
                        "State scan complete: {} team(s), {} session(s)",
                        snapshot.teams.len(),
                        snapshot.sessions.len()
                    );
                    hub.replace(snapshot).await;
                }
                Err(e) => error!("State scan task panicked: {}", e),
            }
        }
    })
    .await;

    forwarder.await.context("State forwarder task panicked")?;
    Ok(())
}

/// Run the transcript pipeline: watch the projects root for `.jsonl` and
/// session-index changes; each firing refreshes session liveness/metadata
/// (not a full team re-scan) and then tails every subscribed session.
pub async fn run_transcript_pipeline(
    dirs: ClaudeDirs,
    hub: Arc<Hub>,
    debounce: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let Some((_watcher, raw_rx)) = start_watcher(&[&dirs.projects])? else {
        warn!(
            "Projects directory {} does not exist; transcript pipeline stays idle",
            dirs.projects.display()
        );
        cancel.cancelled().await;
        return Ok(());
    };

    let (tick_tx, tick_rx) = mpsc::channel(64);
    let forwarder = spawn_forwarder(raw_rx, is_transcript_event, tick_tx, cancel.clone());

    let scan_dirs = dirs.clone();
    let scan_hub = hub.clone();
    debounce_loop(tick_rx, debounce, cancel.clone(), move || {
        let dirs = scan_dirs.clone();
        let hub = scan_hub.clone();
        async move {
            let sessions = tokio::task::spawn_blocking(move || scan_sessions(&dirs)).await;
            match sessions {
                Ok(sessions) => {
                    debug!("Session refresh complete: {} session(s)", sessions.len());
                    hub.update_sessions(sessions).await;
                    hub.broadcast_session_updates().await;
                }
                Err(e) => error!("Session refresh task panicked: {}", e),
            }
        }
    })
    .await;

    forwarder.await.context("Transcript forwarder task panicked")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, ModifyKind, RemoveKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        Event {
            kind,
            paths: paths.iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    #[test]
    fn state_filter_accepts_json_changes() {
        let ev = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            &["/root/.claude/teams/alpha/config.json"],
        );
        assert!(is_state_event(&ev));

        let ev = event(
            EventKind::Remove(RemoveKind::File),
            &["/root/.claude/tasks/alpha/1.json"],
        );
        assert!(is_state_event(&ev));
    }

    #[test]
    fn state_filter_accepts_new_directories() {
        let ev = event(
            EventKind::Create(CreateKind::Folder),
            &["/root/.claude/teams/new-team"],
        );
        assert!(is_state_event(&ev));
    }

    #[test]
    fn state_filter_rejects_other_files_and_kinds() {
        let ev = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            &["/root/.claude/teams/alpha/notes.txt"],
        );
        assert!(!is_state_event(&ev));

        let ev = event(
            EventKind::Access(notify::event::AccessKind::Any),
            &["/root/.claude/teams/alpha/config.json"],
        );
        assert!(!is_state_event(&ev));
    }

    #[test]
    fn transcript_filter_accepts_jsonl_and_index() {
        let ev = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            &["/root/.claude/projects/p/s-1.jsonl"],
        );
        assert!(is_transcript_event(&ev));

        let ev = event(
            EventKind::Create(CreateKind::File),
            &["/root/.claude/projects/p/sessions-index.json"],
        );
        assert!(is_transcript_event(&ev));
    }

    #[test]
    fn transcript_filter_rejects_plain_json() {
        let ev = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            &["/root/.claude/projects/p/other.json"],
        );
        assert!(!is_transcript_event(&ev));
    }

    #[tokio::test]
    async fn debounce_trigger_resets_deadline() {
        let mut debounce = Debounce::new(Duration::from_millis(200));
        assert!(debounce.deadline().is_none());

        let t0 = Instant::now();
        debounce.trigger(t0);
        let first = debounce.deadline().unwrap();

        // a later trigger replaces the deadline rather than keeping it
        let t1 = t0 + Duration::from_millis(150);
        debounce.trigger(t1);
        let second = debounce.deadline().unwrap();
        assert!(second > first);
        assert_eq!(second, t1 + Duration::from_millis(200));

        debounce.clear();
        assert!(debounce.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_ticks_coalesces_into_one_scan() {
        let (tick_tx, tick_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let scans = Arc::new(AtomicUsize::new(0));

        let loop_scans = scans.clone();
        let loop_cancel = cancel.clone();
        let task = tokio::spawn(debounce_loop(
            tick_rx,
            Duration::from_millis(200),
            loop_cancel,
            move || {
                let scans = loop_scans.clone();
                async move {
                    scans.fetch_add(1, Ordering::SeqCst);
                }
            },
        ));

        // rapid burst within one debounce window
        for _ in 0..10 {
            tick_tx.send(()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(scans.load(Ordering::SeqCst), 1);

        // a second isolated tick produces a second scan
        tick_tx.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(scans.load(Ordering::SeqCst), 2);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn steady_writes_defer_the_scan_until_quiet() {
        let (tick_tx, tick_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let scans = Arc::new(AtomicUsize::new(0));

        let loop_scans = scans.clone();
        let task = tokio::spawn(debounce_loop(
            tick_rx,
            Duration::from_millis(200),
            cancel.clone(),
            move || {
                let scans = loop_scans.clone();
                async move {
                    scans.fetch_add(1, Ordering::SeqCst);
                }
            },
        ));

        // ticks every 100ms keep resetting the 200ms deadline
        for _ in 0..8 {
            tick_tx.send(()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(scans.load(Ordering::SeqCst), 0, "scan deferred while busy");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(scans.load(Ordering::SeqCst), 1, "one scan once settled");

        cancel.cancel();
        task.await.unwrap();
    }
}

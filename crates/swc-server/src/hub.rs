//! Broadcast hub: the single owner of live state and viewer connections.
//!
//! The hub holds the current [`Snapshot`], the registry of connected
//! viewers, and the per-session subscription sets with their line cursors.
//! Every mutation of that state happens inside a hub method; nothing hands
//! out a mutable reference. Delivery is fire-and-forget: a send to a closed
//! connection fails silently and the viewer is pruned at that point or on
//! its disconnect, whichever comes first.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use swarm_console_core::home::ClaudeDirs;
use swarm_console_core::schema::SessionInfo;
use swarm_console_core::session::tail::{self, SessionEntry};
use swarm_console_core::snapshot::Snapshot;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, info, warn};

const OUTBOUND_QUEUE: usize = 256;

/// Messages a viewer may send over the live channel. Anything that fails to
/// parse is ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    SubscribeSession { session_id: String },
    #[serde(rename_all = "camelCase")]
    UnsubscribeSession { session_id: String },
}

/// Incremental delta for one subscribed session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionUpdate<'a> {
    r#type: &'static str,
    session_id: &'a str,
    entries: &'a [SessionEntry],
}

/// Per-session subscription state. Cursors live and die with their
/// subscriber sets.
#[derive(Default)]
struct Subscriptions {
    /// Session id to the connections subscribed to it
    subscribers: HashMap<String, HashSet<String>>,
    /// Session id to the last-broadcast line cursor
    cursors: HashMap<String, usize>,
}

impl Subscriptions {
    /// Drop `conn_id` from every session, pruning empty sets and their
    /// cursors.
    fn remove_viewer(&mut self, conn_id: &str) {
        self.subscribers.retain(|session_id, conns| {
            conns.remove(conn_id);
            let keep = !conns.is_empty();
            if !keep {
                self.cursors.remove(session_id);
            }
            keep
        });
    }
}

/// The broadcast hub.
pub struct Hub {
    dirs: ClaudeDirs,
    snapshot: RwLock<Arc<Snapshot>>,
    conn_counter: AtomicU64,
    viewers: RwLock<HashMap<String, mpsc::Sender<Message>>>,
    subscriptions: Mutex<Subscriptions>,
}

impl Hub {
    pub fn new(dirs: ClaudeDirs, initial: Snapshot) -> Self {
        Self {
            dirs,
            snapshot: RwLock::new(Arc::new(initial)),
            conn_counter: AtomicU64::new(0),
            viewers: RwLock::new(HashMap::new()),
            subscriptions: Mutex::new(Subscriptions::default()),
        }
    }

    /// Scanning roots this hub mirrors.
    pub fn dirs(&self) -> &ClaudeDirs {
        &self.dirs
    }

    /// The last completed snapshot.
    pub async fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    /// Replace the snapshot as a unit and push it to every viewer.
    pub async fn replace(&self, snapshot: Snapshot) {
        *self.snapshot.write().await = Arc::new(snapshot);
        self.broadcast_snapshot().await;
    }

    /// Replace only the session list (transcript pipeline refresh), carrying
    /// teams and history over from the current snapshot.
    pub async fn update_sessions(&self, sessions: Vec<SessionInfo>) {
        {
            let mut slot = self.snapshot.write().await;
            let prev = slot.clone();
            *slot = Arc::new(Snapshot {
                teams: prev.teams.clone(),
                history: prev.history.clone(),
                sessions,
                timestamp: chrono::Utc::now().timestamp_millis(),
            });
        }
        self.broadcast_snapshot().await;
    }

    /// Send the current snapshot to every connected viewer.
    async fn broadcast_snapshot(&self) {
        let snapshot = self.current().await;
        let Ok(payload) = serde_json::to_string(&*snapshot) else {
            return;
        };
        let viewers: Vec<(String, mpsc::Sender<Message>)> = self
            .viewers
            .read()
            .await
            .iter()
            .map(|(id, tx)| (id.clone(), tx.clone()))
            .collect();
        for (conn_id, tx) in viewers {
            if tx.send(Message::Text(payload.clone())).await.is_err() {
                warn!("Dropping viewer {} (send failed)", conn_id);
                self.remove_viewer(&conn_id).await;
            }
        }
    }

    /// Register a connection and hand it the full current snapshot.
    async fn register_viewer(&self, tx: mpsc::Sender<Message>) -> String {
        let conn_id = format!("viewer-{}", self.conn_counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.viewers.write().await.insert(conn_id.clone(), tx.clone());

        let snapshot = self.current().await;
        if let Ok(payload) = serde_json::to_string(&*snapshot) {
            let _ = tx.send(Message::Text(payload)).await;
        }
        info!("Viewer connected: {}", conn_id);
        conn_id
    }

    /// Remove a connection from the registry and from every subscription.
    async fn remove_viewer(&self, conn_id: &str) {
        self.viewers.write().await.remove(conn_id);
        self.subscriptions.lock().await.remove_viewer(conn_id);
    }

    /// Subscribe `conn_id` to a session's live entries.
    ///
    /// The first subscription for a session pins its cursor to the
    /// transcript's current line count, so viewers only ever receive lines
    /// appended after that point, never historical backfill.
    async fn subscribe(&self, conn_id: &str, session_id: &str) {
        let transcript = self
            .current()
            .await
            .find_session(session_id)
            .map(|s| s.jsonl_path.clone());

        let mut subs = self.subscriptions.lock().await;
        subs.subscribers
            .entry(session_id.to_string())
            .or_default()
            .insert(conn_id.to_string());
        if !subs.cursors.contains_key(session_id) {
            if let Some(path) = transcript {
                let count = tail::count_lines(&path);
                subs.cursors.insert(session_id.to_string(), count);
                debug!(
                    "First subscriber for {}: cursor initialized to {}",
                    session_id, count
                );
            }
        }
    }

    /// Remove one subscription; the last unsubscribe drops the cursor.
    async fn unsubscribe(&self, conn_id: &str, session_id: &str) {
        let mut subs = self.subscriptions.lock().await;
        if let Some(conns) = subs.subscribers.get_mut(session_id) {
            conns.remove(conn_id);
            if conns.is_empty() {
                subs.subscribers.remove(session_id);
                subs.cursors.remove(session_id);
            }
        }
    }

    /// Tail every subscribed session and deliver new entries to that
    /// session's subscribers only. Driven by the transcript pipeline.
    pub async fn broadcast_session_updates(&self) {
        let snapshot = self.current().await;
        let work: Vec<(String, PathBuf, Option<usize>)> = {
            let subs = self.subscriptions.lock().await;
            subs.subscribers
                .iter()
                .filter(|(_, conns)| !conns.is_empty())
                .filter_map(|(session_id, _)| {
                    let session = snapshot.find_session(session_id)?;
                    let cursor = subs.cursors.get(session_id).copied();
                    Some((session_id.clone(), session.jsonl_path.clone(), cursor))
                })
                .collect()
        };
        if work.is_empty() {
            return;
        }

        let tailed = tokio::task::spawn_blocking(move || {
            work.into_iter()
                .map(|(sid, path, cursor)| {
                    // a session subscribed before it was discovered starts
                    // from its current length, not from zero
                    let cursor = cursor.unwrap_or_else(|| tail::count_lines(&path));
                    let (entries, new_cursor) = tail::tail_new(&path, cursor);
                    (sid, entries, new_cursor)
                })
                .collect::<Vec<_>>()
        })
        .await
        .unwrap_or_default();

        for (session_id, entries, new_cursor) in tailed {
            let conns: Vec<String> = {
                let mut subs = self.subscriptions.lock().await;
                let Some(conns) = subs.subscribers.get(&session_id) else {
                    // everyone unsubscribed while we were tailing
                    continue;
                };
                let conns = conns.iter().cloned().collect();
                subs.cursors.insert(session_id.clone(), new_cursor);
                conns
            };
            if entries.is_empty() {
                continue;
            }
            let targets: Vec<(String, mpsc::Sender<Message>)> = {
                let viewers = self.viewers.read().await;
                conns
                    .into_iter()
                    .filter_map(|c| viewers.get(&c).map(|tx| (c, tx.clone())))
                    .collect()
            };
            let update = SessionUpdate {
                r#type: "session_update",
                session_id: &session_id,
                entries: &entries,
            };
            let Ok(payload) = serde_json::to_string(&update) else {
                continue;
            };
            for (conn_id, tx) in targets {
                if tx.send(Message::Text(payload.clone())).await.is_err() {
                    warn!("Dropping subscriber {} (send failed)", conn_id);
                    self.remove_viewer(&conn_id).await;
                }
            }
        }
    }

    /// Drive one WebSocket connection to completion.
    pub async fn handle_socket(self: Arc<Self>, socket: WebSocket) {
        let (mut ws_sender, mut ws_receiver) = socket.split();
        let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
        let write_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if ws_sender.send(msg).await.is_err() {
                    return;
                }
            }
        });

        let conn_id = self.register_viewer(tx.clone()).await;

        while let Some(result) = ws_receiver.next().await {
            let msg = match result {
                Ok(msg) => msg,
                Err(e) => {
                    debug!("Read error on {}: {}", conn_id, e);
                    break;
                }
            };
            let data = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            match serde_json::from_str::<ClientMessage>(&data) {
                Ok(ClientMessage::SubscribeSession { session_id }) => {
                    self.subscribe(&conn_id, &session_id).await;
                }
                Ok(ClientMessage::UnsubscribeSession { session_id }) => {
                    self.unsubscribe(&conn_id, &session_id).await;
                }
                Err(_) => {
                    // malformed client traffic is ignored, not fatal
                    debug!("Ignoring unparseable message on {}", conn_id);
                }
            }
        }

        self.remove_viewer(&conn_id).await;
        info!("Viewer disconnected: {}", conn_id);
        drop(tx);
        let _ = write_task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write as _;
    use std::path::Path;
    use tempfile::TempDir;

    fn user_line(text: &str) -> String {
        format!(r#"{{"type": "user", "message": {{"content": "{text}"}}}}"#)
    }

    fn hub_with_session(tmp: &TempDir, lines: usize) -> (Arc<Hub>, PathBuf) {
        let dirs = ClaudeDirs::from_claude_root(tmp.path().to_path_buf());
        let jsonl_path = dirs.projects.join("proj/s-1.jsonl");
        fs::create_dir_all(jsonl_path.parent().unwrap()).unwrap();
        let mut f = fs::File::create(&jsonl_path).unwrap();
        for i in 0..lines {
            writeln!(f, "{}", user_line(&format!("m{i}"))).unwrap();
        }
        drop(f);

        let snapshot = Snapshot {
            sessions: vec![SessionInfo {
                session_id: "s-1".to_string(),
                summary: "test".to_string(),
                first_prompt: "test".to_string(),
                message_count: lines,
                created: None,
                modified: None,
                project_path: String::new(),
                git_branch: String::new(),
                is_active: true,
                jsonl_path: jsonl_path.clone(),
            }],
            ..Default::default()
        };
        (Arc::new(Hub::new(dirs, snapshot)), jsonl_path)
    }

    async fn connect(hub: &Arc<Hub>) -> (String, mpsc::Receiver<Message>) {
        let (tx, mut rx) = mpsc::channel(OUTBOUND_QUEUE);
        let conn_id = hub.register_viewer(tx).await;
        // consume the snapshot sent on connect
        let first = rx.recv().await.expect("snapshot on connect");
        assert!(matches!(first, Message::Text(_)));
        (conn_id, rx)
    }

    fn append(path: &Path, texts: &[&str]) {
        let mut f = fs::OpenOptions::new().append(true).open(path).unwrap();
        for t in texts {
            writeln!(f, "{}", user_line(t)).unwrap();
        }
    }

    #[tokio::test]
    async fn connect_receives_full_snapshot() {
        let tmp = TempDir::new().unwrap();
        let (hub, _) = hub_with_session(&tmp, 2);
        let (_conn, mut rx) = {
            let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
            (hub.register_viewer(tx).await, rx)
        };
        let Message::Text(payload) = rx.recv().await.unwrap() else {
            panic!("expected text frame");
        };
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert!(value.get("teams").is_some());
        assert_eq!(value["sessions"][0]["sessionId"], "s-1");
    }

    #[tokio::test]
    async fn subscriber_gets_only_lines_after_subscription() {
        let tmp = TempDir::new().unwrap();
        let (hub, path) = hub_with_session(&tmp, 3);
        let (conn, mut rx) = connect(&hub).await;

        hub.subscribe(&conn, "s-1").await;
        append(&path, &["fresh-1", "fresh-2"]);
        hub.broadcast_session_updates().await;

        let Message::Text(payload) = rx.recv().await.unwrap() else {
            panic!("expected session update");
        };
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["type"], "session_update");
        assert_eq!(value["sessionId"], "s-1");
        let entries = value["entries"].as_array().unwrap();
        // the 3 pre-subscription lines are never backfilled
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["text"], "fresh-1");
    }

    #[tokio::test]
    async fn non_subscriber_receives_no_session_updates() {
        let tmp = TempDir::new().unwrap();
        let (hub, path) = hub_with_session(&tmp, 1);
        let (subscriber, mut sub_rx) = connect(&hub).await;
        let (_bystander, mut other_rx) = connect(&hub).await;

        hub.subscribe(&subscriber, "s-1").await;
        append(&path, &["update"]);
        hub.broadcast_session_updates().await;

        assert!(sub_rx.recv().await.is_some());
        // the bystander's queue stays empty
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn no_new_lines_means_no_update_frame() {
        let tmp = TempDir::new().unwrap();
        let (hub, _path) = hub_with_session(&tmp, 2);
        let (conn, mut rx) = connect(&hub).await;

        hub.subscribe(&conn, "s-1").await;
        hub.broadcast_session_updates().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn second_subscriber_does_not_reset_cursor() {
        let tmp = TempDir::new().unwrap();
        let (hub, path) = hub_with_session(&tmp, 1);
        let (first, mut first_rx) = connect(&hub).await;
        let (second, mut second_rx) = connect(&hub).await;

        hub.subscribe(&first, "s-1").await;
        append(&path, &["a"]);
        // a late second subscriber must not re-pin the cursor forward
        hub.subscribe(&second, "s-1").await;
        hub.broadcast_session_updates().await;

        for rx in [&mut first_rx, &mut second_rx] {
            let Message::Text(payload) = rx.recv().await.unwrap() else {
                panic!("expected update");
            };
            let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
            assert_eq!(value["entries"].as_array().unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn unsubscribe_of_last_viewer_drops_cursor() {
        let tmp = TempDir::new().unwrap();
        let (hub, _path) = hub_with_session(&tmp, 1);
        let (conn, _rx) = connect(&hub).await;

        hub.subscribe(&conn, "s-1").await;
        {
            let subs = hub.subscriptions.lock().await;
            assert!(subs.cursors.contains_key("s-1"));
        }
        hub.unsubscribe(&conn, "s-1").await;
        {
            let subs = hub.subscriptions.lock().await;
            assert!(subs.subscribers.is_empty());
            assert!(subs.cursors.is_empty());
        }
    }

    #[tokio::test]
    async fn disconnect_prunes_all_subscriptions() {
        let tmp = TempDir::new().unwrap();
        let (hub, _path) = hub_with_session(&tmp, 1);
        let (conn, _rx) = connect(&hub).await;

        hub.subscribe(&conn, "s-1").await;
        hub.remove_viewer(&conn).await;
        {
            let subs = hub.subscriptions.lock().await;
            assert!(subs.subscribers.is_empty());
            assert!(subs.cursors.is_empty());
        }
        assert!(hub.viewers.read().await.is_empty());
    }

    #[tokio::test]
    async fn truncated_transcript_resets_cursor_and_sends_nothing() {
        let tmp = TempDir::new().unwrap();
        let (hub, path) = hub_with_session(&tmp, 3);
        let (conn, mut rx) = connect(&hub).await;

        hub.subscribe(&conn, "s-1").await;
        fs::write(&path, format!("{}\n", user_line("only"))).unwrap();
        hub.broadcast_session_updates().await;
        assert!(rx.try_recv().is_err());
        {
            let subs = hub.subscriptions.lock().await;
            assert_eq!(subs.cursors["s-1"], 1);
        }

        // appends after the reset flow normally
        append(&path, &["after-reset"]);
        hub.broadcast_session_updates().await;
        let Message::Text(payload) = rx.recv().await.unwrap() else {
            panic!("expected update");
        };
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["entries"][0]["text"], "after-reset");
    }

    #[tokio::test]
    async fn replace_broadcasts_to_every_viewer() {
        let tmp = TempDir::new().unwrap();
        let (hub, _path) = hub_with_session(&tmp, 1);
        let (_a, mut rx_a) = connect(&hub).await;
        let (_b, mut rx_b) = connect(&hub).await;

        let next = Snapshot {
            timestamp: 42,
            ..Default::default()
        };
        hub.replace(next).await;

        for rx in [&mut rx_a, &mut rx_b] {
            let Message::Text(payload) = rx.recv().await.unwrap() else {
                panic!("expected snapshot frame");
            };
            let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
            assert_eq!(value["timestamp"], 42);
        }
    }

    #[tokio::test]
    async fn update_sessions_preserves_teams_and_history() {
        let tmp = TempDir::new().unwrap();
        let dirs = ClaudeDirs::from_claude_root(tmp.path().to_path_buf());
        let mut snapshot = Snapshot::default();
        snapshot.teams.insert(
            "alpha".to_string(),
            swarm_console_core::snapshot::Team {
                name: "alpha".to_string(),
                config: Default::default(),
                tasks: Vec::new(),
                inboxes: Default::default(),
            },
        );
        let hub = Hub::new(dirs, snapshot);

        hub.update_sessions(Vec::new()).await;
        let current = hub.current().await;
        assert!(current.teams.contains_key("alpha"));
        assert!(current.sessions.is_empty());
    }
}

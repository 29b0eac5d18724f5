//! HTTP and WebSocket surface.
//!
//! Thin axum handlers over the hub: a synchronous snapshot read, the
//! Markdown export, history fetch, session fetch with a tail parameter, and
//! the live channel upgrade. Unknown identifiers come back as 404 with a
//! JSON error body; nothing here mutates hub state.

use axum::{
    Json, Router,
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use swarm_console_core::export::markdown_report;
use swarm_console_core::history;
use swarm_console_core::session::tail::read_tail;

use crate::hub::Hub;

const DEFAULT_SESSION_TAIL: usize = 200;

pub fn router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/api/state", get(state))
        .route("/api/export/:team", get(export_team))
        .route("/api/history/:file", get(history_file))
        .route("/api/session/:id", get(session))
        .route("/ws", get(ws_upgrade))
        .route("/health", get(|| async { "ok" }))
        .with_state(hub)
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}

async fn state(State(hub): State<Arc<Hub>>) -> Response {
    Json((*hub.current().await).clone()).into_response()
}

async fn export_team(State(hub): State<Arc<Hub>>, Path(team): Path<String>) -> Response {
    let snapshot = hub.current().await;
    let Some(team) = snapshot.teams.get(&team) else {
        return not_found("Team not found");
    };
    let headers = [
        (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}-report.md\"", team.name),
        ),
    ];
    (headers, markdown_report(team)).into_response()
}

async fn history_file(State(hub): State<Arc<Hub>>, Path(file): Path<String>) -> Response {
    match history::load(&hub.dirs().history, &file) {
        Some(record) => Json(record).into_response(),
        None => not_found("Not found"),
    }
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    tail: Option<usize>,
}

async fn session(
    State(hub): State<Arc<Hub>>,
    Path(id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Response {
    let snapshot = hub.current().await;
    let Some(session) = snapshot.find_session(&id) else {
        return not_found("Session not found");
    };
    let session = session.clone();
    let tail = query.tail.unwrap_or(DEFAULT_SESSION_TAIL);
    let path = session.jsonl_path.clone();
    let entries = tokio::task::spawn_blocking(move || read_tail(&path, tail))
        .await
        .unwrap_or_default();
    Json(json!({ "session": session, "entries": entries })).into_response()
}

async fn ws_upgrade(State(hub): State<Arc<Hub>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| hub.handle_socket(socket))
}

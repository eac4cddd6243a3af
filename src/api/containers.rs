//! Container endpoints: listing, lifecycle, and live log/stat sessions.

use std::sync::Arc;

use axum::extract::ws::WebSocket;
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::runtime::{ContainerDetails, LogOptions};
use crate::session::bridge::bridge;
use crate::session::stats::run_stats_session;
use crate::session::Observer;
use crate::stream;
use crate::Result;

use super::AppState;

/// `GET /api/v1/containers` — list all containers.
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let containers = state.containers.list().await?;
    Ok(Json(json!({ "containers": containers })))
}

/// `POST /api/v1/containers` — create and start a container.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(request): Json<crate::runtime::spec::ResourceSpec>,
) -> Result<Json<Value>> {
    let outcome = state.containers.create(&request).await?;
    Ok(Json(json!({
        "message": "container created",
        "id": outcome.id,
        "warnings": outcome.warnings,
    })))
}

/// `GET /api/v1/containers/{id}` — inspect one container.
pub async fn inspect(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ContainerDetails>> {
    Ok(Json(state.containers.inspect(&id).await?))
}

/// `POST /api/v1/containers/{id}/start`.
pub async fn start(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.containers.start(&id).await?;
    Ok(Json(json!({ "message": "container started" })))
}

/// `POST /api/v1/containers/{id}/stop`.
pub async fn stop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.containers.stop(&id).await?;
    Ok(Json(json!({ "message": "container stopped" })))
}

/// `GET /api/v1/containers/{id}/logs` — WebSocket log session.
pub async fn logs_ws(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| stream_logs(socket, id, state))
}

async fn stream_logs(mut socket: WebSocket, id: String, state: Arc<AppState>) {
    let session = Uuid::new_v4();
    let cancel = state.shutdown.child_token();
    let options = LogOptions::follow_tail(state.config.streams.log_tail.clone());

    match state.engine.logs(&id, &options).await {
        Ok(feed) => {
            let chunks = stream::display_chunks(feed);
            let end = bridge(chunks, &mut socket, cancel, None).await;
            info!(%session, container = %id, end = ?end, "log session ended");
        }
        Err(err) => {
            warn!(%session, container = %id, %err, "log session failed to open");
            let _ = socket
                .push_text(format!("error fetching logs: {err}"))
                .await;
            socket.close().await;
        }
    }
}

/// `GET /api/v1/containers/{id}/stats` — WebSocket metrics session.
pub async fn stats_ws(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| stream_stats(socket, id, state))
}

async fn stream_stats(mut socket: WebSocket, id: String, state: Arc<AppState>) {
    let session = Uuid::new_v4();
    let cancel = state.shutdown.child_token();

    match state.engine.stats(&id).await {
        Ok(feed) => {
            let end = run_stats_session(feed, &mut socket, cancel).await;
            info!(%session, container = %id, end = ?end, "stats session ended");
        }
        Err(err) => {
            warn!(%session, container = %id, %err, "stats session failed to open");
            let _ = socket
                .push_text(format!("error fetching stats: {err}"))
                .await;
            socket.close().await;
        }
    }
}

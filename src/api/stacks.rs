//! Stack endpoints: compose-file storage, orchestration, and log sessions.

use std::sync::Arc;

use axum::extract::ws::WebSocket;
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::session::bridge::bridge;
use crate::session::Observer;
use crate::Result;

use super::AppState;

/// Body for `POST /api/v1/stacks`.
#[derive(Debug, Deserialize)]
pub struct SaveStackRequest {
    /// Stack name; becomes the directory name.
    pub name: String,
    /// Compose file contents.
    pub compose: String,
}

/// `GET /api/v1/stacks` — list stored stack names.
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    Ok(Json(json!({ "stacks": state.stacks.list().await? })))
}

/// `POST /api/v1/stacks` — save a compose file under a stack name.
pub async fn save(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SaveStackRequest>,
) -> Result<Json<Value>> {
    state.stacks.save(&request.name, &request.compose).await?;
    Ok(Json(json!({ "message": "stack saved" })))
}

/// `GET /api/v1/stacks/status` — each stack with its observed containers.
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let stacks = state.stacks.status(state.engine.as_ref()).await?;
    Ok(Json(json!({ "stacks": stacks })))
}

/// `POST /api/v1/stacks/{name}/up`.
pub async fn up(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    state.stacks.up(&name).await?;
    Ok(Json(json!({ "message": "stack started" })))
}

/// `POST /api/v1/stacks/{name}/down`.
pub async fn down(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    state.stacks.down(&name).await?;
    Ok(Json(json!({ "message": "stack stopped" })))
}

/// `DELETE /api/v1/stacks/{name}`.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    state.stacks.delete(&name).await?;
    Ok(Json(json!({ "message": "stack deleted" })))
}

/// `GET /api/v1/stacks/{name}/logs` — WebSocket follow session over the
/// compose log subprocess.
pub async fn logs_ws(
    ws: WebSocketUpgrade,
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| stream_logs(socket, name, state))
}

async fn stream_logs(mut socket: WebSocket, name: String, state: Arc<AppState>) {
    let session = Uuid::new_v4();
    let cancel = state.shutdown.child_token();

    match state.stacks.follow_logs(&name) {
        Ok((chunks, handle)) => {
            // The bridge owns the compose child: observer disconnect or
            // cancellation terminates it so no `logs -f` process is orphaned.
            let end = bridge(chunks, &mut socket, cancel, Some(handle)).await;
            info!(%session, stack = %name, end = ?end, "stack log session ended");
        }
        Err(err) => {
            warn!(%session, stack = %name, %err, "stack log session failed to open");
            let _ = socket
                .push_text(format!("error fetching stack logs: {err}"))
                .await;
            socket.close().await;
        }
    }
}

//! Host system monitor endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocket;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use tracing::info;
use uuid::Uuid;

use crate::session::system::run_system_session;

use super::AppState;

/// `GET /api/v1/system` — WebSocket pushing host samples on an interval.
pub async fn system_ws(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| stream_system(socket, state))
}

async fn stream_system(mut socket: WebSocket, state: Arc<AppState>) {
    let session = Uuid::new_v4();
    let cancel = state.shutdown.child_token();
    let interval = Duration::from_secs(state.config.streams.system_interval_seconds.max(1));

    info!(%session, "system monitor session opened");
    let end = run_system_session(interval, &mut socket, cancel).await;
    info!(%session, end = ?end, "system monitor session ended");
}

//! Provisioning endpoints: playbook listing and streamed runs.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::Result;

use super::AppState;

/// Body for `POST /api/v1/provision`.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    /// Inventory file name, relative to the inventory directory.
    pub inventory: String,
    /// Playbook file name, relative to the playbook directory.
    pub playbook: String,
}

/// `GET /api/v1/playbooks` — list available playbooks.
pub async fn list_playbooks(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    Ok(Json(json!({ "playbooks": state.provisioner.list_playbooks()? })))
}

/// `POST /api/v1/provision` — run a playbook, streaming output lines as they
/// arrive. Dropping the response (client disconnect) kills the run.
pub async fn run(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> Result<Response> {
    let output = state
        .provisioner
        .start_run(&request.inventory, &request.playbook)?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(output),
    )
        .into_response())
}

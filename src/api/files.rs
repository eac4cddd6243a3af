//! File-area endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::Result;

use super::AppState;

/// Query string carrying a root-relative path.
#[derive(Debug, Deserialize)]
pub struct PathQuery {
    /// Path relative to the managed root; empty means the root itself.
    #[serde(default)]
    pub path: String,
}

/// Body carrying a single path.
#[derive(Debug, Deserialize)]
pub struct PathRequest {
    /// Path relative to the managed root.
    pub path: String,
}

/// Body for `POST /api/v1/files/write`.
#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    /// Path relative to the managed root.
    pub path: String,
    /// File contents.
    pub contents: String,
}

/// Body for `POST /api/v1/files/move`.
#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    /// Source path.
    pub from: String,
    /// Destination path.
    pub to: String,
}

/// Body for `POST /api/v1/files/compress`.
#[derive(Debug, Deserialize)]
pub struct CompressRequest {
    /// Paths to include in the archive.
    pub paths: Vec<String>,
    /// Archive destination path.
    pub archive: String,
}

/// Body for `POST /api/v1/files/extract`.
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    /// Archive path.
    pub archive: String,
    /// Destination directory.
    pub dest: String,
}

/// `GET /api/v1/files?path=` — list a directory.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Json<Value>> {
    Ok(Json(json!({ "entries": state.files.list(&query.path).await? })))
}

/// `GET /api/v1/files/read?path=` — return a file's raw contents.
pub async fn read(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse> {
    Ok(state.files.read(&query.path).await?)
}

/// `POST /api/v1/files/write`.
pub async fn write(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WriteRequest>,
) -> Result<Json<Value>> {
    state
        .files
        .write(&request.path, request.contents.as_bytes())
        .await?;
    Ok(Json(json!({ "message": "file written" })))
}

/// `POST /api/v1/files/delete`.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PathRequest>,
) -> Result<Json<Value>> {
    state.files.delete(&request.path).await?;
    Ok(Json(json!({ "message": "deleted" })))
}

/// `POST /api/v1/files/move`.
pub async fn rename(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<Value>> {
    state.files.rename(&request.from, &request.to).await?;
    Ok(Json(json!({ "message": "moved" })))
}

/// `POST /api/v1/files/mkdir`.
pub async fn mkdir(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PathRequest>,
) -> Result<Json<Value>> {
    state.files.mkdir(&request.path).await?;
    Ok(Json(json!({ "message": "directory created" })))
}

/// `POST /api/v1/files/compress`.
pub async fn compress(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompressRequest>,
) -> Result<Json<Value>> {
    state
        .files
        .compress(&request.paths, &request.archive)
        .await?;
    Ok(Json(json!({ "message": "archive created" })))
}

/// `POST /api/v1/files/extract`.
pub async fn extract(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<Value>> {
    state
        .files
        .extract(&request.archive, &request.dest)
        .await?;
    Ok(Json(json!({ "message": "archive extracted" })))
}

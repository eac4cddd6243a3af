//! HTTP/WebSocket API surface.
//!
//! One `Router` over a shared [`AppState`]. Synchronous endpoints return
//! JSON bodies; streaming endpoints upgrade to WebSocket or stream the
//! response body. Each streaming session gets a child of the server's
//! shutdown token so a daemon shutdown cancels every live session.

pub mod containers;
pub mod files;
pub mod provision;
pub mod stacks;
pub mod system;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::config::GlobalConfig;
use crate::files::FileStore;
use crate::provision::PlaybookRunner;
use crate::runtime::{ContainerEngine, Containers};
use crate::stacks::StackStore;

/// Shared application state behind every handler.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Container runtime capability set. Stateless; shared read-only.
    pub engine: Arc<dyn ContainerEngine>,
    /// Container lifecycle controller.
    pub containers: Containers,
    /// Stack store and orchestrator.
    pub stacks: StackStore,
    /// Provisioning runner.
    pub provisioner: PlaybookRunner,
    /// Managed file area.
    pub files: FileStore,
    /// Server shutdown token; sessions derive child tokens from it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Assemble application state from configuration and an engine.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        engine: Arc<dyn ContainerEngine>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            containers: Containers::new(Arc::clone(&engine), config.stop_timeout_seconds),
            stacks: StackStore::new(&config.stacks),
            provisioner: PlaybookRunner::new(&config.provision),
            files: FileStore::new(config.files_root.clone()),
            config,
            engine,
            shutdown,
        }
    }
}

async fn ping() -> &'static str {
    "pong"
}

/// Build the API router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/ping", get(ping))
        .route(
            "/api/v1/containers",
            get(containers::list).post(containers::create),
        )
        .route("/api/v1/containers/{id}", get(containers::inspect))
        .route("/api/v1/containers/{id}/start", post(containers::start))
        .route("/api/v1/containers/{id}/stop", post(containers::stop))
        .route("/api/v1/containers/{id}/logs", get(containers::logs_ws))
        .route("/api/v1/containers/{id}/stats", get(containers::stats_ws))
        .route("/api/v1/system", get(system::system_ws))
        .route("/api/v1/stacks", get(stacks::list).post(stacks::save))
        .route("/api/v1/stacks/status", get(stacks::status))
        .route("/api/v1/stacks/{name}", delete(stacks::remove))
        .route("/api/v1/stacks/{name}/up", post(stacks::up))
        .route("/api/v1/stacks/{name}/down", post(stacks::down))
        .route("/api/v1/stacks/{name}/logs", get(stacks::logs_ws))
        .route("/api/v1/playbooks", get(provision::list_playbooks))
        .route("/api/v1/provision", post(provision::run))
        .route("/api/v1/files", get(files::list))
        .route("/api/v1/files/read", get(files::read))
        .route("/api/v1/files/write", post(files::write))
        .route("/api/v1/files/delete", post(files::delete))
        .route("/api/v1/files/move", post(files::rename))
        .route("/api/v1/files/mkdir", post(files::mkdir))
        .route("/api/v1/files/compress", post(files::compress))
        .route("/api/v1/files/extract", post(files::extract))
        .with_state(state)
}

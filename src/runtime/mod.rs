//! Container runtime: the engine capability trait and the lifecycle
//! controller built on top of it.
//!
//! The engine trait models the runtime as a capability-set collaborator —
//! unary control calls return typed values, streaming calls return the wire
//! data the runtime actually speaks (the combined log stream plus TTY flag,
//! and NDJSON stats snapshots) so the stream layer owns all decoding. The
//! client behind the production implementation is stateless and may be
//! shared read-only across concurrent requests.

pub mod docker;
pub mod spec;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, info_span, Instrument};

use crate::stream::{ByteStream, LogFeed};
use crate::Result;
use self::spec::{NormalizedSpec, ResourceSpec};

/// Length of the short container id shown to callers.
pub const SHORT_ID_LEN: usize = 12;

/// One row of the container listing.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSummary {
    /// Short container id.
    pub id: String,
    /// Primary container name.
    pub name: String,
    /// Image reference the container was created from.
    pub image: String,
    /// Human-readable status, e.g. `Up 2 hours`.
    pub status: String,
    /// Lifecycle state, e.g. `running`.
    pub state: String,
    /// Creation time as a unix timestamp.
    pub created: i64,
    /// Published ports.
    pub ports: Vec<PortInfo>,
    /// Container labels. Used internally for stack grouping.
    #[serde(skip_serializing)]
    pub labels: HashMap<String, String>,
}

/// One published port on a container.
#[derive(Debug, Clone, Serialize)]
pub struct PortInfo {
    /// Port inside the container.
    pub private_port: u16,
    /// Port bound on the host, when published.
    pub public_port: Option<u16>,
}

/// Details for a single container.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerDetails {
    /// Short container id.
    pub id: String,
    /// Primary container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Lifecycle state.
    pub state: String,
    /// Whether the container is currently running.
    pub running: bool,
    /// Whether the container has a pseudo-terminal attached.
    pub tty: bool,
    /// Start time, when the container has been started.
    pub started_at: Option<String>,
}

/// Options for a log streaming call.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Keep the stream open and follow new output.
    pub follow: bool,
    /// Number of trailing lines to replay first.
    pub tail: String,
    /// Include the stdout stream.
    pub stdout: bool,
    /// Include the stderr stream.
    pub stderr: bool,
}

impl LogOptions {
    /// Follow both streams, replaying `tail` trailing lines.
    #[must_use]
    pub fn follow_tail(tail: impl Into<String>) -> Self {
        Self {
            follow: true,
            tail: tail.into(),
            stdout: true,
            stderr: true,
        }
    }
}

/// Capability set consumed from the container runtime.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// List all containers, running or not.
    async fn list(&self) -> Result<Vec<ContainerSummary>>;

    /// Start a container.
    async fn start(&self, id: &str) -> Result<()>;

    /// Stop a container, giving it `timeout_seconds` before the kill.
    async fn stop(&self, id: &str, timeout_seconds: i64) -> Result<()>;

    /// Inspect a container. The result carries the TTY flag the stream
    /// layer needs to interpret the log feed.
    async fn inspect(&self, id: &str) -> Result<ContainerDetails>;

    /// Whether an image is present locally.
    async fn image_present(&self, image: &str) -> Result<bool>;

    /// Pull an image, draining the progress stream.
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// Create a container from a normalized spec, returning the full id.
    async fn create(&self, spec: &NormalizedSpec) -> Result<String>;

    /// Open the container's combined log stream.
    async fn logs(&self, id: &str, options: &LogOptions) -> Result<LogFeed>;

    /// Open the container's streaming stats feed (NDJSON snapshots).
    async fn stats(&self, id: &str) -> Result<ByteStream>;
}

/// Outcome of a create call.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOutcome {
    /// Short id of the created container.
    pub id: String,
    /// Lenient-parsing warnings collected while normalizing the request.
    pub warnings: Vec<String>,
}

/// Truncate a full container id to its short form.
#[must_use]
pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

/// Resource lifecycle controller: typed orchestration of engine calls.
#[derive(Clone)]
pub struct Containers {
    engine: Arc<dyn ContainerEngine>,
    stop_timeout_seconds: i64,
}

impl Containers {
    /// Build a controller over the given engine.
    #[must_use]
    pub fn new(engine: Arc<dyn ContainerEngine>, stop_timeout_seconds: i64) -> Self {
        Self {
            engine,
            stop_timeout_seconds,
        }
    }

    /// List all containers.
    ///
    /// # Errors
    ///
    /// Propagates engine failures as `AppError::Upstream`.
    pub async fn list(&self) -> Result<Vec<ContainerSummary>> {
        self.engine.list().await
    }

    /// Start a container.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub async fn start(&self, id: &str) -> Result<()> {
        self.engine.start(id).await
    }

    /// Stop a container with the configured timeout.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub async fn stop(&self, id: &str) -> Result<()> {
        self.engine.stop(id, self.stop_timeout_seconds).await
    }

    /// Inspect a container.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub async fn inspect(&self, id: &str) -> Result<ContainerDetails> {
        self.engine.inspect(id).await
    }

    /// Create and start a container from a request.
    ///
    /// Normalizes the request, pulls the image when absent locally (progress
    /// is drained, not surfaced), creates the container, then starts it.
    /// Failure at any step surfaces with that step's context; no rollback of
    /// earlier steps is attempted.
    ///
    /// # Errors
    ///
    /// `AppError::Validation` for a bad request, `AppError::Upstream` for
    /// engine failures.
    pub async fn create(&self, request: &ResourceSpec) -> Result<CreateOutcome> {
        let (normalized, warnings) = spec::normalize(request)?;
        let span = info_span!("create_container", image = %normalized.image);

        async {
            if !self.engine.image_present(&normalized.image).await? {
                info!("image absent locally, pulling");
                self.engine.pull_image(&normalized.image).await?;
                info!("image pull complete");
            }

            let id = self.engine.create(&normalized).await?;
            self.engine.start(&id).await?;

            info!(id = %short_id(&id), "container created and started");
            Ok(CreateOutcome {
                id: short_id(&id),
                warnings,
            })
        }
        .instrument(span)
        .await
    }
}

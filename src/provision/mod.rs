//! Provisioning runner: list playbooks and execute them with live output.
//!
//! Runs `<tool> -i <inventory> <playbook>` through the process launcher and
//! streams interleaved stdout/stderr lines as they arrive, line-buffered.
//! The returned stream owns the child: dropping it (the client disconnected
//! or the request context was cancelled) kills the process.

use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use tokio_util::codec::FramedRead;
use tracing::info;

use crate::config::ProvisionConfig;
use crate::files::validate_path;
use crate::launcher::{self, LaunchSpec, ProcessHandle};
use crate::stream::lines::LineCodec;
use crate::{AppError, Result};

/// Playbook discovery and execution.
#[derive(Debug, Clone)]
pub struct PlaybookRunner {
    playbook_dir: PathBuf,
    inventory_dir: PathBuf,
    allowed_extensions: Vec<String>,
    command: String,
}

impl PlaybookRunner {
    /// Build a runner over the configured directories.
    #[must_use]
    pub fn new(config: &ProvisionConfig) -> Self {
        Self {
            playbook_dir: config.playbook_dir.clone(),
            inventory_dir: config.inventory_dir.clone(),
            allowed_extensions: config.allowed_extensions.clone(),
            command: config.command.clone(),
        }
    }

    /// List playbooks under the playbook directory, recursively, restricted
    /// to the allowed extensions. Paths are relative to the directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` when the directory cannot be scanned.
    pub fn list_playbooks(&self) -> Result<Vec<String>> {
        let mut playbooks = Vec::new();
        for ext in &self.allowed_extensions {
            let pattern = format!("{}/**/*{ext}", self.playbook_dir.display());
            let matches = glob::glob(&pattern)
                .map_err(|err| AppError::Io(format!("bad playbook pattern: {err}")))?;
            for entry in matches {
                let path = entry.map_err(|err| AppError::Io(err.to_string()))?;
                if let Ok(rel) = path.strip_prefix(&self.playbook_dir) {
                    playbooks.push(rel.to_string_lossy().into_owned());
                }
            }
        }
        playbooks.sort();
        playbooks.dedup();
        Ok(playbooks)
    }

    /// Launch a playbook run and return its line-buffered output stream.
    ///
    /// Both file names are validated against their configured directories
    /// before anything is launched; traversal attempts are rejected.
    ///
    /// # Errors
    ///
    /// `AppError::Validation` for empty names, unknown files, or a playbook
    /// with a disallowed extension; `AppError::PathViolation` for traversal
    /// attempts; `AppError::Launch` when the tool cannot be spawned.
    pub fn start_run(&self, inventory: &str, playbook: &str) -> Result<RunStream> {
        if inventory.trim().is_empty() || playbook.trim().is_empty() {
            return Err(AppError::Validation(
                "inventory and playbook must not be empty".into(),
            ));
        }
        if !self.extension_allowed(playbook) {
            return Err(AppError::Validation(format!(
                "playbook extension not allowed: {playbook}"
            )));
        }

        let playbook_path = validate_path(&self.playbook_dir, playbook)?;
        let inventory_path = validate_path(&self.inventory_dir, inventory)?;

        if !playbook_path.is_file() {
            return Err(AppError::Validation(format!(
                "playbook not found: {playbook}"
            )));
        }
        if !inventory_path.is_file() {
            return Err(AppError::Validation(format!(
                "inventory not found: {inventory}"
            )));
        }

        let spec = LaunchSpec::new(&self.command).args([
            "-i".to_owned(),
            inventory_path.to_string_lossy().into_owned(),
            playbook_path.to_string_lossy().into_owned(),
        ]);
        let proc = launcher::launch(&spec)?;
        info!(playbook, inventory, "provisioning run started");

        let stdout = FramedRead::new(proc.stdout, LineCodec::new());
        let stderr = FramedRead::new(proc.stderr, LineCodec::new());
        let merged = futures_util::stream::select(stdout, stderr)
            .map(|item| item.map(|line| Bytes::from(format!("{line}\n"))))
            .boxed();

        Ok(RunStream {
            inner: merged,
            handle: proc.handle,
        })
    }

    fn extension_allowed(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.allowed_extensions
            .iter()
            .any(|ext| lowered.ends_with(ext.as_str()))
    }
}

/// Line stream of a running provisioning process.
///
/// Holds the only handle to the child; dropping the stream drops the handle
/// and the child dies with it (`kill_on_drop`), so an abandoned response
/// cannot leak a runaway run.
pub struct RunStream {
    inner: BoxStream<'static, Result<Bytes>>,
    handle: ProcessHandle,
}

impl RunStream {
    /// Handle to the underlying child, for explicit termination in tests.
    #[must_use]
    pub fn handle(&self) -> &ProcessHandle {
        &self.handle
    }
}

impl Stream for RunStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

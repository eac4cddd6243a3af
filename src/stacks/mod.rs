//! Stack store: named groups of containers defined by a compose file,
//! managed as a unit.
//!
//! Each stack is a subdirectory of the configured stacks root holding one
//! `docker-compose.yml`. Orchestration runs the compose CLI through the
//! process launcher with the stack directory as working directory. Stack
//! directories are not locked; concurrent operations on the same stack name
//! are a caller-responsibility race.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::config::StackConfig;
use crate::launcher::{self, LaunchSpec, ProcessHandle};
use crate::runtime::{ContainerEngine, ContainerSummary};
use crate::stream::ByteStream;
use crate::{AppError, Result};

/// Compose label carrying the owning project name.
const PROJECT_LABEL: &str = "com.docker.compose.project";

/// Filename stored inside every stack directory.
const COMPOSE_FILE: &str = "docker-compose.yml";

/// One stack and its observed containers.
#[derive(Debug, Clone, Serialize)]
pub struct StackSummary {
    /// Stack name (directory name).
    pub name: String,
    /// Human-readable status line.
    pub status: String,
    /// Containers currently labeled with this stack's project name.
    pub containers: Vec<ContainerSummary>,
}

/// Store and orchestrator for compose stacks.
#[derive(Debug, Clone)]
pub struct StackStore {
    dir: PathBuf,
    compose_command: Vec<String>,
}

impl StackStore {
    /// Build a store over the configured stacks directory.
    #[must_use]
    pub fn new(config: &StackConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            compose_command: config.compose_command.clone(),
        }
    }

    /// Resolve and validate a stack directory from its name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for names that are empty or contain
    /// path separators or traversal segments.
    fn stack_dir(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(AppError::Validation(format!("invalid stack name: {name}")));
        }
        Ok(self.dir.join(name))
    }

    /// Save a compose file under a new or existing stack name.
    ///
    /// # Errors
    ///
    /// `AppError::Validation` for a bad name, `AppError::Io` on write
    /// failure.
    pub async fn save(&self, name: &str, compose: &str) -> Result<()> {
        let dir = self.stack_dir(name)?;
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(COMPOSE_FILE), compose).await?;
        info!(stack = name, "compose file saved");
        Ok(())
    }

    /// List stored stack names.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` when the stacks directory cannot be read.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete a stack directory. The stack's containers are not touched.
    ///
    /// # Errors
    ///
    /// `AppError::NotFound` when the stack does not exist.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let dir = self.stack_dir(name)?;
        if !dir.is_dir() {
            return Err(AppError::NotFound(format!("stack not found: {name}")));
        }
        tokio::fs::remove_dir_all(&dir).await?;
        info!(stack = name, "stack deleted");
        Ok(())
    }

    /// Report each stored stack with its observed containers.
    ///
    /// Containers are grouped by the compose project label from the engine's
    /// listing; a stack with no labeled containers reports `Not Running`.
    /// The stack entry itself exists until explicitly deleted, regardless of
    /// container state.
    ///
    /// # Errors
    ///
    /// Propagates engine and directory-listing failures.
    pub async fn status(&self, engine: &dyn ContainerEngine) -> Result<Vec<StackSummary>> {
        let mut by_project: HashMap<String, Vec<ContainerSummary>> = HashMap::new();
        for container in engine.list().await? {
            if let Some(project) = container.labels.get(PROJECT_LABEL) {
                by_project
                    .entry(project.clone())
                    .or_default()
                    .push(container);
            }
        }

        let mut stacks = Vec::new();
        for name in self.list().await? {
            let containers = by_project.remove(&name).unwrap_or_default();
            let status = if containers.is_empty() {
                "Not Running".to_owned()
            } else {
                format!("Running ({}/{})", containers.len(), containers.len())
            };
            stacks.push(StackSummary {
                name,
                status,
                containers,
            });
        }
        Ok(stacks)
    }

    /// Bring a stack up (`up -d`).
    ///
    /// # Errors
    ///
    /// `AppError::NotFound` for an unknown stack, `AppError::Upstream` when
    /// the compose command exits non-zero.
    pub async fn up(&self, name: &str) -> Result<()> {
        self.run_compose(name, &["up", "-d"]).await
    }

    /// Take a stack down.
    ///
    /// # Errors
    ///
    /// `AppError::NotFound` for an unknown stack, `AppError::Upstream` when
    /// the compose command exits non-zero.
    pub async fn down(&self, name: &str) -> Result<()> {
        self.run_compose(name, &["down"]).await
    }

    /// Open a follow-mode log stream for a stack.
    ///
    /// Returns the merged output stream plus the handle owning the compose
    /// child; the caller must terminate the handle when the session ends so
    /// no orphaned `logs -f` process remains.
    ///
    /// # Errors
    ///
    /// `AppError::NotFound` for an unknown stack, `AppError::Launch` when
    /// the compose CLI cannot be spawned.
    pub fn follow_logs(&self, name: &str) -> Result<(ByteStream, ProcessHandle)> {
        let dir = self.stack_dir(name)?;
        if !dir.is_dir() {
            return Err(AppError::NotFound(format!("stack not found: {name}")));
        }

        let spec = self.compose_spec(&dir, &["logs", "-f"]);
        let proc = launcher::launch(&spec)?;

        let stdout = ReaderStream::new(proc.stdout).map(|res| res.map_err(AppError::from));
        let stderr = ReaderStream::new(proc.stderr).map(|res| res.map_err(AppError::from));
        let merged = futures_util::stream::select(stdout, stderr).boxed();

        Ok((merged, proc.handle))
    }

    fn compose_spec(&self, dir: &Path, args: &[&str]) -> LaunchSpec {
        let mut command = self.compose_command.iter();
        // validate() guarantees a non-empty compose command.
        let bin = command.next().map(String::as_str).unwrap_or("docker");
        LaunchSpec::new(bin)
            .args(command.cloned())
            .args(args.iter().map(ToString::to_string))
            .current_dir(dir)
    }

    async fn run_compose(&self, name: &str, args: &[&str]) -> Result<()> {
        let dir = self.stack_dir(name)?;
        if !dir.is_dir() {
            return Err(AppError::NotFound(format!("stack not found: {name}")));
        }

        let action = args.first().copied().unwrap_or("");
        let spec = self.compose_spec(&dir, args);
        let output = launcher::run_collect(&spec).await?;
        if output.success {
            info!(stack = name, action, "compose command finished");
            Ok(())
        } else {
            let lines: Vec<&str> = output.stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(5)..].join("\n");
            warn!(stack = name, action, "compose command failed");
            Err(AppError::Upstream(format!(
                "compose {action} failed for {name}: {tail}"
            )))
        }
    }
}

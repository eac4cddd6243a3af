//! External process launcher.
//!
//! Spawns long-running external commands (container CLIs, orchestration
//! tools, provisioning tools) with piped stdout/stderr and hands back:
//! - independent byte-stream read handles for both output streams, and
//! - a [`ProcessHandle`] that terminates the child idempotently.
//!
//! Children are spawned with `kill_on_drop(true)` so an abandoned handle can
//! never leave an orphaned process behind.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{AppError, Result};

/// Grace period between the polite stop signal and the forced kill.
const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// Description of an external command to launch.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Executable name or path.
    pub command: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Working directory for the child; inherits the daemon's when `None`.
    pub working_dir: Option<PathBuf>,
}

impl LaunchSpec {
    /// Create a spec for `command` with no arguments.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the child's working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// A launched child process: its two output streams plus a terminate handle.
///
/// The launcher does not interpret output. The caller owns both streams and
/// must either read them to completion or call [`ProcessHandle::terminate`]
/// to avoid leaking the child.
#[derive(Debug)]
pub struct LaunchedProcess {
    /// The child's standard output.
    pub stdout: ChildStdout,
    /// The child's standard error.
    pub stderr: ChildStderr,
    /// Handle used to terminate or await the child.
    pub handle: ProcessHandle,
}

/// Cloneable handle to a launched child process.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    child: Arc<Mutex<Child>>,
}

impl ProcessHandle {
    /// Terminate the child. Idempotent: terminating a process that has
    /// already exited is a no-op, not an error.
    ///
    /// On unix the child first receives SIGTERM; if it has not exited within
    /// the grace period it is force-killed and reaped.
    pub async fn terminate(&self) {
        let mut child = self.child.lock().await;

        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }

        #[cfg(unix)]
        if let Some(pid) = child.id().and_then(|p| i32::try_from(p).ok()) {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid),
                nix::sys::signal::Signal::SIGTERM,
            );
        }

        if tokio::time::timeout(TERMINATE_GRACE, child.wait())
            .await
            .is_err()
        {
            let _ = child.kill().await;
        }

        debug!("child process terminated");
    }

    /// Wait for the child to exit and return its exit status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the wait syscall fails.
    pub async fn wait(&self) -> Result<std::process::ExitStatus> {
        let mut child = self.child.lock().await;
        child.wait().await.map_err(|err| AppError::Io(err.to_string()))
    }

    /// OS process id of the child, while it is still running.
    pub async fn pid(&self) -> Option<u32> {
        self.child.lock().await.id()
    }

    /// Whether the child has already exited.
    pub async fn has_exited(&self) -> bool {
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(Some(_)))
    }
}

/// Launch an external command with piped stdout/stderr.
///
/// One OS process is created per call; concurrent launches are independent.
///
/// # Errors
///
/// Returns `AppError::Launch` if the executable cannot be found or spawned,
/// or if a stdio pipe cannot be captured.
pub fn launch(spec: &LaunchSpec) -> Result<LaunchedProcess> {
    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &spec.working_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .map_err(|err| AppError::Launch(format!("failed to spawn {}: {err}", spec.command)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Launch("failed to capture child stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Launch("failed to capture child stderr".into()))?;

    info!(
        command = %spec.command,
        pid = child.id().unwrap_or(0),
        "process launched"
    );

    Ok(LaunchedProcess {
        stdout,
        stderr,
        handle: ProcessHandle {
            child: Arc::new(Mutex::new(child)),
        },
    })
}

/// Output of a command run to completion via [`run_collect`].
#[derive(Debug)]
pub struct CollectedOutput {
    /// Whether the command exited with status zero.
    pub success: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Launch a command and drain both streams until it exits.
///
/// Used for short synchronous invocations (`compose up -d`, archive tools)
/// where only the exit status and captured output matter.
///
/// # Errors
///
/// Returns `AppError::Launch` if the spawn fails or `AppError::Io` if
/// reading the streams fails.
pub async fn run_collect(spec: &LaunchSpec) -> Result<CollectedOutput> {
    let mut proc = launch(spec)?;

    let mut out = Vec::new();
    let mut err = Vec::new();
    let (out_res, err_res) = tokio::join!(
        proc.stdout.read_to_end(&mut out),
        proc.stderr.read_to_end(&mut err),
    );
    out_res.map_err(|e| AppError::Io(e.to_string()))?;
    err_res.map_err(|e| AppError::Io(e.to_string()))?;

    let status = proc.handle.wait().await?;

    Ok(CollectedOutput {
        success: status.success(),
        stdout: String::from_utf8_lossy(&out).into_owned(),
        stderr: String::from_utf8_lossy(&err).into_owned(),
    })
}

//! Global configuration parsing, validation, and directory bootstrap.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{AppError, Result};

/// Stack-orchestration settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StackConfig {
    /// Directory holding one subdirectory per stack, each with a compose file.
    #[serde(default = "default_stacks_dir")]
    pub dir: PathBuf,
    /// Command invoked for stack operations; arguments like `up -d` are appended.
    #[serde(default = "default_compose_command")]
    pub compose_command: Vec<String>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            dir: default_stacks_dir(),
            compose_command: default_compose_command(),
        }
    }
}

fn default_stacks_dir() -> PathBuf {
    PathBuf::from("./data/stacks")
}

fn default_compose_command() -> Vec<String> {
    vec!["docker".into(), "compose".into()]
}

/// Provisioning-tool settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProvisionConfig {
    /// Directory scanned for playbooks.
    #[serde(default = "default_playbook_dir")]
    pub playbook_dir: PathBuf,
    /// Directory holding inventory files.
    #[serde(default = "default_inventory_dir")]
    pub inventory_dir: PathBuf,
    /// File extensions accepted as playbooks.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Provisioning binary, invoked as `<command> -i <inventory> <playbook>`.
    #[serde(default = "default_provision_command")]
    pub command: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            playbook_dir: default_playbook_dir(),
            inventory_dir: default_inventory_dir(),
            allowed_extensions: default_allowed_extensions(),
            command: default_provision_command(),
        }
    }
}

fn default_playbook_dir() -> PathBuf {
    PathBuf::from("./data/playbooks")
}

fn default_inventory_dir() -> PathBuf {
    PathBuf::from("./data/inventory")
}

fn default_allowed_extensions() -> Vec<String> {
    vec![".yml".into(), ".yaml".into()]
}

fn default_provision_command() -> String {
    "ansible-playbook".into()
}

/// Streaming-session settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StreamConfig {
    /// Number of trailing log lines replayed when a log session opens.
    #[serde(default = "default_log_tail")]
    pub log_tail: String,
    /// Interval between host system samples, in seconds.
    #[serde(default = "default_system_interval")]
    pub system_interval_seconds: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            log_tail: default_log_tail(),
            system_interval_seconds: default_system_interval(),
        }
    }
}

fn default_log_tail() -> String {
    "50".into()
}

fn default_system_interval() -> u64 {
    3
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8081))
}

fn default_files_root() -> PathBuf {
    PathBuf::from("./data/files")
}

fn default_stop_timeout() -> i64 {
    10
}

/// Global configuration parsed from `deckhand.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Root of the managed file area.
    #[serde(default = "default_files_root")]
    pub files_root: PathBuf,
    /// Seconds a container is given to stop before the runtime kills it.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_seconds: i64,
    /// Stack orchestration settings.
    #[serde(default)]
    pub stacks: StackConfig,
    /// Provisioning settings.
    #[serde(default)]
    pub provision: ProvisionConfig,
    /// Streaming-session settings.
    #[serde(default)]
    pub streams: StreamConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            files_root: default_files_root(),
            stop_timeout_seconds: default_stop_timeout(),
            stacks: StackConfig::default(),
            provision: ProvisionConfig::default(),
            streams: StreamConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Create missing managed directories and canonicalize their paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a directory cannot be created or resolved.
    pub fn validate(&mut self) -> Result<()> {
        if self.stacks.compose_command.is_empty() {
            return Err(AppError::Config(
                "stacks.compose_command must not be empty".into(),
            ));
        }
        if self.provision.command.trim().is_empty() {
            return Err(AppError::Config(
                "provision.command must not be empty".into(),
            ));
        }
        if self.stop_timeout_seconds <= 0 {
            return Err(AppError::Config(
                "stop_timeout_seconds must be greater than zero".into(),
            ));
        }

        self.stacks.dir = ensure_dir(&self.stacks.dir)?;
        self.provision.playbook_dir = ensure_dir(&self.provision.playbook_dir)?;
        self.provision.inventory_dir = ensure_dir(&self.provision.inventory_dir)?;
        self.files_root = ensure_dir(&self.files_root)?;

        Ok(())
    }
}

/// Create `path` if absent and return its canonical form.
fn ensure_dir(path: &Path) -> Result<PathBuf> {
    fs::create_dir_all(path)
        .map_err(|err| AppError::Config(format!("cannot create {}: {err}", path.display())))?;
    path.canonicalize()
        .map_err(|err| AppError::Config(format!("cannot resolve {}: {err}", path.display())))
}

//! Bounded file area.
//!
//! Every operation resolves its path against the configured root and
//! rejects traversal and symlink escapes before touching the filesystem.
//! Archive work is delegated to the `tar` binary through the process
//! launcher.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::launcher::{self, LaunchSpec};
use crate::{AppError, Result};

/// Validate that `candidate` resides within `root`.
///
/// Normalizes the candidate path, rejecting `..` traversal, then verifies
/// the resolved path still starts with the root. For existing paths,
/// canonicalization also resolves symlinks and verifies the final target.
///
/// # Errors
///
/// Returns `AppError::PathViolation` if:
/// - The root cannot be canonicalized.
/// - The candidate escapes the root via `..` segments.
/// - The resolved path does not start with the root.
/// - The path is a symlink whose target escapes the root.
pub fn validate_path(root: &Path, candidate: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root
        .canonicalize()
        .map_err(|err| AppError::PathViolation(format!("root invalid: {err}")))?;

    let mut normalized = PathBuf::new();
    for component in candidate.as_ref().components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(AppError::PathViolation(
                        "path attempts to escape the managed root".into(),
                    ));
                }
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                normalized.clear();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }

    let absolute = if normalized.is_absolute() {
        normalized
    } else {
        root.join(normalized)
    };

    if !absolute.starts_with(&root) {
        return Err(AppError::PathViolation("path outside the managed root".into()));
    }

    if absolute.exists() {
        let canonical = absolute
            .canonicalize()
            .map_err(|err| AppError::PathViolation(format!("cannot resolve path: {err}")))?;
        if !canonical.starts_with(&root) {
            return Err(AppError::PathViolation(
                "symlink target escapes the managed root".into(),
            ));
        }
        Ok(canonical)
    } else {
        Ok(absolute)
    }
}

/// One directory entry in a listing.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    /// Entry name.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Size in bytes (zero for directories).
    pub size: u64,
    /// Last modification time.
    pub modified: Option<DateTime<Utc>>,
}

/// File operations scoped to a configured root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Build a store over `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, candidate: &str) -> Result<PathBuf> {
        validate_path(&self.root, candidate)
    }

    /// List a directory.
    ///
    /// # Errors
    ///
    /// `AppError::PathViolation` for paths outside the root, `AppError::Io`
    /// on read failure.
    pub async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        let dir = self.resolve(path)?;
        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            out.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                size: if meta.is_dir() { 0 } else { meta.len() },
                modified: meta.modified().ok().map(DateTime::from),
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Read a file's contents.
    ///
    /// # Errors
    ///
    /// `AppError::NotFound` when the file does not exist.
    pub async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let file = self.resolve(path)?;
        if !file.is_file() {
            return Err(AppError::NotFound(format!("file not found: {path}")));
        }
        Ok(tokio::fs::read(&file).await?)
    }

    /// Write a file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// `AppError::PathViolation` or `AppError::Io`.
    pub async fn write(&self, path: &str, contents: &[u8]) -> Result<()> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, contents).await?;
        Ok(())
    }

    /// Delete a file or directory tree.
    ///
    /// # Errors
    ///
    /// `AppError::NotFound` when the path does not exist.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        if target.is_dir() {
            tokio::fs::remove_dir_all(&target).await?;
        } else if target.is_file() {
            tokio::fs::remove_file(&target).await?;
        } else {
            return Err(AppError::NotFound(format!("path not found: {path}")));
        }
        Ok(())
    }

    /// Move or rename within the root.
    ///
    /// # Errors
    ///
    /// `AppError::PathViolation` when either side escapes the root.
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&src, &dst).await?;
        Ok(())
    }

    /// Create a directory (and parents).
    ///
    /// # Errors
    ///
    /// `AppError::PathViolation` or `AppError::Io`.
    pub async fn mkdir(&self, path: &str) -> Result<()> {
        let dir = self.resolve(path)?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(())
    }

    /// Compress paths into a gzipped tar archive inside the root.
    ///
    /// # Errors
    ///
    /// `AppError::Validation` for an empty path list, `AppError::Io` when
    /// the archive tool fails.
    pub async fn compress(&self, paths: &[String], archive: &str) -> Result<()> {
        if paths.is_empty() {
            return Err(AppError::Validation("no paths to compress".into()));
        }
        let archive_path = self.resolve(archive)?;

        let mut args = vec![
            "-czf".to_owned(),
            archive_path.to_string_lossy().into_owned(),
            "-C".to_owned(),
            self.root.to_string_lossy().into_owned(),
        ];
        for path in paths {
            // Validated for containment, passed relative so the archive
            // holds root-relative entries.
            self.resolve(path)?;
            args.push(path.clone());
        }

        run_tar(args).await?;
        info!(archive, "archive created");
        Ok(())
    }

    /// Extract a gzipped tar archive into a directory inside the root.
    ///
    /// # Errors
    ///
    /// `AppError::NotFound` for a missing archive, `AppError::Io` when the
    /// archive tool fails.
    pub async fn extract(&self, archive: &str, dest: &str) -> Result<()> {
        let archive_path = self.resolve(archive)?;
        if !archive_path.is_file() {
            return Err(AppError::NotFound(format!("archive not found: {archive}")));
        }
        let dest_dir = self.resolve(dest)?;
        tokio::fs::create_dir_all(&dest_dir).await?;

        run_tar(vec![
            "-xzf".to_owned(),
            archive_path.to_string_lossy().into_owned(),
            "-C".to_owned(),
            dest_dir.to_string_lossy().into_owned(),
        ])
        .await?;
        info!(archive, dest, "archive extracted");
        Ok(())
    }
}

async fn run_tar(args: Vec<String>) -> Result<()> {
    let output = launcher::run_collect(&LaunchSpec::new("tar").args(args)).await?;
    if output.success {
        Ok(())
    } else {
        Err(AppError::Io(format!(
            "tar failed: {}",
            output.stderr.trim()
        )))
    }
}

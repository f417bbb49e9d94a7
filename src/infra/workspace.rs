//! Workspace cloning for parallel builds
//!
//! Each copy is a fresh directory tree duplicating the source workspace
//! minus version-control metadata, editor state and known build artifacts.
//! Files are copied, never hard linked, so concurrent builds in different
//! copies cannot observe each other's writes.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::defaults::{
    CLONE_EXCLUDES, CLONE_HIDDEN_ALLOWED, CLONE_TREE_ARTIFACTS, COPY_PREFIX,
};
use crate::error::CloneError;
use crate::infra::filesystem;

/// One disposable duplicate of a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceCopy {
    /// Workspace the copy was taken from
    pub source_path: PathBuf,
    /// Root of the copy
    pub copy_path: PathBuf,
    /// When the copy was finished
    pub created_at: SystemTime,
}

impl WorkspaceCopy {
    /// Remove the copy from disk; already gone is fine
    pub fn remove(&self) -> Result<(), CloneError> {
        filesystem::remove_dir_all(&self.copy_path).map_err(|e| CloneError::CleanupFailed {
            path: self.copy_path.clone(),
            error: e.to_string(),
        })
    }
}

/// Names left out of a copy
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    names: BTreeSet<String>,
    tree_artifacts: BTreeSet<String>,
    hidden_allowed: BTreeSet<String>,
    skip_hidden: bool,
}

/// Depth of an entry directly inside `nuttx/` or `nuttx-apps/`
const TREE_CHILD_DEPTH: usize = 2;

impl Default for ExclusionSet {
    fn default() -> Self {
        Self {
            names: CLONE_EXCLUDES.iter().map(|s| (*s).to_string()).collect(),
            tree_artifacts: CLONE_TREE_ARTIFACTS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            hidden_allowed: CLONE_HIDDEN_ALLOWED
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            skip_hidden: true,
        }
    }
}

impl ExclusionSet {
    /// Exclude another entry name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    /// Exclude another build output found at the top of a source tree
    #[must_use]
    pub fn with_tree_artifact(mut self, name: impl Into<String>) -> Self {
        self.tree_artifacts.insert(name.into());
        self
    }

    /// Keep hidden entries (except explicitly excluded names)
    #[must_use]
    pub fn keep_hidden(mut self) -> Self {
        self.skip_hidden = false;
        self
    }

    /// Whether an entry `depth` levels below the workspace root is left out
    pub fn excludes_at(&self, name: &OsStr, depth: usize) -> bool {
        self.excludes(name)
            || (depth == TREE_CHILD_DEPTH && self.tree_artifacts.contains(name.to_string_lossy().as_ref()))
    }

    /// Whether an entry with this file name is left out at any depth
    pub fn excludes(&self, name: &OsStr) -> bool {
        let name = name.to_string_lossy();
        if self.names.contains(name.as_ref()) {
            return true;
        }
        self.skip_hidden && name.starts_with('.') && !self.hidden_allowed.contains(name.as_ref())
    }
}

/// Produces independent workspace copies
#[derive(Debug, Clone)]
pub struct WorkspaceCloner {
    target_dir: PathBuf,
    exclusions: ExclusionSet,
    cancel: CancellationToken,
}

impl Default for WorkspaceCloner {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl WorkspaceCloner {
    /// Cloner placing copies under `target_dir`
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            exclusions: ExclusionSet::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Abandon copying (and roll back) once `cancel` fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the exclusion set
    #[must_use]
    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Directory the copies are created in
    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Create `count` copies of `source`, in order
    ///
    /// On any failure every copy made so far, including the partial one, is
    /// removed before the error is returned.
    pub fn clone_workspace(
        &self,
        source: &Path,
        count: usize,
    ) -> Result<Vec<WorkspaceCopy>, CloneError> {
        if !source.is_dir() {
            return Err(CloneError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        debug!(
            "Copying workspace {} to {} for {count} parallel builds",
            source.display(),
            self.target_dir.display()
        );

        std::fs::create_dir_all(&self.target_dir).map_err(|e| CloneError::CopyFailed {
            source_path: source.to_path_buf(),
            copy_path: self.target_dir.clone(),
            error: e.to_string(),
        })?;

        let mut copies: Vec<WorkspaceCopy> = Vec::with_capacity(count);
        for index in 0..count {
            match self.clone_one(source, index) {
                Ok(copy) => copies.push(copy),
                Err(e) => {
                    warn!("Workspace copy {index} failed, rolling back: {e}");
                    if let Err(cleanup) = Self::cleanup(&copies) {
                        warn!("Rollback incomplete: {cleanup}");
                    }
                    return Err(e);
                }
            }
        }

        info!(
            "Created {count} workspace copies in {}",
            self.target_dir.display()
        );
        Ok(copies)
    }

    /// Remove copies; paths already gone are skipped
    ///
    /// Every copy is attempted; the first failure is reported.
    pub fn cleanup(copies: &[WorkspaceCopy]) -> Result<(), CloneError> {
        debug!("Cleaning up {} workspace copies", copies.len());
        let mut first_error = None;
        for copy in copies {
            match copy.remove() {
                Ok(()) => debug!("Removed workspace copy {}", copy.copy_path.display()),
                Err(e) => {
                    warn!("{e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn clone_one(&self, source: &Path, index: usize) -> Result<WorkspaceCopy, CloneError> {
        let copy_path = tempfile::Builder::new()
            .prefix(&format!("{COPY_PREFIX}{index}_"))
            .tempdir_in(&self.target_dir)
            .map_err(|e| CloneError::CopyFailed {
                source_path: source.to_path_buf(),
                copy_path: self.target_dir.clone(),
                error: e.to_string(),
            })?
            .keep();

        debug!("Copying to: {}", copy_path.display());

        if let Err(e) = self.copy_tree(source, &copy_path) {
            if let Err(cleanup) = filesystem::remove_dir_all(&copy_path) {
                warn!(
                    "Failed to remove partial copy {}: {cleanup}",
                    copy_path.display()
                );
            }
            return Err(e);
        }

        Ok(WorkspaceCopy {
            source_path: source.to_path_buf(),
            copy_path,
            created_at: SystemTime::now(),
        })
    }

    fn copy_tree(&self, source: &Path, dest: &Path) -> Result<(), CloneError> {
        let fail = |path: &Path, error: String| CloneError::CopyFailed {
            source_path: source.to_path_buf(),
            copy_path: path.to_path_buf(),
            error,
        };

        let walker = WalkDir::new(source)
            .follow_links(false)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| {
                entry.path() != self.target_dir
                    && !self.exclusions.excludes_at(entry.file_name(), entry.depth())
            });

        for entry in walker {
            if self.cancel.is_cancelled() {
                return Err(CloneError::Interrupted);
            }
            let entry = entry.map_err(|e| fail(dest, e.to_string()))?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| fail(dest, e.to_string()))?;
            let target = dest.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                std::fs::create_dir(&target).map_err(|e| fail(&target, e.to_string()))?;
            } else if file_type.is_symlink() {
                copy_symlink(entry.path(), source, dest, &target)
                    .map_err(|e| fail(&target, e.to_string()))?;
            } else if file_type.is_file() {
                std::fs::copy(entry.path(), &target).map_err(|e| fail(&target, e.to_string()))?;
            } else {
                debug!("Skipping special file {}", entry.path().display());
            }
        }

        Ok(())
    }
}

/// Recreate a symlink inside the copy
///
/// Absolute links pointing into the source workspace are re-rooted into the
/// copy so builds never write through them into the original tree.
#[cfg(unix)]
fn copy_symlink(link: &Path, source: &Path, dest: &Path, target: &Path) -> std::io::Result<()> {
    let pointee = std::fs::read_link(link)?;
    let pointee = match pointee.strip_prefix(source) {
        Ok(inside) if pointee.is_absolute() => dest.join(inside),
        _ => pointee,
    };
    std::os::unix::fs::symlink(pointee, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, _source: &Path, _dest: &Path, target: &Path) -> std::io::Result<()> {
    if link.is_dir() {
        std::fs::create_dir_all(target)
    } else {
        std::fs::copy(link, target).map(|_| ())
    }
}

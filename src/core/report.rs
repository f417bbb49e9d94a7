//! Last build summary
//!
//! The orchestrator records each build's results in
//! `.ntxbuild/last-build.json` so `info` can show them later.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::defaults::BUILD_REPORT_FILE;
use crate::infra::filesystem;
use crate::infra::process::BuildResult;

/// Persisted summary of one `build` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// `board:defconfig` that was built
    pub target: String,
    /// Number of parallel slots requested
    pub parallel: usize,
    /// Seconds since the Unix epoch when the build finished
    pub finished_at: u64,
    /// One entry per slot, in slot order
    pub results: Vec<BuildResult>,
}

impl BuildReport {
    /// Report stamped with the current time
    pub fn new(target: String, parallel: usize, results: Vec<BuildResult>) -> Self {
        let finished_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            target,
            parallel,
            finished_at,
            results,
        }
    }

    /// Whether every slot succeeded
    pub fn all_succeeded(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.succeeded)
    }

    /// Report location inside a state directory
    pub fn path_in(state_dir: &Path) -> PathBuf {
        state_dir.join(BUILD_REPORT_FILE)
    }

    /// Write the report into `state_dir`, creating it if needed
    pub fn save(&self, state_dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(state_dir)?;
        let json = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        filesystem::write_atomic(&Self::path_in(state_dir), &json)
    }

    /// Read the report from `state_dir`; `None` if no build ran yet
    pub fn load(state_dir: &Path) -> std::io::Result<Option<Self>> {
        let path = Self::path_in(state_dir);
        match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

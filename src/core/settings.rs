//! User settings
//!
//! Reads optional defaults from `config.toml` in the config directory.
//! Only a closed set of keys is recognized; anything else is a parse error
//! rather than a silently ignored typo.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::defaults::{DEFAULT_MAKE, DEFAULT_NORMALIZE_TARGET, DEFAULT_PARALLEL};
use crate::error::SettingsError;
use crate::infra::dirs::NtxDirs;

/// User settings for ntxbuild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Build defaults
    #[serde(default)]
    pub build: BuildSettings,

    /// Kconfig defaults
    #[serde(default)]
    pub kconfig: KconfigSettings,
}

/// `[build]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSettings {
    /// Job-count hint passed to each make invocation
    pub jobs: Option<usize>,

    /// Number of parallel workspace copies
    pub parallel: Option<usize>,

    /// Where workspace copies are created
    pub clone_dir: Option<PathBuf>,

    /// Leave workspace copies on disk after a build
    pub keep_copies: Option<bool>,

    /// Build tool to invoke
    pub make: Option<String>,
}

/// `[kconfig]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KconfigSettings {
    /// Make target run by `kconfig apply`
    pub normalize_target: Option<String>,
}

impl Settings {
    /// Load settings from the config directory
    pub fn load(dirs: &NtxDirs) -> Result<Self, SettingsError> {
        Self::load_from_path(&dirs.settings_path())
    }

    /// Load settings from a specific path; a missing file yields defaults
    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| SettingsError::Parse {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Job count, defaulting to the number of CPUs
    pub fn jobs(&self) -> usize {
        self.build.jobs.filter(|&j| j > 0).unwrap_or_else(num_cpus::get)
    }

    /// Parallel copy count
    pub fn parallel(&self) -> usize {
        self.build
            .parallel
            .filter(|&p| p > 0)
            .unwrap_or(DEFAULT_PARALLEL)
    }

    /// Clone target directory, defaulting to the system temp dir
    pub fn clone_dir(&self) -> PathBuf {
        self.build.clone_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Whether copies survive the build
    pub fn keep_copies(&self) -> bool {
        self.build.keep_copies.unwrap_or(false)
    }

    /// Build tool
    pub fn make(&self) -> &str {
        self.build.make.as_deref().unwrap_or(DEFAULT_MAKE)
    }

    /// Normalization target for `kconfig apply`
    pub fn normalize_target(&self) -> &str {
        self.kconfig
            .normalize_target
            .as_deref()
            .unwrap_or(DEFAULT_NORMALIZE_TARGET)
    }
}

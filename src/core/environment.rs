//! Build environment descriptor
//!
//! An [`Environment`] names the workspace root, the two source trees inside
//! it and the board/defconfig pair selected at `start`. It is persisted as
//! plain `key=value` lines in `.ntxenv` at the workspace root; a missing
//! descriptor means the workspace was never initialized.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::config::defaults::{ENV_FILE_NAME, KCONFIG_FILE_NAME, STATE_DIR_NAME};
use crate::error::EnvError;
use crate::infra::filesystem;

const KEY_NUTTX_DIR: &str = "nuttx_dir";
const KEY_APPS_DIR: &str = "apps_dir";
const KEY_BOARD: &str = "board";
const KEY_DEFCONFIG: &str = "defconfig";

/// Resolved build context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    /// Directory holding both source trees and the descriptor
    pub workspace_path: PathBuf,
    /// NuttX kernel directory name
    pub nuttx_dir_name: String,
    /// NuttX applications directory name
    pub apps_dir_name: String,
    /// Board name (e.g. `sim`)
    pub board: String,
    /// Defconfig name (e.g. `nsh`)
    pub defconfig: String,
}

impl Environment {
    /// Path to the NuttX kernel tree
    pub fn nuttx_path(&self) -> PathBuf {
        self.workspace_path.join(&self.nuttx_dir_name)
    }

    /// Path to the applications tree
    pub fn apps_path(&self) -> PathBuf {
        self.workspace_path.join(&self.apps_dir_name)
    }

    /// Primary Kconfig assignment file
    pub fn config_path(&self) -> PathBuf {
        self.nuttx_path().join(KCONFIG_FILE_NAME)
    }

    /// Orchestrator-managed state directory
    pub fn state_dir(&self) -> PathBuf {
        self.workspace_path.join(STATE_DIR_NAME)
    }

    /// Apps path as `configure.sh` expects it, relative to the NuttX tree
    pub fn relative_apps_path(&self) -> String {
        format!("../{}", self.apps_dir_name)
    }

    /// `board:defconfig`
    pub fn target(&self) -> String {
        format!("{}:{}", self.board, self.defconfig)
    }

    /// Same environment rooted somewhere else (a workspace copy)
    #[must_use]
    pub fn relocated(&self, workspace_path: &Path) -> Self {
        Self {
            workspace_path: workspace_path.to_path_buf(),
            ..self.clone()
        }
    }

    /// Check both source trees exist as directories
    pub fn validate_layout(&self) -> Result<(), EnvError> {
        for (label, path) in [("NuttX", self.nuttx_path()), ("apps", self.apps_path())] {
            if !path.is_dir() {
                return Err(EnvError::WorkspaceInvalid {
                    path: self.workspace_path.clone(),
                    reason: format!("{label} directory not found: {}", path.display()),
                });
            }
        }
        Ok(())
    }

    /// Check the trees look like NuttX sources before running its scripts
    pub fn validate_sources(&self) -> Result<(), EnvError> {
        self.validate_layout()?;

        let required = [
            self.nuttx_path().join("Makefile"),
            self.nuttx_path().join("INVIOLABLES.md"),
            self.apps_path().join("Make.defs"),
        ];
        for file in required {
            if !file.is_file() {
                return Err(EnvError::WorkspaceInvalid {
                    path: self.workspace_path.clone(),
                    reason: format!("missing {}", file.display()),
                });
            }
        }
        debug!("NuttX environment validation successful");
        Ok(())
    }

    /// Render the descriptor file content
    pub fn to_descriptor(&self) -> String {
        let mut out = String::new();
        for (key, value) in [
            (KEY_NUTTX_DIR, &self.nuttx_dir_name),
            (KEY_APPS_DIR, &self.apps_dir_name),
            (KEY_BOARD, &self.board),
            (KEY_DEFCONFIG, &self.defconfig),
        ] {
            let _ = writeln!(out, "{key}={value}");
        }
        out
    }

    /// Parse descriptor content for a workspace rooted at `workspace_path`
    pub fn from_descriptor(workspace_path: &Path, content: &str) -> Result<Self, EnvError> {
        let descriptor = workspace_path.join(ENV_FILE_NAME);
        let malformed = |reason: String| EnvError::MalformedDescriptor {
            path: descriptor.clone(),
            reason,
        };

        let (mut nuttx, mut apps, mut board, mut defconfig) = (None, None, None, None);
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| malformed(format!("line {}: expected key=value", lineno + 1)))?;
            let slot = match key.trim() {
                KEY_NUTTX_DIR => &mut nuttx,
                KEY_APPS_DIR => &mut apps,
                KEY_BOARD => &mut board,
                KEY_DEFCONFIG => &mut defconfig,
                other => return Err(malformed(format!("unknown key '{other}'"))),
            };
            *slot = Some(value.trim().to_string());
        }

        let require = |value: Option<String>, key: &str| {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| malformed(format!("missing '{key}'")))
        };

        Ok(Self {
            workspace_path: workspace_path.to_path_buf(),
            nuttx_dir_name: require(nuttx, KEY_NUTTX_DIR)?,
            apps_dir_name: require(apps, KEY_APPS_DIR)?,
            board: require(board, KEY_BOARD)?,
            defconfig: require(defconfig, KEY_DEFCONFIG)?,
        })
    }
}

/// Reads and writes the descriptor of one workspace
#[derive(Debug, Clone)]
pub struct EnvironmentManager {
    workspace_root: PathBuf,
}

impl EnvironmentManager {
    /// Manager for the workspace rooted at `workspace_root`
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
        }
    }

    /// Find the nearest initialized workspace at or above `start`
    pub fn discover(start: &Path) -> Result<Self, EnvError> {
        start
            .ancestors()
            .find(|dir| dir.join(ENV_FILE_NAME).is_file())
            .map(Self::new)
            .ok_or_else(|| EnvError::EnvironmentNotFound {
                path: start.join(ENV_FILE_NAME),
            })
    }

    /// Workspace root
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Descriptor location
    pub fn descriptor_path(&self) -> PathBuf {
        self.workspace_root.join(ENV_FILE_NAME)
    }

    /// Whether a descriptor exists
    pub fn is_initialized(&self) -> bool {
        self.descriptor_path().is_file()
    }

    /// Validate the workspace and persist a new environment
    ///
    /// Nothing is written when validation fails.
    pub fn start(
        &self,
        board: &str,
        defconfig: &str,
        nuttx_dir_name: &str,
        apps_dir_name: &str,
    ) -> Result<Environment, EnvError> {
        let env = self.resolve(board, defconfig, nuttx_dir_name, apps_dir_name)?;
        self.persist(&env)?;

        info!(
            "Environment initialized: {} in {}",
            env.target(),
            self.workspace_root.display()
        );
        Ok(env)
    }

    /// Build and layout-check an environment without writing anything
    pub fn resolve(
        &self,
        board: &str,
        defconfig: &str,
        nuttx_dir_name: &str,
        apps_dir_name: &str,
    ) -> Result<Environment, EnvError> {
        for (label, value) in [
            ("board", board),
            ("defconfig", defconfig),
            ("nuttx directory", nuttx_dir_name),
            ("apps directory", apps_dir_name),
        ] {
            if value.trim().is_empty() || value.contains(['\n', '\r']) {
                return Err(EnvError::WorkspaceInvalid {
                    path: self.workspace_root.clone(),
                    reason: format!("invalid {label} name '{value}'"),
                });
            }
        }

        let env = Environment {
            workspace_path: self.workspace_root.clone(),
            nuttx_dir_name: nuttx_dir_name.trim().to_string(),
            apps_dir_name: apps_dir_name.trim().to_string(),
            board: board.trim().to_string(),
            defconfig: defconfig.trim().to_string(),
        };
        env.validate_layout()?;
        Ok(env)
    }

    /// Read the persisted environment
    pub fn load(&self) -> Result<Environment, EnvError> {
        let path = self.descriptor_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EnvError::EnvironmentNotFound { path });
            }
            Err(e) => {
                return Err(EnvError::Io {
                    path,
                    error: e.to_string(),
                })
            }
        };
        debug!("Loaded environment descriptor {}", path.display());
        Environment::from_descriptor(&self.workspace_root, &content)
    }

    /// Atomically overwrite the descriptor
    pub fn persist(&self, env: &Environment) -> Result<(), EnvError> {
        let path = self.descriptor_path();
        filesystem::write_atomic(&path, env.to_descriptor().as_bytes()).map_err(|e| EnvError::Io {
            path,
            error: e.to_string(),
        })
    }

    /// Remove the descriptor and the orchestrator state directory
    ///
    /// Source trees are left alone.
    pub fn reset(&self) -> Result<(), EnvError> {
        let descriptor = self.descriptor_path();
        debug!("Clearing environment descriptor {}", descriptor.display());
        filesystem::remove_file(&descriptor).map_err(|e| EnvError::Io {
            path: descriptor,
            error: e.to_string(),
        })?;

        let state = self.workspace_root.join(STATE_DIR_NAME);
        filesystem::remove_dir_all(&state).map_err(|e| EnvError::Io {
            path: state,
            error: e.to_string(),
        })
    }
}

/// Walk upward from `start` to a directory holding both source trees
pub fn find_workspace_root(start: &Path, nuttx_dir_name: &str, apps_dir_name: &str) -> Option<PathBuf> {
    debug!(
        "Searching NuttX root from {} for {nuttx_dir_name} and {apps_dir_name}",
        start.display()
    );
    start
        .ancestors()
        .find(|dir| dir.join(nuttx_dir_name).is_dir() && dir.join(apps_dir_name).is_dir())
        .map(Path::to_path_buf)
}

//! Error types for ntxbuild
//!
//! Domain-specific error types using thiserror. Each component owns its
//! enum; [`NtxError`] gathers them for callers that drive several
//! components at once.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::defaults::CANCELLED_CODE;

/// Environment descriptor and workspace errors
#[derive(Error, Debug)]
pub enum EnvError {
    /// No descriptor at the expected location
    #[error("No NuttX environment found at '{path}'. Run 'ntxbuild start' first.")]
    EnvironmentNotFound { path: PathBuf },

    /// Source trees missing or not shaped like a NuttX workspace
    #[error("Invalid NuttX workspace at '{path}': {reason}")]
    WorkspaceInvalid { path: PathBuf, reason: String },

    /// Descriptor exists but cannot be understood
    #[error("Malformed environment descriptor '{path}': {reason}")]
    MalformedDescriptor { path: PathBuf, reason: String },

    /// IO error on the descriptor or state directory
    #[error("IO error for '{path}': {error}")]
    Io { path: PathBuf, error: String },
}

/// External process errors
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The command could not be started
    #[error("Failed to launch '{command}': {error}")]
    LaunchError { command: String, error: String },

    /// Relaying the child's output failed
    #[error("Output stream of '{command}' failed: {error}")]
    StreamError { command: String, error: String },
}

/// Workspace cloning errors
#[derive(Error, Debug)]
pub enum CloneError {
    /// Source workspace does not exist
    #[error("Workspace to clone not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Copy could not be completed; partial copies were rolled back
    #[error("Failed to copy '{source_path}' to '{copy_path}': {error}")]
    CopyFailed {
        source_path: PathBuf,
        copy_path: PathBuf,
        error: String,
    },

    /// Cancellation arrived while copying; partial copies were rolled back
    #[error("Workspace copy interrupted")]
    Interrupted,

    /// One or more copies could not be removed
    #[error("Failed to remove workspace copy '{path}': {error}")]
    CleanupFailed { path: PathBuf, error: String },
}

/// Kconfig editing errors
#[derive(Error, Debug)]
pub enum KconfigError {
    /// Target configuration file is missing
    #[error("Configuration file not found at '{path}'. Run 'ntxbuild start' first.")]
    ConfigNotFound { path: PathBuf },

    /// Key not present in the configuration schema
    #[error("Kconfig option '{key}' not found")]
    UnknownConfigKey { key: String },

    /// Value does not fit the option
    #[error("Invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// IO error on the configuration file
    #[error("IO error for '{path}': {error}")]
    Io { path: PathBuf, error: String },
}

/// Build orchestration errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// Build tool exited unsuccessfully
    #[error("Build in '{location}' failed with exit code {exit_code}")]
    BuildFailed { location: PathBuf, exit_code: i32 },

    /// Run was interrupted; children were killed and copies removed
    #[error("Build cancelled")]
    Cancelled,

    /// A build task died before reporting
    #[error("Build task panicked: {0}")]
    TaskPanicked(String),

    /// Cloning error
    #[error(transparent)]
    Clone(#[from] CloneError),

    /// Process error
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Environment error
    #[error(transparent)]
    Env(#[from] EnvError),
}

impl BuildError {
    /// Process exit status the CLI reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cancelled => CANCELLED_CODE,
            Self::BuildFailed { .. } => 2,
            _ => 1,
        }
    }
}

/// User settings errors
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Failed to read settings file
    #[error("Failed to read config file '{path}': {error}")]
    Read { path: String, error: String },

    /// Failed to parse settings file
    #[error("Failed to parse config file '{path}': {error}")]
    Parse { path: String, error: String },
}

/// Top-level ntxbuild error type
#[derive(Error, Debug)]
pub enum NtxError {
    /// Environment error
    #[error(transparent)]
    Env(#[from] EnvError),

    /// Process error
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Clone error
    #[error(transparent)]
    Clone(#[from] CloneError),

    /// Kconfig error
    #[error(transparent)]
    Kconfig(#[from] KconfigError),

    /// Build error
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Settings error
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl NtxError {
    /// Process exit status the CLI reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Build(e) => e.exit_code(),
            _ => 1,
        }
    }
}

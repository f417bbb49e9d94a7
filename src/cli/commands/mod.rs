//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod board;
pub mod build;
pub mod clean;
pub mod info;
pub mod kconfig;
pub mod start;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Subcommand;
use tokio_util::sync::CancellationToken;

use crate::config::defaults::{NUTTX_APPS_DEFAULT_DIR_NAME, NUTTX_DEFAULT_DIR_NAME};
use crate::core::environment::{Environment, EnvironmentManager};
use crate::core::kconfig::KconfigManager;
use crate::core::orchestrator::{BuildOptions, BuildOrchestrator};
use crate::core::settings::Settings;
use crate::infra::dirs::NtxDirs;
use crate::infra::process::ProcessRunner;
use crate::infra::workspace::WorkspaceCloner;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize and validate a NuttX environment
    Start {
        /// Board name (e.g. sim)
        board: String,

        /// Defconfig name (e.g. nsh)
        defconfig: String,

        /// NuttX directory name inside the workspace
        #[arg(long, default_value = NUTTX_DEFAULT_DIR_NAME)]
        nuttx_dir: String,

        /// Applications directory name inside the workspace
        #[arg(long, default_value = NUTTX_APPS_DEFAULT_DIR_NAME)]
        apps_dir: String,
    },

    /// Build NuttX
    Build {
        /// Number of isolated builds to run side by side
        #[arg(short = 'j', long)]
        parallel: Option<usize>,

        /// Job count passed to make as -j
        #[arg(long)]
        jobs: Option<usize>,

        /// Leave workspace copies on disk for inspection
        #[arg(long)]
        keep_copies: bool,
    },

    /// Remove build artifacts (make clean)
    Clean,

    /// Reset the NuttX tree and the environment (make distclean)
    Distclean,

    /// Inspect or edit the Kconfig configuration
    Kconfig {
        #[command(subcommand)]
        command: KconfigCommands,
    },

    /// List boards and their defconfigs
    List {
        /// Only boards of this architecture
        #[arg(long, conflicts_with_all = ["soc", "board"])]
        arch: Option<String>,

        /// Only boards of this chip family
        #[arg(long, conflicts_with = "board")]
        soc: Option<String>,

        /// Only this board, with its defconfigs
        #[arg(long)]
        board: Option<String>,
    },

    /// Show workspace and build information
    Info,
}

/// Kconfig subcommands
#[derive(Subcommand, Debug)]
pub enum KconfigCommands {
    /// Print one option, or every option
    Read {
        /// Option name, with or without CONFIG_
        key: Option<String>,
    },

    /// Enable or disable a bool option
    SetValue {
        key: String,

        /// y or n
        #[arg(action = clap::ArgAction::Set, value_parser = kconfig::parse_switch)]
        value: bool,
    },

    /// Set a string option
    SetStr { key: String, value: String },

    /// Set an int or hex option
    SetNum { key: String, value: String },

    /// Apply every assignment of a config fragment
    Merge { file: PathBuf },

    /// Resolve dependent options (make olddefconfig)
    Apply,

    /// Open the interactive configurator
    Menuconfig,
}

/// Shared state for one invocation
#[derive(Debug, Clone)]
pub struct Context {
    pub cwd: PathBuf,
    pub settings: Settings,
    pub runner: ProcessRunner,
}

impl Context {
    /// Current directory, user settings and a runner observing `cancel`
    pub fn load(cancel: CancellationToken) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let settings = Settings::load(&NtxDirs::new())?;
        Ok(Self {
            cwd,
            settings,
            runner: ProcessRunner::new().with_cancellation(cancel),
        })
    }

    /// Environment of the enclosing workspace
    pub fn environment(&self) -> Result<Environment> {
        Ok(EnvironmentManager::discover(&self.cwd)?.load()?)
    }

    pub fn orchestrator(&self, options: BuildOptions) -> Result<BuildOrchestrator> {
        Ok(BuildOrchestrator::new(self.environment()?, self.runner.clone())
            .with_cloner(WorkspaceCloner::new(self.settings.clone_dir()))
            .with_options(options))
    }

    pub fn kconfig(&self) -> Result<KconfigManager> {
        Ok(KconfigManager::new(&self.environment()?, self.runner.clone())
            .with_make(self.settings.make())
            .with_normalize_target(self.settings.normalize_target()))
    }
}

impl Commands {
    /// Execute the command
    pub async fn run(self, ctx: &Context) -> Result<()> {
        match self {
            Self::Start {
                board,
                defconfig,
                nuttx_dir,
                apps_dir,
            } => start::execute(ctx, &board, &defconfig, &nuttx_dir, &apps_dir).await,
            Self::Build {
                parallel,
                jobs,
                keep_copies,
            } => {
                let args = build::BuildArgs {
                    parallel,
                    jobs,
                    keep_copies,
                };
                build::execute(ctx, args).await
            }
            Self::Clean => clean::execute_clean(ctx).await,
            Self::Distclean => clean::execute_distclean(ctx).await,
            Self::Kconfig { command } => kconfig::execute(ctx, command).await,
            Self::List { arch, soc, board } => board::execute_list(ctx, arch, soc, board),
            Self::Info => info::execute(ctx),
        }
    }
}

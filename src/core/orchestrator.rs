//! Build orchestration
//!
//! Drives the external build tool for one [`Environment`]. A single-slot
//! build runs in the primary workspace. With more slots the workspace is
//! cloned once per slot and one task per copy runs the build concurrently:
//!
//! ```text
//! clone ──► spawn slot 0 ─┐
//!       ├─► spawn slot 1 ─┼─► join in slot order ──► cleanup ──► report
//!       └─► spawn slot N ─┘
//! ```
//!
//! Slots are fail-soft: a failing build never stops its siblings. Copies are
//! removed after the join whatever the outcome, unless `keep_copies` is set.

use std::path::Path;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::defaults::{
    CLEAN_TARGET, CONFIGURE_SCRIPT, CONFIGURE_SHELL, DEFAULT_MAKE, DISTCLEAN_TARGET,
};
use crate::core::environment::{Environment, EnvironmentManager};
use crate::core::report::BuildReport;
use crate::core::settings::Settings;
use crate::error::{BuildError, CloneError};
use crate::infra::process::{BuildResult, CommandSpec, ProcessRunner};
use crate::infra::workspace::{WorkspaceCloner, WorkspaceCopy};

/// Knobs for build invocations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Build tool command line, e.g. `make` or `bear -- make`
    pub make: String,
    /// `-j` hint passed to every invocation
    pub jobs: usize,
    /// Leave workspace copies on disk
    pub keep_copies: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            make: DEFAULT_MAKE.to_string(),
            jobs: num_cpus::get(),
            keep_copies: false,
        }
    }
}

impl BuildOptions {
    /// Options taken from user settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            make: settings.make().to_string(),
            jobs: settings.jobs(),
            keep_copies: settings.keep_copies(),
        }
    }
}

/// Coordinates builds for one environment
#[derive(Debug, Clone)]
pub struct BuildOrchestrator {
    env: Environment,
    runner: ProcessRunner,
    cloner: WorkspaceCloner,
    options: BuildOptions,
}

impl BuildOrchestrator {
    pub fn new(env: Environment, runner: ProcessRunner) -> Self {
        Self {
            env,
            runner,
            cloner: WorkspaceCloner::default(),
            options: BuildOptions::default(),
        }
    }

    #[must_use]
    pub fn with_cloner(mut self, cloner: WorkspaceCloner) -> Self {
        self.cloner = cloner;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    fn make(&self, dir: &Path) -> CommandSpec {
        CommandSpec::from_line(&self.options.make, dir)
    }

    fn build_command(&self, dir: &Path) -> CommandSpec {
        self.make(dir).arg(format!("-j{}", self.options.jobs.max(1)))
    }

    fn check_cancelled(&self) -> Result<(), BuildError> {
        if self.runner.cancellation().is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        Ok(())
    }

    /// Build with `parallel` slots, returning one result per slot
    ///
    /// Non-zero exits are reported in the results. `Err` means the run as a
    /// whole could not proceed: invalid workspace, cloning failure, cleanup
    /// failure or cancellation.
    pub async fn build(&self, parallel: usize) -> Result<Vec<BuildResult>, BuildError> {
        let parallel = parallel.max(1);
        self.env.validate_layout()?;
        self.check_cancelled()?;
        info!("Starting build of {} with parallel={parallel}", self.env.target());

        let results = if parallel == 1 {
            let result = self.runner.run(&self.build_command(&self.env.nuttx_path())).await?;
            vec![result]
        } else {
            self.build_copies(parallel).await?
        };
        self.check_cancelled()?;

        let report = BuildReport::new(self.env.target(), parallel, results);
        if let Err(e) = report.save(&self.env.state_dir()) {
            warn!("Failed to write build report: {e}");
        }

        let failed = report.results.iter().filter(|r| !r.succeeded).count();
        if failed == 0 {
            info!("All {parallel} build(s) succeeded");
        } else {
            warn!("{failed} of {parallel} build(s) failed");
        }
        Ok(report.results)
    }

    async fn build_copies(&self, parallel: usize) -> Result<Vec<BuildResult>, BuildError> {
        let cloner = self
            .cloner
            .clone()
            .with_cancellation(self.runner.cancellation().clone());
        let source = self.env.workspace_path.clone();
        let copies = tokio::task::spawn_blocking(move || cloner.clone_workspace(&source, parallel))
            .await
            .map_err(|e| BuildError::TaskPanicked(e.to_string()))?
            .map_err(|e| match e {
                CloneError::Interrupted => BuildError::Cancelled,
                other => other.into(),
            })?;

        let outcome = if self.runner.cancellation().is_cancelled() {
            Err(BuildError::Cancelled)
        } else {
            self.run_slots(&copies).await
        };

        self.release(copies).await?;
        outcome
    }

    /// One task per copy, joined in slot order
    async fn run_slots(&self, copies: &[WorkspaceCopy]) -> Result<Vec<BuildResult>, BuildError> {
        let handles: Vec<_> = copies
            .iter()
            .enumerate()
            .map(|(slot, copy)| {
                let runner = self.runner.clone();
                let spec = self.build_command(&self.env.relocated(&copy.copy_path).nuttx_path());
                tokio::spawn(async move {
                    debug!("Slot {slot}: {spec} in {}", spec.working_dir.display());
                    match runner.run(&spec).await {
                        Ok(result) => result,
                        Err(e) => {
                            warn!("Slot {slot}: {e}");
                            BuildResult::launch_failed(&spec.working_dir, spec.to_string(), &e)
                        }
                    }
                })
            })
            .collect();

        // join_all keeps slot order; every task runs to completion first
        join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.map_err(|e| BuildError::TaskPanicked(e.to_string())))
            .collect()
    }

    async fn release(&self, copies: Vec<WorkspaceCopy>) -> Result<(), BuildError> {
        if self.options.keep_copies {
            for copy in &copies {
                info!("Keeping workspace copy {}", copy.copy_path.display());
            }
            return Ok(());
        }
        tokio::task::spawn_blocking(move || WorkspaceCloner::cleanup(&copies))
            .await
            .map_err(|e| BuildError::TaskPanicked(e.to_string()))??;
        Ok(())
    }

    /// `make clean` in the primary workspace
    pub async fn clean(&self) -> Result<BuildResult, BuildError> {
        self.env.validate_layout()?;
        info!("Running clean");
        self.run_primary(self.make(&self.env.nuttx_path()).arg(CLEAN_TARGET))
            .await
    }

    /// `make distclean`, then drop the descriptor and orchestrator state
    ///
    /// The environment is only reset when the build tool succeeds.
    pub async fn distclean(&self) -> Result<BuildResult, BuildError> {
        self.env.validate_layout()?;
        info!("Running distclean");
        let result = self
            .run_primary(self.make(&self.env.nuttx_path()).arg(DISTCLEAN_TARGET))
            .await?;
        if result.succeeded {
            EnvironmentManager::new(&self.env.workspace_path).reset()?;
        }
        Ok(result)
    }

    /// Run the NuttX configure script for `board:defconfig`
    pub async fn initialize(&self, board: &str, defconfig: &str) -> Result<BuildResult, BuildError> {
        self.env.validate_sources()?;
        info!("Setting up NuttX: board={board}, defconfig={defconfig}");

        let spec = CommandSpec::new(CONFIGURE_SHELL, self.env.nuttx_path()).args([
            CONFIGURE_SCRIPT.to_string(),
            "-a".to_string(),
            self.env.relative_apps_path(),
            format!("{board}:{defconfig}"),
        ]);
        self.run_primary(spec).await
    }

    async fn run_primary(&self, spec: CommandSpec) -> Result<BuildResult, BuildError> {
        let result = self.runner.run(&spec).await?;
        if result.cancelled {
            return Err(BuildError::Cancelled);
        }
        Ok(result)
    }
}

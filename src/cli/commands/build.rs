//! Build command implementation
//!
//! Implements `ntxbuild build`. Flags win over `config.toml`, which wins
//! over built-in defaults.

use anyhow::Result;

use crate::cli::output;
use crate::core::orchestrator::BuildOptions;
use crate::infra::process::BuildResult;

/// Build flags as given on the command line
#[derive(Debug, Clone, Default)]
pub struct BuildArgs {
    /// Number of isolated builds
    pub parallel: Option<usize>,
    /// make -j hint
    pub jobs: Option<usize>,
    /// Keep workspace copies
    pub keep_copies: bool,
}

impl BuildArgs {
    fn resolve(&self, ctx: &super::Context) -> (usize, BuildOptions) {
        let mut options = BuildOptions::from_settings(&ctx.settings);
        if let Some(jobs) = self.jobs.filter(|&j| j > 0) {
            options.jobs = jobs;
        }
        options.keep_copies |= self.keep_copies;

        let parallel = self
            .parallel
            .filter(|&p| p > 0)
            .unwrap_or_else(|| ctx.settings.parallel());
        (parallel, options)
    }
}

/// Execute the build command
pub async fn execute(ctx: &super::Context, args: BuildArgs) -> Result<()> {
    let (parallel, options) = args.resolve(ctx);
    let orchestrator = ctx.orchestrator(options)?;

    if parallel > 1 {
        output::info(format!("Building {parallel} isolated copies"));
    }
    let results = orchestrator.build(parallel).await?;

    output::build_summary(&results);
    if let Some(err) = results.iter().find_map(BuildResult::failure) {
        let failed = results.iter().filter(|r| !r.succeeded).count();
        return Err(anyhow::Error::from(err).context(format!(
            "{failed} of {} build(s) failed",
            results.len()
        )));
    }

    output::success("Build completed");
    Ok(())
}

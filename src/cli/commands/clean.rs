//! `ntxbuild clean` and `ntxbuild distclean`

use anyhow::Result;

use crate::cli::output;
use crate::core::orchestrator::BuildOptions;

/// Execute the clean command
pub async fn execute_clean(ctx: &super::Context) -> Result<()> {
    output::info("Cleaning build artifacts...");
    let orchestrator = ctx.orchestrator(BuildOptions::from_settings(&ctx.settings))?;
    let result = orchestrator.clean().await?;
    if let Some(err) = result.failure() {
        return Err(err.into());
    }
    output::success("Clean completed");
    Ok(())
}

/// Execute the distclean command
pub async fn execute_distclean(ctx: &super::Context) -> Result<()> {
    output::info("Resetting NuttX environment...");
    let orchestrator = ctx.orchestrator(BuildOptions::from_settings(&ctx.settings))?;
    let result = orchestrator.distclean().await?;
    if let Some(err) = result.failure() {
        return Err(err.into());
    }
    output::success("Environment reset. Run 'ntxbuild start' to configure again.");
    Ok(())
}

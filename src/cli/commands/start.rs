//! `ntxbuild start`: record the environment and run the NuttX configure script

use anyhow::Result;

use crate::cli::output;
use crate::core::environment::{find_workspace_root, Environment, EnvironmentManager};
use crate::core::orchestrator::{BuildOptions, BuildOrchestrator};

/// Execute the start command
///
/// The workspace root is the nearest directory at or above the current one
/// holding both trees. Source validation happens before the descriptor is
/// touched; a failed configure puts the previous descriptor back.
pub async fn execute(
    ctx: &super::Context,
    board: &str,
    defconfig: &str,
    nuttx_dir: &str,
    apps_dir: &str,
) -> Result<()> {
    let root = find_workspace_root(&ctx.cwd, nuttx_dir, apps_dir).unwrap_or_else(|| ctx.cwd.clone());

    output::line(format!("  Board: {board}"));
    output::line(format!("  Defconfig: {defconfig}"));
    output::line(format!("  Workspace: {}", root.display()));

    let manager = EnvironmentManager::new(&root);
    let env = manager.resolve(board, defconfig, nuttx_dir, apps_dir)?;
    env.validate_sources()?;

    let previous = manager.load().ok();
    manager.persist(&env)?;

    output::info("Setting up NuttX configuration...");
    let orchestrator = BuildOrchestrator::new(env, ctx.runner.clone())
        .with_options(BuildOptions::from_settings(&ctx.settings));
    let outcome = orchestrator.initialize(board, defconfig).await;

    let failure = match outcome {
        Ok(result) => result.failure().map(anyhow::Error::from),
        Err(e) => Some(e.into()),
    };
    if let Some(err) = failure {
        restore(&manager, previous.as_ref());
        return Err(err.context("NuttX setup failed"));
    }

    output::success("NuttX environment is ready");
    Ok(())
}

/// Put back the descriptor that was there before, or clear the new one
fn restore(manager: &EnvironmentManager, previous: Option<&Environment>) {
    let restored = match previous {
        Some(env) => manager.persist(env),
        None => manager.reset(),
    };
    if let Err(e) = restored {
        tracing::warn!("Failed to restore environment after setup failure: {e}");
    }
}

//! `ntxbuild info`

use anyhow::Result;

use crate::config::defaults::{NUTTX_APPS_DEFAULT_DIR_NAME, NUTTX_DEFAULT_DIR_NAME};
use crate::core::environment::{find_workspace_root, EnvironmentManager};
use crate::core::report::BuildReport;

/// Execute the info command
pub fn execute(ctx: &super::Context) -> Result<()> {
    println!(
        "ntxbuild {} ({})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    );

    let make = ctx.settings.make();
    let tool = make.split_whitespace().next().unwrap_or(make);
    match which::which(tool) {
        Ok(path) => println!("Build tool: {make} ({})", path.display()),
        Err(_) => println!("Build tool: {make} (not found on PATH)"),
    }

    let Ok(manager) = EnvironmentManager::discover(&ctx.cwd) else {
        match find_workspace_root(&ctx.cwd, NUTTX_DEFAULT_DIR_NAME, NUTTX_APPS_DEFAULT_DIR_NAME) {
            Some(root) => {
                println!("NuttX root found at: {}", root.display());
                println!("Environment not initialized. Run 'ntxbuild start'.");
            }
            None => println!("NuttX root not found in current directory tree"),
        }
        return Ok(());
    };

    let env = manager.load()?;
    println!("Workspace:  {}", env.workspace_path.display());
    println!("NuttX:      {}", env.nuttx_dir_name);
    println!("Apps:       {}", env.apps_dir_name);
    println!("Board:      {}", env.board);
    println!("Defconfig:  {}", env.defconfig);

    match BuildReport::load(&env.state_dir()) {
        Ok(Some(report)) => {
            let ok = report.results.iter().filter(|r| r.succeeded).count();
            println!(
                "Last build: {} ok / {} total (parallel={})",
                ok,
                report.results.len(),
                report.parallel
            );
        }
        Ok(None) => println!("Last build: none"),
        Err(e) => tracing::warn!("Unreadable build report: {e}"),
    }
    Ok(())
}

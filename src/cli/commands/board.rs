//! Board listing
//!
//! Implements `ntxbuild list`.

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::cli::output;
use crate::config::defaults::{NUTTX_APPS_DEFAULT_DIR_NAME, NUTTX_DEFAULT_DIR_NAME};
use crate::core::board::{BoardExplorer, BoardFilter};
use crate::core::environment::find_workspace_root;

/// NuttX tree to search: the environment's, else one found by directory names
fn nuttx_path(ctx: &super::Context) -> Result<PathBuf> {
    if let Ok(env) = ctx.environment() {
        return Ok(env.nuttx_path());
    }
    match find_workspace_root(&ctx.cwd, NUTTX_DEFAULT_DIR_NAME, NUTTX_APPS_DEFAULT_DIR_NAME) {
        Some(root) => Ok(root.join(NUTTX_DEFAULT_DIR_NAME)),
        None => bail!(
            "No NuttX workspace found from {}. Run 'ntxbuild start' first.",
            ctx.cwd.display()
        ),
    }
}

/// Execute the list command
pub fn execute_list(
    ctx: &super::Context,
    arch: Option<String>,
    soc: Option<String>,
    board: Option<String>,
) -> Result<()> {
    let filter = match (arch, soc, board) {
        (Some(arch), _, _) => BoardFilter::Arch(arch),
        (_, Some(soc), _) => BoardFilter::Soc(soc),
        (_, _, Some(board)) => BoardFilter::Board(board),
        _ => BoardFilter::All,
    };

    let spinner = output::create_spinner("Searching boards...");
    let boards = BoardExplorer::new(&nuttx_path(ctx)?).search(&filter);
    spinner.finish_and_clear();

    if boards.is_empty() {
        bail!("No boards found");
    }

    // Board names are the listing itself, so they ignore --quiet
    if let BoardFilter::Board(_) = filter {
        for board in &boards {
            println!("{} ({}/{})", board.name, board.arch, board.soc);
            for defconfig in &board.defconfigs {
                println!("  {}", defconfig.name);
            }
        }
        return Ok(());
    }

    for board in &boards {
        println!(
            "{:<32} {}/{} ({} defconfigs)",
            board.name,
            board.arch,
            board.soc,
            board.defconfigs.len()
        );
    }
    output::line(format!("\nTotal boards: {}", boards.len()));
    Ok(())
}

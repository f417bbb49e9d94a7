//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use commands::{Commands, Context};

/// ntxbuild - NuttX build system assistant
///
/// Configure, build and tweak NuttX workspaces, optionally running several
/// isolated builds side by side.
#[derive(Parser, Debug)]
#[command(name = "ntxbuild")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Execute the CLI command; `cancel` fires on interrupt
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        if let Some(cmd) = self.command {
            let ctx = Context::load(cancel)?;
            cmd.run(&ctx).await
        } else {
            // No subcommand provided, show help
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            Ok(())
        }
    }
}

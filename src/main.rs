//! ntxbuild CLI - NuttX build system assistant
//!
//! Entry point for the ntxbuild command-line application.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use ntxbuild::cli::output::{display_error, exit_code, is_cancelled, OutputConfig};
use ntxbuild::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let output_config = OutputConfig::new(cli.quiet, cli.verbose);
    output_config.apply_global();

    // RUST_LOG wins over -v/-q; logs stay on stderr, away from build output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(output_config.log_level().as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping builds");
            on_interrupt.cancel();
        }
    });

    if let Err(e) = cli.run(cancel).await {
        if is_cancelled(&e) {
            eprintln!("Interrupted");
        } else {
            display_error(&e);
        }
        std::process::exit(exit_code(&e));
    }
}

//! Output formatting and progress indicators
//!
//! Status lines go to stdout; logs and errors go to stderr. `--quiet` drops
//! everything except errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::defaults::CANCELLED_CODE;
use crate::error::{BuildError, NtxError};
use crate::infra::process::BuildResult;

static QUIET: AtomicBool = AtomicBool::new(false);

/// Process-wide output preferences
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    pub quiet: bool,
    pub verbose: u8,
}

impl OutputConfig {
    pub fn new(quiet: bool, verbose: u8) -> Self {
        Self { quiet, verbose }
    }

    /// Make these preferences visible to the print helpers
    pub fn apply_global(self) {
        QUIET.store(self.quiet, Ordering::Relaxed);
    }

    /// Default tracing directive for these flags
    pub fn log_level(self) -> tracing::Level {
        match (self.quiet, self.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, _) => tracing::Level::DEBUG,
        }
    }
}

fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Status message prefixes
pub mod status {
    pub const SUCCESS: &str = "✓";
    pub const ERROR: &str = "✗";
    pub const WARNING: &str = "⚠";
    pub const INFO: &str = "ℹ";
}

/// Plain line, suppressed by `--quiet`
pub fn line(message: impl AsRef<str>) {
    if !is_quiet() {
        println!("{}", message.as_ref());
    }
}

pub fn success(message: impl AsRef<str>) {
    line(format!("{} {}", status::SUCCESS, message.as_ref()));
}

pub fn info(message: impl AsRef<str>) {
    line(format!("{} {}", status::INFO, message.as_ref()));
}

pub fn warning(message: impl AsRef<str>) {
    line(format!("{} {}", status::WARNING, message.as_ref()));
}

/// Create a spinner for operations with unknown duration
///
/// Hidden under `--quiet`.
pub fn create_spinner(message: &str) -> ProgressBar {
    if is_quiet() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.blue} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// One summary line per build slot
pub fn build_summary(results: &[BuildResult]) {
    for (slot, result) in results.iter().enumerate() {
        let elapsed = result.duration.as_secs_f64();
        if result.succeeded {
            success(format!(
                "[{slot}] {} ({elapsed:.1}s)",
                result.location.display()
            ));
        } else {
            line(format!(
                "{} [{slot}] {} failed with exit code {} ({elapsed:.1}s)",
                status::ERROR,
                result.location.display(),
                result.exit_code
            ));
        }
    }
}

/// Print an error and its causes to stderr
pub fn display_error(err: &anyhow::Error) {
    eprintln!("{} {err}", status::ERROR);
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

/// Process exit status for an error reaching `main`
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<NtxError>() {
            return e.exit_code();
        }
        if let Some(e) = cause.downcast_ref::<BuildError>() {
            return e.exit_code();
        }
    }
    1
}

/// Whether an error is a user interrupt
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    exit_code(err) == CANCELLED_CODE
}

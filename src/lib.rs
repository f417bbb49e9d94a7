//! ntxbuild - NuttX build system assistant
//!
//! This library tracks a NuttX workspace (kernel tree plus applications tree),
//! edits its Kconfig configuration and drives its make-based build, either in
//! place or across several isolated workspace copies at once.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Environment, Kconfig, build orchestration, boards
//! - [`infra`] - Infrastructure layer (processes, workspace copies, filesystem)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;

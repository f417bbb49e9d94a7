//! Core business logic module
//!
//! Domain logic for NuttX workspaces. External processes and filesystem
//! plumbing live in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`environment`] - Environment descriptor and workspace discovery
//! - [`kconfig`] - `.config` editing and normalization
//! - [`orchestrator`] - Single and parallel builds, clean, distclean
//! - [`board`] - Board and defconfig discovery
//! - [`settings`] - User settings (`config.toml`)
//! - [`report`] - Last build summary

pub mod board;
pub mod environment;
pub mod kconfig;
pub mod orchestrator;
pub mod report;
pub mod settings;

//! Backup-then-redeploy automation for Docker Compose projects.
//!
//! The deploy sequence lives in [`core::sequencer`]; container and source
//! control access sit behind the [`core::ContainerRuntime`] and
//! [`core::SourceControl`] traits.

pub mod cli;
pub mod core;
pub mod utils;

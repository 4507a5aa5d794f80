//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, the
//! service supervisor, the runner agent CLI, the control-plane HTTP client,
//! and instance directory access.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod agent;
pub mod command_runner;
pub mod config;
pub mod control_plane;
pub mod fs;
pub mod process;
pub mod systemd;

//! Script execution for the Proxmox stats launcher.
//!
//! Provides:
//! - `Launcher` - Branch selection, environment preparation, single run
//! - `ProcessRunner` - Child process execution with exit status mapping
//! - Command building utilities

pub mod command;
pub mod launcher;
pub mod process;

pub use command::{CommandBuilder, CommandParts};
pub use launcher::{LaunchError, Launcher};
pub use process::ProcessRunner;

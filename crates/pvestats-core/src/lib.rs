//! Core building blocks of the Proxmox stats launcher.
//!
//! This crate provides:
//! - `Platform` / `OsType` - Branch selection from `OSTYPE`
//! - `.env` loading in export and source grammars
//! - `LaunchContext` / `EnvOverlay` - Working directory and child environment
//! - `LaunchPlan` and the `ScriptRunner` trait

pub mod config;
pub mod context;
pub mod env_file;
pub mod plan;
pub mod platform;
pub mod traits;

pub use config::LauncherConfig;
pub use context::{EnvOverlay, LaunchContext};
pub use env_file::{EnvFileError, EnvFileMode, EnvVars, load_env_file};
pub use plan::LaunchPlan;
pub use platform::{OsType, OsTypeSource, Platform};
pub use traits::{ExitOutcome, RunError, ScriptRunner};

//! Launcher configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Platform, env_file::DEFAULT_ENV_FILE};

/// Working directory of the Linux branch.
pub const DEFAULT_LINUX_WORKDIR: &str = "/root/proxmox-stats";

/// Script run by both branches.
pub const DEFAULT_SCRIPT: &str = "proxmox-stats-to-mqtt.py";

/// Virtual environment directory, relative to the working directory.
pub const DEFAULT_VENV_DIR: &str = "venv";

/// Launcher configuration.
///
/// Relative paths are resolved against the branch's working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Overrides the working directory of both branches.
    pub workdir: Option<PathBuf>,
    /// Working directory of the Linux branch.
    pub linux_workdir: PathBuf,
    pub env_file: PathBuf,
    pub venv_dir: PathBuf,
    pub script: PathBuf,
    /// Overrides the interpreter of both branches. May carry arguments (`python3 -u`).
    pub interpreter: Option<String>,
    pub linux_interpreter: String,
    pub msys_interpreter: String,
    /// Arguments forwarded to the script.
    pub script_args: Vec<String>,
    /// Turn a missing `.env` or virtual environment into an error.
    pub strict: bool,
    /// Consult login shells for a fuller `PATH` when the interpreter is not found.
    pub login_shell_path: bool,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            workdir: None,
            linux_workdir: PathBuf::from(DEFAULT_LINUX_WORKDIR),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            venv_dir: PathBuf::from(DEFAULT_VENV_DIR),
            script: PathBuf::from(DEFAULT_SCRIPT),
            interpreter: None,
            linux_interpreter: "python3".to_string(),
            msys_interpreter: "python".to_string(),
            script_args: Vec::new(),
            strict: false,
            login_shell_path: true,
        }
    }
}

impl LauncherConfig {
    /// Interpreter command line for a branch.
    #[must_use]
    pub fn interpreter_for(&self, platform: Platform) -> &str {
        if let Some(ref interpreter) = self.interpreter {
            return interpreter;
        }
        match platform {
            Platform::Linux => &self.linux_interpreter,
            Platform::Msys => &self.msys_interpreter,
        }
    }

    /// Working directory for a branch. `None` means the current directory.
    #[must_use]
    pub fn workdir_for(&self, platform: Platform) -> Option<&PathBuf> {
        self.workdir.as_ref().or(match platform {
            Platform::Linux => Some(&self.linux_workdir),
            Platform::Msys => None,
        })
    }
}

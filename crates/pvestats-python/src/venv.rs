//! Python virtual environment activation.
//!
//! Activation reproduces what `source venv/bin/activate` does to the
//! environment, applied to the child's [`EnvOverlay`] instead of a shell.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use pvestats_core::EnvOverlay;

use crate::shell::merge_paths;

#[cfg(windows)]
const BIN_DIR: &str = "Scripts";
#[cfg(not(windows))]
const BIN_DIR: &str = "bin";

/// A virtual environment rooted at a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    root: PathBuf,
}

impl VirtualEnv {
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the environment's executables.
    #[must_use]
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join(BIN_DIR)
    }

    #[must_use]
    pub fn activate_script(&self) -> PathBuf {
        self.bin_dir().join("activate")
    }

    /// Whether the activation script is present.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.activate_script().is_file()
    }

    /// Prompt from `pyvenv.cfg`, else the directory name.
    #[must_use]
    pub fn prompt(&self) -> String {
        std::fs::read_to_string(self.root.join("pyvenv.cfg"))
            .ok()
            .and_then(|cfg| parse_prompt(&cfg))
            .or_else(|| {
                self.root
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_default()
    }

    /// Apply activation to `env`.
    ///
    /// `base_path` is the `PATH` the child would otherwise inherit.
    pub fn activate(&self, env: &mut EnvOverlay, base_path: Option<&OsStr>) {
        let bin_dir = self.bin_dir();
        let path = merge_paths(bin_dir.as_os_str(), base_path.unwrap_or_default());

        env.set("VIRTUAL_ENV", self.root.to_string_lossy());
        env.set("VIRTUAL_ENV_PROMPT", self.prompt());
        env.set("PATH", path.to_string_lossy());
        env.unset("PYTHONHOME");

        tracing::debug!(venv = %self.root.display(), "Activated virtual environment");
    }

    /// Interpreter `name` inside the environment, if present.
    #[must_use]
    pub fn interpreter(&self, name: &str) -> Option<PathBuf> {
        let candidate = self.bin_dir().join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = candidate.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    }
}

fn parse_prompt(cfg: &str) -> Option<String> {
    cfg.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        if key.trim() != "prompt" {
            return None;
        }
        let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

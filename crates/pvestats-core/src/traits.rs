//! Runner seam between plan preparation and process execution.

use std::{io, path::PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::LaunchPlan;

/// Exit code shells use for a command that cannot be found.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit code shells use for a command that cannot be executed.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// How the script finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitOutcome {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal (Unix only).
    pub signal: Option<i32>,
}

impl ExitOutcome {
    /// Normal exit with `code`.
    #[must_use]
    pub const fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Termination by `signal`.
    #[must_use]
    pub const fn signaled(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Code a shell would report: the exit code, `128 + signal`, or 1.
    #[must_use]
    pub const fn shell_code(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => 1,
        }
    }
}

/// Runner error.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RunError {
    /// Code a shell would report for this failure.
    #[must_use]
    pub fn shell_code(&self) -> i32 {
        match self {
            Self::SpawnFailed { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => EXIT_NOT_FOUND,
                io::ErrorKind::PermissionDenied => EXIT_NOT_EXECUTABLE,
                _ => 1,
            },
            Self::Io(_) => 1,
        }
    }
}

/// Trait for script runners.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Run the plan to completion.
    async fn run(&self, plan: &LaunchPlan) -> Result<ExitOutcome, RunError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_code() {
        assert_eq!(ExitOutcome::exited(0).shell_code(), 0);
        assert_eq!(ExitOutcome::exited(3).shell_code(), 3);
        assert_eq!(ExitOutcome::signaled(15).shell_code(), 143);
        assert!(!ExitOutcome::signaled(2).success());
    }

    #[test]
    fn test_spawn_failure_codes() {
        let not_found = RunError::SpawnFailed {
            program: PathBuf::from("python3"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        let denied = RunError::SpawnFailed {
            program: PathBuf::from("python3"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(not_found.shell_code(), 127);
        assert_eq!(denied.shell_code(), 126);
    }
}

//! Platform branch selection from the shell's `OSTYPE` identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix matched by the Linux branch (`linux-gnu*` as a shell glob).
pub const LINUX_OSTYPE_PREFIX: &str = "linux-gnu";

/// Identifier reported by Git-Bash / MSYS2 on Windows.
pub const MSYS_OSTYPE: &str = "msys";

/// Execution branch of the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// GNU/Linux host: fixed working directory, virtual environment, exported `.env`.
    Linux,
    /// Git-Bash on Windows: current directory, sourced `.env`, no virtual environment.
    Msys,
}

impl Platform {
    /// Select a branch from an `OSTYPE` value.
    ///
    /// Returns `None` for identifiers neither branch accepts.
    #[must_use]
    pub fn from_ostype(ostype: &str) -> Option<Self> {
        if ostype.starts_with(LINUX_OSTYPE_PREFIX) {
            Some(Self::Linux)
        } else if ostype == MSYS_OSTYPE {
            Some(Self::Msys)
        } else {
            None
        }
    }

    /// Whether this branch activates a Python virtual environment.
    #[must_use]
    pub const fn uses_venv(self) -> bool {
        matches!(self, Self::Linux)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => f.write_str("linux"),
            Self::Msys => f.write_str("msys"),
        }
    }
}

/// Where an `OSTYPE` value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsTypeSource {
    /// Supplied by the caller (usually the `OSTYPE` environment variable).
    Explicit,
    /// Derived from the compile target because nothing was supplied.
    CompileTarget,
}

/// A resolved `OSTYPE` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsType {
    pub value: String,
    pub source: OsTypeSource,
}

impl OsType {
    /// Resolve the identifier, falling back to the compile target.
    ///
    /// `OSTYPE` is a bash variable and is usually not exported to child
    /// processes, so an absent or blank value is common.
    #[must_use]
    pub fn detect(explicit: Option<&str>) -> Self {
        match explicit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(value) => Self {
                value: value.to_string(),
                source: OsTypeSource::Explicit,
            },
            None => Self {
                value: compile_target_ostype().to_string(),
                source: OsTypeSource::CompileTarget,
            },
        }
    }

    /// Branch selected by this identifier.
    #[must_use]
    pub fn platform(&self) -> Option<Platform> {
        Platform::from_ostype(&self.value)
    }
}

fn compile_target_ostype() -> &'static str {
    if cfg!(windows) {
        MSYS_OSTYPE
    } else if cfg!(target_os = "linux") {
        LINUX_OSTYPE_PREFIX
    } else {
        std::env::consts::OS
    }
}

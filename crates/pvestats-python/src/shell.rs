//! Executable lookup against a prepared `PATH`.

use std::{
    collections::HashSet,
    env::{join_paths, split_paths},
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

/// Finds interpreters the way a shell would, against the child's `PATH`.
#[derive(Debug, Clone)]
pub struct ExecutableResolver {
    search_path: Option<OsString>,
    cwd: PathBuf,
    login_shell_path: bool,
}

impl ExecutableResolver {
    /// Resolver searching `search_path`, or the process `PATH` when `None`.
    #[must_use]
    pub fn new(search_path: Option<OsString>, cwd: PathBuf) -> Self {
        Self {
            search_path,
            cwd,
            login_shell_path: true,
        }
    }

    /// Whether to retry with a `PATH` read from login shells.
    #[must_use]
    pub const fn login_shell_path(mut self, enabled: bool) -> Self {
        self.login_shell_path = enabled;
        self
    }

    /// Resolve an executable by name.
    ///
    /// The search order is:
    /// 1. Explicit paths (absolute, or relative to the working directory).
    /// 2. The prepared PATH via `which`.
    /// 3. The prepared PATH merged with what login shells report.
    pub async fn resolve(&self, executable: &str) -> Option<PathBuf> {
        if executable.trim().is_empty() {
            return None;
        }

        let path = Path::new(executable);
        if path.components().count() > 1 || path.is_absolute() {
            let candidate = self.cwd.join(path);
            return candidate.is_file().then_some(candidate);
        }

        let search_path = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"))
            .unwrap_or_default();

        if let Some(found) = which_async(executable, search_path.clone(), &self.cwd).await {
            return Some(found);
        }

        if self.login_shell_path {
            if let Some(refreshed) = get_fresh_path().await {
                let merged = merge_paths(&search_path, &refreshed);
                if merged != search_path {
                    tracing::debug!(?search_path, ?merged, "Retrying lookup with login shell PATH");
                    return which_async(executable, merged, &self.cwd).await;
                }
            }
        }

        None
    }
}

/// Merge two PATH strings into a single, de-duplicated PATH.
#[must_use]
pub fn merge_paths(primary: impl AsRef<OsStr>, secondary: impl AsRef<OsStr>) -> OsString {
    let mut seen = HashSet::<PathBuf>::new();
    let mut merged = Vec::<PathBuf>::new();

    for p in split_paths(primary.as_ref()).chain(split_paths(secondary.as_ref())) {
        if !p.as_os_str().is_empty() && seen.insert(p.clone()) {
            merged.push(p);
        }
    }

    join_paths(merged).unwrap_or_default()
}

async fn which_async(executable: &str, search_path: OsString, cwd: &Path) -> Option<PathBuf> {
    let executable = executable.to_string();
    let cwd = cwd.to_path_buf();
    tokio::task::spawn_blocking(move || which::which_in(executable, Some(search_path), cwd))
        .await
        .ok()
        .and_then(Result::ok)
}

/// Unix shell types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnixShell {
    Zsh(PathBuf),
    Bash(PathBuf),
    Sh(PathBuf),
    Other(PathBuf),
}

impl UnixShell {
    /// Get the shell path.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Zsh(p) | Self::Bash(p) | Self::Sh(p) | Self::Other(p) => p,
        }
    }

    /// Whether this shell supports login mode.
    #[must_use]
    pub const fn login(&self) -> bool {
        matches!(self, Self::Zsh(_) | Self::Bash(_))
    }

    /// Get the rc file for this shell.
    #[must_use]
    pub fn config_file(&self) -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        let config_file = match self {
            Self::Zsh(_) => Some(home.join(".zshrc")),
            Self::Bash(_) => Some(home.join(".bashrc")),
            Self::Sh(_) | Self::Other(_) => None,
        };
        config_file.filter(|p| p.is_file())
    }

    /// `source <rc file>`, quoted for the shell.
    #[must_use]
    pub fn source_command(&self) -> Option<String> {
        let source_file = self.config_file()?;
        let binding = source_file.to_string_lossy();
        let escaped = shlex::try_quote(binding.as_ref()).ok()?;
        Some(format!("source {escaped}"))
    }

    /// Get the current shell from `$SHELL`.
    #[must_use]
    pub fn current_shell() -> Self {
        std::env::var("SHELL")
            .ok()
            .and_then(|shell| Self::from_path(Path::new(&shell)))
            .unwrap_or_else(|| Self::Sh(PathBuf::from("/bin/sh")))
    }

    /// Create from a path.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        if !(path.is_absolute() && path.is_file()) {
            return None;
        }
        let path_buf = path.to_path_buf();
        Some(match path.file_name().and_then(OsStr::to_str) {
            Some("zsh") => Self::Zsh(path_buf),
            Some("bash") => Self::Bash(path_buf),
            Some("sh") => Self::Sh(path_buf),
            _ => Self::Other(path_buf),
        })
    }
}

#[cfg(not(windows))]
async fn get_fresh_path() -> Option<OsString> {
    use std::{process::Stdio, time::Duration};

    use tokio::process::Command;

    const PATH_REFRESH_TIMEOUT: Duration = Duration::from_secs(5);

    async fn run(shell: &UnixShell) -> Option<String> {
        let mut cmd = Command::new(shell.path());
        if shell.login() {
            cmd.arg("-l");
        }
        let print_path = "printf '%s' \"$PATH\"";
        match shell.source_command() {
            Some(source_command) => cmd.arg("-c").arg(format!("{source_command}; {print_path}")),
            None => cmd.arg("-c").arg(print_path),
        };
        cmd.env("TERM", "dumb")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = cmd.spawn().ok()?;
        let output = match tokio::time::timeout(PATH_REFRESH_TIMEOUT, child.wait_with_output()).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                tracing::debug!(
                    shell = %shell.path().display(),
                    ?err,
                    "Failed to retrieve PATH from login shell"
                );
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    shell = %shell.path().display(),
                    "Timed out retrieving PATH from login shell"
                );
                return None;
            }
        };

        if !output.status.success() {
            return None;
        }
        let path = String::from_utf8(output.stdout).ok()?.trim().to_string();
        (!path.is_empty()).then_some(path)
    }

    let current_shell = UnixShell::current_shell();
    let mut paths = Vec::new();
    if let Some(path) = run(&current_shell).await {
        paths.push(path);
    }

    for shell in ["/bin/bash", "/bin/sh"]
        .into_iter()
        .filter_map(|p| UnixShell::from_path(Path::new(p)))
    {
        if shell != current_shell {
            if let Some(path) = run(&shell).await {
                paths.push(path);
            }
        }
    }

    paths
        .into_iter()
        .map(OsString::from)
        .reduce(|a, b| merge_paths(&a, &b))
}

// Git-Bash hands its PATH to child processes already; nothing fresher to read.
#[cfg(windows)]
async fn get_fresh_path() -> Option<OsString> {
    None
}

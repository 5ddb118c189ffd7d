//! Launcher: turns configuration and an `OSTYPE` into exactly one script run.

use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};

use pvestats_core::{
    EnvFileError, EnvFileMode, EnvOverlay, ExitOutcome, LaunchContext, LaunchPlan, LauncherConfig,
    OsType, Platform, RunError, ScriptRunner, load_env_file,
    traits::EXIT_NOT_FOUND,
};
use pvestats_python::{ExecutableResolver, VirtualEnv};

use crate::command::{CommandBuildError, CommandBuilder};

/// Launcher error.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Unsupported OSTYPE: {0:?}")]
    UnsupportedOsType(String),
    #[error("Working directory not found: {0}")]
    WorkingDirMissing(PathBuf),
    #[error("Cannot determine current directory: {0}")]
    CurrentDir(#[source] io::Error),
    #[error("Virtual environment not found: {0}")]
    VenvMissing(PathBuf),
    #[error(transparent)]
    EnvFile(#[from] EnvFileError),
    #[error("Command build error: {0}")]
    CommandBuild(#[from] CommandBuildError),
    #[error("Interpreter not found: {0}")]
    InterpreterNotFound(String),
    #[error(transparent)]
    Run(#[from] RunError),
}

impl LaunchError {
    /// Exit code the launcher reports for this failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Run(err) => err.shell_code(),
            Self::InterpreterNotFound(_) => EXIT_NOT_FOUND,
            _ => 1,
        }
    }
}

/// Prepares the environment for the script and runs it through a [`ScriptRunner`].
pub struct Launcher<R>
where
    R: ScriptRunner,
{
    config: LauncherConfig,
    runner: R,
    base_path: Option<OsString>,
    current_dir: Option<PathBuf>,
}

impl<R> Launcher<R>
where
    R: ScriptRunner,
{
    /// Create a launcher inheriting the process `PATH` and current directory.
    #[must_use]
    pub fn new(config: LauncherConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            base_path: std::env::var_os("PATH"),
            current_dir: None,
        }
    }

    /// Override the `PATH` the child would inherit.
    #[must_use]
    pub fn with_base_path(mut self, base_path: Option<OsString>) -> Self {
        self.base_path = base_path;
        self
    }

    /// Override the directory the Msys branch runs in.
    #[must_use]
    pub fn with_current_dir(mut self, current_dir: PathBuf) -> Self {
        self.current_dir = Some(current_dir);
        self
    }

    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Prepare the launch without running anything.
    ///
    /// # Errors
    /// Returns error if the branch is unsupported, the working directory is
    /// missing, or (in strict mode) the env file, virtual environment or
    /// interpreter is unavailable.
    pub async fn prepare(&self, ostype: &OsType) -> Result<LaunchPlan, LaunchError> {
        let platform = ostype
            .platform()
            .ok_or_else(|| LaunchError::UnsupportedOsType(ostype.value.clone()))?;
        let working_dir = self.working_dir(platform)?;
        tracing::debug!(%platform, ostype = %ostype.value, working_dir = %working_dir.display(), "Selected branch");

        let mut env = EnvOverlay::new();

        let venv = if platform.uses_venv() {
            self.activate_venv(&working_dir, &mut env)?
        } else {
            None
        };

        let env_file = working_dir.join(&self.config.env_file);
        let env_mode = match platform {
            Platform::Linux => EnvFileMode::Export,
            Platform::Msys => EnvFileMode::Source,
        };
        let env_loaded = match load_env_file(&env_file, env_mode) {
            Ok(vars) => {
                let count = vars.len();
                env.extend(vars);
                count
            }
            Err(err) if !self.config.strict => {
                tracing::warn!(error = %err, "Continuing without env file");
                0
            }
            Err(err) => return Err(err.into()),
        };

        let parts = CommandBuilder::new(self.config.interpreter_for(platform))
            .params([self.config.script.to_string_lossy().into_owned()])
            .extend_params(self.config.script_args.iter().cloned())
            .build()?;

        let venv_interpreter = venv
            .as_ref()
            .and_then(|venv| venv.interpreter(&parts.program));
        let program = match venv_interpreter {
            Some(program) => program,
            None => {
                let search_path = env
                    .get("PATH")
                    .map(OsString::from)
                    .or_else(|| self.base_path.clone());
                let resolver = ExecutableResolver::new(search_path, working_dir.clone())
                    .login_shell_path(self.config.login_shell_path);
                match parts.resolve(&resolver).await {
                    Some(program) => program,
                    None if self.config.strict => {
                        return Err(LaunchError::InterpreterNotFound(parts.program));
                    }
                    None => {
                        tracing::warn!(interpreter = %parts.program, "Interpreter not found on PATH");
                        PathBuf::from(&parts.program)
                    }
                }
            }
        };

        Ok(LaunchPlan {
            ostype: ostype.clone(),
            platform,
            context: LaunchContext::with_env(working_dir, env),
            env_file,
            env_mode,
            env_loaded,
            venv: venv.map(|venv| venv.root().to_path_buf()),
            program,
            args: parts.args,
        })
    }

    /// Prepare the launch and run the script once.
    ///
    /// # Errors
    /// Returns error if preparation fails or the script cannot be started.
    pub async fn launch(&self, ostype: &OsType) -> Result<ExitOutcome, LaunchError> {
        let plan = self.prepare(ostype).await?;
        tracing::info!(
            platform = %plan.platform,
            env_vars = plan.env_loaded,
            command = %plan.command_line(),
            "Launching script"
        );

        let outcome = self.runner.run(&plan).await?;
        if outcome.success() {
            tracing::info!("Script finished");
        } else {
            tracing::warn!(code = ?outcome.code, signal = ?outcome.signal, "Script failed");
        }
        Ok(outcome)
    }

    fn working_dir(&self, platform: Platform) -> Result<PathBuf, LaunchError> {
        let current_dir = match self.current_dir {
            Some(ref dir) => dir.clone(),
            None => std::env::current_dir().map_err(LaunchError::CurrentDir)?,
        };
        let working_dir = match self.config.workdir_for(platform) {
            Some(dir) => current_dir.join(dir),
            None => current_dir,
        };
        if working_dir.is_dir() {
            Ok(working_dir)
        } else {
            Err(LaunchError::WorkingDirMissing(working_dir))
        }
    }

    fn activate_venv(
        &self,
        working_dir: &Path,
        env: &mut EnvOverlay,
    ) -> Result<Option<VirtualEnv>, LaunchError> {
        let venv = VirtualEnv::new(working_dir.join(&self.config.venv_dir));
        if venv.exists() {
            venv.activate(env, self.base_path.as_deref());
            return Ok(Some(venv));
        }
        if self.config.strict {
            return Err(LaunchError::VenvMissing(venv.root().to_path_buf()));
        }
        tracing::warn!(
            script = %venv.activate_script().display(),
            "Virtual environment not found, using system interpreter"
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    /// Records every plan it is asked to run.
    struct RecordingRunner {
        outcome: ExitOutcome,
        plans: Mutex<Vec<LaunchPlan>>,
    }

    impl RecordingRunner {
        fn new(outcome: ExitOutcome) -> Self {
            Self {
                outcome,
                plans: Mutex::new(Vec::new()),
            }
        }

        fn plans(&self) -> Vec<LaunchPlan> {
            self.plans.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ScriptRunner for RecordingRunner {
        async fn run(&self, plan: &LaunchPlan) -> Result<ExitOutcome, RunError> {
            self.plans.lock().unwrap().push(plan.clone());
            Ok(self.outcome)
        }
    }

    const ENV_FILE: &str = "\
# credentials
API_TOKEN_ID=stats
#MQTT_BROKER=stale.lan
MQTT_BROKER=broker.lan
MQTT_PORT=1883
";

    fn project_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("venv").join(if cfg!(windows) { "Scripts" } else { "bin" });
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("activate"), "# activate\n").unwrap();
        std::fs::write(bin.join("python3"), "").unwrap();
        std::fs::write(bin.join("python"), "").unwrap();
        std::fs::write(dir.path().join(".env"), ENV_FILE).unwrap();
        dir
    }

    fn config() -> LauncherConfig {
        LauncherConfig {
            login_shell_path: false,
            ..LauncherConfig::default()
        }
    }

    fn linux() -> OsType {
        OsType::detect(Some("linux-gnu"))
    }

    fn msys() -> OsType {
        OsType::detect(Some("msys"))
    }

    #[tokio::test]
    async fn test_linux_branch_activates_venv_and_exports_env() {
        let dir = project_dir();
        let config = LauncherConfig {
            linux_workdir: dir.path().to_path_buf(),
            ..config()
        };
        let launcher = Launcher::new(config, RecordingRunner::new(ExitOutcome::exited(0)))
            .with_base_path(Some(OsString::from("/usr/bin")));

        assert_ok!(launcher.launch(&linux()).await);

        let plans = launcher.runner().plans();
        assert_eq!(plans.len(), 1);
        let plan = &plans[0];
        let venv = dir.path().join("venv");
        assert_eq!(plan.platform, Platform::Linux);
        assert_eq!(plan.context.working_dir, dir.path());
        assert_eq!(plan.venv.as_deref(), Some(venv.as_path()));
        assert_eq!(plan.env_mode, EnvFileMode::Export);
        assert_eq!(plan.env_loaded, 3);
        assert_eq!(plan.context.env.get("MQTT_BROKER"), Some("broker.lan"));
        assert_eq!(plan.context.env.get("VIRTUAL_ENV"), Some(venv.to_string_lossy().as_ref()));
        assert!(plan.context.env.set.keys().all(|k| !k.starts_with('#')));
        assert!(plan.program.starts_with(&venv));
        assert_eq!(plan.args, vec!["proxmox-stats-to-mqtt.py"]);
    }

    #[tokio::test]
    async fn test_msys_branch_sources_env_without_venv() {
        let dir = project_dir();
        let launcher = Launcher::new(config(), RecordingRunner::new(ExitOutcome::exited(0)))
            .with_current_dir(dir.path().to_path_buf());

        let plan = assert_ok!(launcher.prepare(&msys()).await);
        assert_eq!(plan.platform, Platform::Msys);
        assert_eq!(plan.context.working_dir, dir.path());
        assert_eq!(plan.venv, None);
        assert_eq!(plan.env_mode, EnvFileMode::Source);
        assert_eq!(plan.context.env.get("VIRTUAL_ENV"), None);
        assert_eq!(plan.context.env.get("API_TOKEN_ID"), Some("stats"));
        assert_eq!(plan.context.env.get("MQTT_BROKER"), Some("broker.lan"));
        assert!(!plan.program.starts_with(dir.path().join("venv")));
        assert!(launcher.runner().plans().is_empty());
    }

    #[tokio::test]
    async fn test_msys_branch_runs_once() {
        let dir = project_dir();
        let launcher = Launcher::new(config(), RecordingRunner::new(ExitOutcome::exited(0)))
            .with_current_dir(dir.path().to_path_buf());

        assert_ok!(launcher.launch(&msys()).await);
        assert_eq!(launcher.runner().plans().len(), 1);
    }

    #[tokio::test]
    async fn test_exit_code_is_returned() {
        let dir = project_dir();
        let launcher = Launcher::new(config(), RecordingRunner::new(ExitOutcome::exited(7)))
            .with_current_dir(dir.path().to_path_buf());

        let outcome = assert_ok!(launcher.launch(&msys()).await);
        assert_eq!(outcome.shell_code(), 7);
    }

    #[tokio::test]
    async fn test_unsupported_ostype_runs_nothing() {
        let dir = project_dir();
        let launcher = Launcher::new(config(), RecordingRunner::new(ExitOutcome::exited(0)))
            .with_current_dir(dir.path().to_path_buf());

        let err = assert_err!(launcher.launch(&OsType::detect(Some("darwin23"))).await);
        assert!(matches!(err, LaunchError::UnsupportedOsType(ref s) if s == "darwin23"));
        assert!(launcher.runner().plans().is_empty());
    }

    #[tokio::test]
    async fn test_missing_linux_workdir() {
        let dir = tempfile::tempdir().unwrap();
        let config = LauncherConfig {
            linux_workdir: dir.path().join("proxmox-stats"),
            ..config()
        };
        let launcher = Launcher::new(config, RecordingRunner::new(ExitOutcome::exited(0)));

        let err = assert_err!(launcher.prepare(&linux()).await);
        assert!(matches!(err, LaunchError::WorkingDirMissing(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_missing_env_and_venv_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let config = LauncherConfig {
            linux_workdir: dir.path().to_path_buf(),
            ..config()
        };
        let launcher = Launcher::new(config, RecordingRunner::new(ExitOutcome::exited(0)));

        let plan = assert_ok!(launcher.prepare(&linux()).await);
        assert_eq!(plan.venv, None);
        assert_eq!(plan.env_loaded, 0);
        assert!(plan.context.env.is_empty());
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_missing_env_file() {
        let dir = project_dir();
        std::fs::remove_file(dir.path().join(".env")).unwrap();
        let config = LauncherConfig {
            linux_workdir: dir.path().to_path_buf(),
            strict: true,
            ..config()
        };
        let launcher = Launcher::new(config, RecordingRunner::new(ExitOutcome::exited(0)));

        let err = assert_err!(launcher.launch(&linux()).await);
        assert!(matches!(err, LaunchError::EnvFile(EnvFileError::NotFound(_))));
        assert!(launcher.runner().plans().is_empty());
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_missing_venv() {
        let dir = project_dir();
        std::fs::remove_dir_all(dir.path().join("venv")).unwrap();
        let config = LauncherConfig {
            linux_workdir: dir.path().to_path_buf(),
            strict: true,
            ..config()
        };
        let launcher = Launcher::new(config, RecordingRunner::new(ExitOutcome::exited(0)));

        let err = assert_err!(launcher.prepare(&linux()).await);
        assert!(matches!(err, LaunchError::VenvMissing(_)));
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_missing_interpreter() {
        let dir = project_dir();
        let config = LauncherConfig {
            msys_interpreter: "definitely-not-a-python-xyz".to_string(),
            strict: true,
            ..config()
        };
        let launcher = Launcher::new(config, RecordingRunner::new(ExitOutcome::exited(0)))
            .with_current_dir(dir.path().to_path_buf())
            .with_base_path(Some(OsString::new()));

        let err = assert_err!(launcher.prepare(&msys()).await);
        assert!(matches!(err, LaunchError::InterpreterNotFound(_)));
        assert_eq!(err.exit_code(), 127);
    }

    #[tokio::test]
    async fn test_script_args_and_interpreter_flags() {
        let dir = project_dir();
        let config = LauncherConfig {
            linux_workdir: dir.path().to_path_buf(),
            interpreter: Some("python3 -u".to_string()),
            script_args: vec!["--publish-discovery".to_string()],
            ..config()
        };
        let launcher = Launcher::new(config, RecordingRunner::new(ExitOutcome::exited(0)));

        let plan = assert_ok!(launcher.prepare(&linux()).await);
        assert_eq!(plan.program, dir.path().join("venv").join(if cfg!(windows) { "Scripts" } else { "bin" }).join("python3"));
        assert_eq!(plan.args, vec!["-u", "proxmox-stats-to-mqtt.py", "--publish-discovery"]);
    }
}

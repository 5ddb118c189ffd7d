//! Child process runner.

use std::process::ExitStatus;

use async_trait::async_trait;
use pvestats_core::{ExitOutcome, LaunchPlan, RunError, ScriptRunner};
use tokio::process::Command;

/// Runs the plan as a child process with inherited stdio.
///
/// Ctrl-C reaches the child through the terminal's process group; the
/// runner keeps waiting so the child's own status is what gets reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScriptRunner for ProcessRunner {
    async fn run(&self, plan: &LaunchPlan) -> Result<ExitOutcome, RunError> {
        let mut child = build_command(plan)
            .spawn()
            .map_err(|source| RunError::SpawnFailed {
                program: plan.program.clone(),
                source,
            })?;

        tracing::info!(
            pid = child.id(),
            command = %plan.command_line(),
            working_dir = %plan.context.working_dir.display(),
            "Started script"
        );

        let status = loop {
            tokio::select! {
                status = child.wait() => break status?,
                signal = tokio::signal::ctrl_c() => {
                    if let Err(err) = signal {
                        tracing::debug!(?err, "Interrupt handler unavailable");
                        break child.wait().await?;
                    }
                    tracing::info!("Interrupt received, waiting for script to exit");
                }
            }
        };

        Ok(outcome_from_status(status))
    }
}

fn build_command(plan: &LaunchPlan) -> Command {
    let mut cmd = Command::new(&plan.program);
    cmd.args(&plan.args).current_dir(&plan.context.working_dir);
    for key in &plan.context.env.remove {
        cmd.env_remove(key);
    }
    cmd.envs(&plan.context.env.set);
    cmd
}

fn outcome_from_status(status: ExitStatus) -> ExitOutcome {
    if let Some(code) = status.code() {
        return ExitOutcome::exited(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitOutcome::signaled(signal);
        }
    }

    ExitOutcome {
        code: None,
        signal: None,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::{Path, PathBuf};

    use pvestats_core::{EnvFileMode, EnvOverlay, LaunchContext, OsType, Platform};

    use super::*;

    fn sh_plan(working_dir: &Path, script: &str, env: EnvOverlay) -> LaunchPlan {
        LaunchPlan {
            ostype: OsType::detect(Some("linux-gnu")),
            platform: Platform::Linux,
            context: LaunchContext::with_env(working_dir.to_path_buf(), env),
            env_file: working_dir.join(".env"),
            env_mode: EnvFileMode::Export,
            env_loaded: 0,
            venv: None,
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[tokio::test]
    async fn test_exit_code_is_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ProcessRunner::new()
            .run(&sh_plan(dir.path(), "exit 3", EnvOverlay::new()))
            .await
            .unwrap();
        assert_eq!(outcome, ExitOutcome::exited(3));
    }

    #[tokio::test]
    async fn test_overlay_reaches_child() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = EnvOverlay::new();
        env.set("MQTT_TOPIC_PREFIX", "homeassistant/sensor");
        env.unset("PYTHONHOME");
        let script = r#"test "$MQTT_TOPIC_PREFIX" = "homeassistant/sensor" && test -z "${PYTHONHOME+x}""#;

        let outcome = ProcessRunner::new()
            .run(&sh_plan(dir.path(), script, env))
            .await
            .unwrap();
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn test_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("proxmox-stats-to-mqtt.py"), "").unwrap();

        let outcome = ProcessRunner::new()
            .run(&sh_plan(dir.path(), "test -f proxmox-stats-to-mqtt.py", EnvOverlay::new()))
            .await
            .unwrap();
        assert!(outcome.success());
    }

    #[tokio::test]
    async fn test_signal_termination() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ProcessRunner::new()
            .run(&sh_plan(dir.path(), "kill -TERM $$", EnvOverlay::new()))
            .await
            .unwrap();
        assert_eq!(outcome, ExitOutcome::signaled(15));
        assert_eq!(outcome.shell_code(), 143);
    }

    #[tokio::test]
    async fn test_interrupt_waits_for_child_status() {
        let dir = tempfile::tempdir().unwrap();
        // SIGINT to the runner first, as a terminal Ctrl-C would, then to the script.
        let script = "sleep 1; kill -INT $PPID; sleep 1; kill -INT $$";

        let outcome = ProcessRunner::new()
            .run(&sh_plan(dir.path(), script, EnvOverlay::new()))
            .await
            .unwrap();
        assert_eq!(outcome, ExitOutcome::signaled(2));
        assert_eq!(outcome.shell_code(), 130);
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = sh_plan(dir.path(), "", EnvOverlay::new());
        plan.program = dir.path().join("no-such-python");

        let err = ProcessRunner::new().run(&plan).await.unwrap_err();
        assert!(matches!(err, RunError::SpawnFailed { .. }));
        assert_eq!(err.shell_code(), 127);
    }
}

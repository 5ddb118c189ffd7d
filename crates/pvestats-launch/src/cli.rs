//! Command-line interface.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use pvestats_core::{
    LauncherConfig,
    config::{DEFAULT_SCRIPT, DEFAULT_VENV_DIR},
    env_file::DEFAULT_ENV_FILE,
};

#[derive(Debug, Parser)]
#[command(name = "pvestats-launch")]
#[command(about = "Run the Proxmox stats publisher with its virtual environment and .env loaded")]
#[command(version)]
pub struct Cli {
    /// Shell OS identifier selecting the branch (linux-gnu*, msys)
    #[arg(long, env = "OSTYPE")]
    pub os_type: Option<String>,

    /// Working directory (default: /root/proxmox-stats on Linux, current directory on msys)
    #[arg(short = 'C', long, env = "PVESTATS_WORKDIR")]
    pub workdir: Option<PathBuf>,

    /// Env file, relative to the working directory
    #[arg(long, env = "PVESTATS_ENV_FILE", default_value = DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,

    /// Virtual environment directory, relative to the working directory (Linux only)
    #[arg(long, env = "PVESTATS_VENV", default_value = DEFAULT_VENV_DIR)]
    pub venv: PathBuf,

    /// Script to run
    #[arg(long, env = "PVESTATS_SCRIPT", default_value = DEFAULT_SCRIPT)]
    pub script: PathBuf,

    /// Interpreter command line (default: python3 on Linux, python on msys)
    #[arg(long, env = "PVESTATS_INTERPRETER")]
    pub interpreter: Option<String>,

    /// Fail when the env file, virtual environment or interpreter is missing
    #[arg(long)]
    pub strict: bool,

    /// Do not ask login shells for a fuller PATH when the interpreter is missing
    #[arg(long)]
    pub no_login_path: bool,

    /// Print the prepared launch as JSON instead of running it
    #[arg(long)]
    pub dry_run: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Arguments passed to the script (after `--`)
    #[arg(last = true)]
    pub script_args: Vec<String>,
}

impl Cli {
    /// Launcher configuration from the parsed arguments.
    #[must_use]
    pub fn config(&self) -> LauncherConfig {
        LauncherConfig {
            workdir: self.workdir.clone(),
            env_file: self.env_file.clone(),
            venv_dir: self.venv.clone(),
            script: self.script.clone(),
            interpreter: self.interpreter.clone(),
            script_args: self.script_args.clone(),
            strict: self.strict,
            login_shell_path: !self.no_login_path,
            ..LauncherConfig::default()
        }
    }

    /// Log filter used when `RUST_LOG` is not set.
    #[must_use]
    pub const fn default_log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

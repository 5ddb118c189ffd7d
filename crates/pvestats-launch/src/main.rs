//! Runs `proxmox-stats-to-mqtt.py` once with its environment prepared.
//!
//! Run with: cargo run -p pvestats-launch -- [--os-type linux-gnu] [-- --publish-discovery]
//!
//! The process exits with the script's exit code.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use pvestats_core::{OsType, ScriptRunner};
use pvestats_executor::{LaunchError, Launcher, ProcessRunner};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.default_log_filter().into()),
        )
        .init();

    let ostype = OsType::detect(cli.os_type.as_deref());
    tracing::debug!(ostype = %ostype.value, source = ?ostype.source, "Detected OSTYPE");

    let launcher = Launcher::new(cli.config(), ProcessRunner::new());

    if cli.dry_run {
        return exit_code(dry_run(&launcher, &ostype).await);
    }

    match launcher.launch(&ostype).await {
        Ok(outcome) => exit_code(outcome.shell_code()),
        Err(err) => exit_code(launch_failed(&err)),
    }
}

/// Print the prepared plan; returns the shell-style exit code.
async fn dry_run<R: ScriptRunner>(launcher: &Launcher<R>, ostype: &OsType) -> i32 {
    let plan = match launcher.prepare(ostype).await {
        Ok(plan) => plan,
        Err(err) => return launch_failed(&err),
    };
    match plan.to_json_pretty() {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to render launch plan");
            eprintln!("pvestats-launch: {err}");
            1
        }
    }
}

fn launch_failed(err: &LaunchError) -> i32 {
    tracing::error!(error = %err, "Launch failed");
    eprintln!("pvestats-launch: {err}");
    err.exit_code()
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(exit_byte(code))
}

/// Shell-style code truncated the way shells report it.
fn exit_byte(code: i32) -> u8 {
    u8::try_from(code.rem_euclid(256)).unwrap_or(1)
}

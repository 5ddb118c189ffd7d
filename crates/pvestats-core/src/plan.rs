//! Fully prepared launch, ready to hand to a [`ScriptRunner`](crate::ScriptRunner).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{EnvFileMode, LaunchContext, OsType, Platform};

/// Name fragments whose values are masked in [`LaunchPlan::redacted`].
const SENSITIVE_FRAGMENTS: [&str; 4] = ["SECRET", "PASSWORD", "PASSWD", "TOKEN"];

const REDACTED: &str = "********";

/// Everything needed to run the script once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchPlan {
    pub ostype: OsType,
    pub platform: Platform,
    pub context: LaunchContext,
    /// `.env` file consulted for this launch.
    pub env_file: PathBuf,
    pub env_mode: EnvFileMode,
    /// Number of variables taken from the `.env` file.
    pub env_loaded: usize,
    /// Activated virtual environment, if any.
    pub venv: Option<PathBuf>,
    /// Resolved interpreter.
    pub program: PathBuf,
    /// Interpreter arguments, script path and forwarded script arguments.
    pub args: Vec<String>,
}

impl LaunchPlan {
    /// Copy with credential-like values masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut plan = self.clone();
        for (key, value) in &mut plan.context.env.set {
            if is_sensitive(key) {
                REDACTED.clone_into(value);
            }
        }
        plan
    }

    /// Pretty JSON of the redacted plan.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.redacted())
    }

    /// Shell-quoted command line, for logs.
    #[must_use]
    pub fn command_line(&self) -> String {
        let program = self.program.to_string_lossy();
        let words = std::iter::once(program.as_ref()).chain(self.args.iter().map(String::as_str));
        shlex::try_join(words).unwrap_or_else(|_| {
            format!("{} {}", self.program.display(), self.args.join(" "))
        })
    }
}

fn is_sensitive(key: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    SENSITIVE_FRAGMENTS.iter().any(|fragment| upper.contains(fragment))
}

//! `.env` loading.
//!
//! Two grammars are supported, one per platform branch:
//! - [`EnvFileMode::Export`] drops `#` lines, splits the rest into shell
//!   words and exports every `KEY=VALUE` word.
//! - [`EnvFileMode::Source`] uses the dotenv grammar (quotes, `export`
//!   prefix, inline comments, `${VAR}` substitution).

use std::{
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Conventional file name, resolved against the working directory.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// `.env` loading error.
#[derive(Debug, Error)]
pub enum EnvFileError {
    #[error("Env file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read env file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unbalanced quotes in env file {0}")]
    UnbalancedQuotes(PathBuf),
    #[error("Failed to parse env file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Grammar used to read a `.env` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvFileMode {
    /// `export $(grep -v '^#' .env | xargs)`
    Export,
    /// `source .env`
    Source,
}

/// Variables read from a `.env` file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars {
    pub vars: Vec<(String, String)>,
    /// Words that looked like assignments but had an invalid name.
    pub rejected: Vec<String>,
}

impl EnvVars {
    /// Last value assigned to `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl IntoIterator for EnvVars {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.into_iter()
    }
}

/// Read and parse the `.env` file at `path`.
///
/// # Errors
/// Returns error if the file is missing, unreadable or malformed.
pub fn load_env_file(path: &Path, mode: EnvFileMode) -> Result<EnvVars, EnvFileError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            EnvFileError::NotFound(path.to_path_buf())
        } else {
            EnvFileError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let parsed = match mode {
        EnvFileMode::Export => parse_exported(&contents)
            .ok_or_else(|| EnvFileError::UnbalancedQuotes(path.to_path_buf()))?,
        EnvFileMode::Source => parse_sourced(&contents).map_err(|source| EnvFileError::Parse {
            path: path.to_path_buf(),
            source,
        })?,
    };

    for word in &parsed.rejected {
        tracing::warn!(path = %path.display(), %word, "Skipping env entry with invalid name");
    }
    tracing::debug!(path = %path.display(), ?mode, count = parsed.len(), "Loaded env file");

    Ok(parsed)
}

/// Parse with export semantics. Returns `None` on unbalanced quotes.
#[must_use]
pub fn parse_exported(contents: &str) -> Option<EnvVars> {
    let retained = contents
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.starts_with('#'))
        .map(escape_word_comments)
        .collect::<Vec<_>>()
        .join("\n");

    let words = shlex::split(&retained)?;

    let mut parsed = EnvVars::default();
    for word in words {
        // Bare names re-export an inherited variable, which the child already sees.
        let Some((key, value)) = word.split_once('=') else {
            continue;
        };
        if is_valid_name(key) {
            parsed.vars.push((key.to_string(), value.to_string()));
        } else {
            parsed.rejected.push(word);
        }
    }
    Some(parsed)
}

/// Escape `#` at the start of an unquoted word.
///
/// `shlex` reads such a `#` as a comment to end of line, while `xargs`
/// keeps it as an ordinary word.
fn escape_word_comments(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let (mut single, mut double, mut escaped) = (false, false, false);
    let mut word_start = true;
    for c in line.chars() {
        if escaped {
            escaped = false;
        } else if single {
            single = c != '\'';
        } else if double {
            match c {
                '"' => double = false,
                '\\' => escaped = true,
                _ => {}
            }
        } else {
            match c {
                '\'' => single = true,
                '"' => double = true,
                '\\' => escaped = true,
                '#' if word_start => out.push('\\'),
                _ => {}
            }
        }
        word_start = !single && !double && !escaped && (c == ' ' || c == '\t');
        out.push(c);
    }
    out
}

/// Parse with dotenv (`source`) semantics.
///
/// # Errors
/// Returns the first line the dotenv grammar rejects.
pub fn parse_sourced(contents: &str) -> Result<EnvVars, dotenvy::Error> {
    let vars = dotenvy::from_read_iter(contents.as_bytes()).collect::<Result<Vec<_>, _>>()?;
    Ok(EnvVars {
        vars,
        rejected: Vec::new(),
    })
}

/// Shell variable name: `[A-Za-z_][A-Za-z0-9_]*`.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

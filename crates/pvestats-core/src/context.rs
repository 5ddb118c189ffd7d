//! Launch context: working directory plus environment overlay.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

/// Changes applied on top of the inherited environment of the child process.
///
/// The launcher never mutates its own process environment; everything the
/// script should see goes through an overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvOverlay {
    /// Variables to set, last write wins.
    #[serde(default)]
    pub set: BTreeMap<String, String>,
    /// Variables to remove from the inherited environment.
    #[serde(default)]
    pub remove: BTreeSet<String>,
}

impl EnvOverlay {
    /// Create an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, cancelling any earlier removal of it.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.remove.remove(&key);
        self.set.insert(key, value.into());
    }

    /// Remove a variable, cancelling any earlier assignment of it.
    pub fn unset(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.set.remove(&key);
        self.remove.insert(key);
    }

    /// Get a variable assigned by this overlay.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.set.get(key).map(String::as_str)
    }

    /// Whether this overlay removes `key`.
    #[must_use]
    pub fn removes(&self, key: &str) -> bool {
        self.remove.contains(key)
    }

    /// Apply a batch of assignments in order.
    pub fn extend<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.set(key, value);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

/// Where and with which environment the script runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchContext {
    /// Working directory of the script.
    pub working_dir: PathBuf,

    /// Environment changes for the script.
    #[serde(default)]
    pub env: EnvOverlay,
}

impl LaunchContext {
    /// Create a context with a prepared overlay.
    #[must_use]
    pub const fn with_env(working_dir: PathBuf, env: EnvOverlay) -> Self {
        Self { working_dir, env }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_after_unset_wins() {
        let mut env = EnvOverlay::new();
        env.unset("PYTHONHOME");
        env.set("PYTHONHOME", "/opt/python");
        assert_eq!(env.get("PYTHONHOME"), Some("/opt/python"));
        assert!(!env.removes("PYTHONHOME"));
    }

    #[test]
    fn test_unset_after_set_wins() {
        let mut env = EnvOverlay::new();
        env.set("PYTHONHOME", "/opt/python");
        env.unset("PYTHONHOME");
        assert_eq!(env.get("PYTHONHOME"), None);
        assert!(env.removes("PYTHONHOME"));
    }

    #[test]
    fn test_extend_last_write_wins() {
        let mut env = EnvOverlay::new();
        env.extend([("MQTT_PORT", "1883"), ("MQTT_PORT", "8883")]);
        assert_eq!(env.get("MQTT_PORT"), Some("8883"));
        assert_eq!(env.set.len(), 1);
    }
}

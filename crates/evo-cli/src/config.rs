//! User configuration at `~/.config/evo.toml`.
//!
//! Provides the makefile location and test-loop settings.
//! CLI flags always override config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use evo_core::RestartPolicy;
use serde::Deserialize;
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory handed to `make -C`.
    #[serde(default = "default_makefile_path")]
    pub makefile_path: String,

    /// Settings for `evo test-loop`.
    #[serde(default)]
    pub test_loop: TestLoopConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            makefile_path: default_makefile_path(),
            test_loop: TestLoopConfig::default(),
        }
    }
}

/// What restarts a test loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// Writes to the located test file.
    #[default]
    File,
    /// A global key combination.
    Hotkey,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestLoopConfig {
    #[serde(default)]
    pub trigger: TriggerKind,

    /// Combination used when `trigger = "hotkey"`.
    #[serde(default = "default_hotkey")]
    pub hotkey: String,

    /// "replace" or "overlap".
    #[serde(default = "default_restart_policy")]
    pub restart_policy: String,

    /// Writes closer together than this count as one.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Subdirectories searched for test files, in order.
    #[serde(default = "default_test_dirs")]
    pub test_dirs: Vec<String>,
}

impl Default for TestLoopConfig {
    fn default() -> Self {
        Self {
            trigger: TriggerKind::default(),
            hotkey: default_hotkey(),
            restart_policy: default_restart_policy(),
            debounce_ms: default_debounce_ms(),
            test_dirs: default_test_dirs(),
        }
    }
}

impl TestLoopConfig {
    pub fn restart_policy(&self) -> Result<RestartPolicy> {
        self.restart_policy
            .parse()
            .map_err(anyhow::Error::msg)
            .context("invalid test_loop.restart_policy")
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_makefile_path() -> String {
    ".".to_string()
}

fn default_hotkey() -> String {
    "ctrl+0".to_string()
}

fn default_restart_policy() -> String {
    "replace".to_string()
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_test_dirs() -> Vec<String> {
    vec!["testing".to_string(), "tests".to_string()]
}

/// `~/.config/evo.toml`
pub fn default_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_default();
    home.join(".config").join("evo.toml")
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &str) -> Result<Self> {
        let path = Path::new(path);
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

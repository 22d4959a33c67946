use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths::Paths;

/// How to wait for the workbench to finish compiling after the run control
/// is activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitMode {
    /// Sleep a fixed interval and read whatever the output editor holds.
    /// If the workbench is slower than the interval, the stale pre-run
    /// content is returned.
    Fixed,
    /// Re-read the output editor until its content changes from the pre-run
    /// baseline, bounded by `output_poll_timeout_ms`.
    Poll,
}

impl Default for WaitMode {
    fn default() -> Self {
        Self::Fixed
    }
}

impl WaitMode {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "poll" => Ok(Self::Poll),
            other => Err(Error::Config(format!(
                "Unknown wait mode '{}' (expected 'fixed' or 'poll')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default)]
    pub headed: bool,
    /// Explicit browser binary path. Overrides engine-based discovery.
    #[serde(default)]
    pub binary: Option<String>,
}

fn default_engine() -> String {
    "chrome".to_string()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            headed: false,
            binary: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingConfig {
    /// Settle after the workbench reports its editors present.
    #[serde(default = "default_page_settle_ms")]
    pub page_settle_ms: u64,
    /// Settle after each UI action (consent click, content injection).
    #[serde(default = "default_action_settle_ms")]
    pub action_settle_ms: u64,
    /// Fixed wait for the compile to finish (WaitMode::Fixed).
    #[serde(default = "default_compile_wait_ms")]
    pub compile_wait_ms: u64,
    /// Bound on waiting for the workbench editors to appear after navigation.
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,
    /// Interval between readiness/output polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Bound on waiting for the output editor to change (WaitMode::Poll).
    #[serde(default = "default_output_poll_timeout_ms")]
    pub output_poll_timeout_ms: u64,
}

fn default_page_settle_ms() -> u64 {
    2000
}
fn default_action_settle_ms() -> u64 {
    250
}
fn default_compile_wait_ms() -> u64 {
    1000
}
fn default_resolve_timeout_ms() -> u64 {
    10_000
}
fn default_poll_interval_ms() -> u64 {
    200
}
fn default_output_poll_timeout_ms() -> u64 {
    15_000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            page_settle_ms: default_page_settle_ms(),
            action_settle_ms: default_action_settle_ms(),
            compile_wait_ms: default_compile_wait_ms(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            output_poll_timeout_ms: default_output_poll_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub wait_mode: WaitMode,
}

impl Config {
    /// Load the config file if present, otherwise return defaults.
    /// A present-but-unparseable file is an error, not a silent fallback.
    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        Self::load_from(&paths.config_file())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

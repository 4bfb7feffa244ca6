//! # Configuration
//!
//! Manages the loading and parsing of the application's configuration file (`config.yaml`).
//! Every section has defaults, so an empty or missing file yields a working setup.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main application configuration structure.
/// Matches the layout of `data/config.yaml`.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct AppConfig {
    /// Optional language model used for confirmations and multi-step parsing.
    #[serde(default)]
    pub advisor: Option<AdvisorConfig>,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdvisorConfig {
    /// "openai" (and compatible endpoints) or "anthropic"
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>, // e.g. "OPENAI_API_KEY"
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// A consumer that polled within this window counts as connected.
    #[serde(default = "default_connected_window")]
    pub connected_window_secs: u64,
    /// Wall-clock limit for one compiled plan script.
    #[serde(default = "default_plan_timeout")]
    pub plan_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            connected_window_secs: default_connected_window(),
            plan_timeout_secs: default_plan_timeout(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1000
}
fn default_connected_window() -> u64 {
    5
}
fn default_plan_timeout() -> u64 {
    900
}

/// Host shell used to run compiled scripts. The script path is appended to `args`.
#[derive(Debug, Deserialize, Clone)]
pub struct ShellConfig {
    #[serde(default = "default_shell_program")]
    pub program: String,
    #[serde(default = "default_shell_args")]
    pub args: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: default_shell_program(),
            args: default_shell_args(),
        }
    }
}

fn default_shell_program() -> String {
    if cfg!(target_os = "windows") {
        "powershell.exe".to_string()
    } else {
        "pwsh".to_string()
    }
}

fn default_shell_args() -> Vec<String> {
    ["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass", "-File"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
    #[serde(default = "default_script_timeout")]
    pub script_timeout_secs: u64,
    #[serde(default = "default_max_stdout")]
    pub max_stdout_bytes: usize,
    #[serde(default = "default_max_stderr")]
    pub max_stderr_bytes: usize,
    #[serde(default = "default_max_file")]
    pub max_file_bytes: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            script_timeout_secs: default_script_timeout(),
            max_stdout_bytes: default_max_stdout(),
            max_stderr_bytes: default_max_stderr(),
            max_file_bytes: default_max_file(),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("HostPilot")
        .join("Workspace")
}
fn default_script_timeout() -> u64 {
    30
}
fn default_max_stdout() -> usize {
    100_000
}
fn default_max_stderr() -> usize {
    50_000
}
fn default_max_file() -> usize {
    1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            capacity: default_history_capacity(),
            debounce_ms: default_debounce(),
        }
    }
}

fn default_history_path() -> PathBuf {
    PathBuf::from("data/action-history.json")
}
fn default_history_capacity() -> usize {
    500
}
fn default_debounce() -> u64 {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfirmationConfig {
    #[serde(default = "default_confirmation_ttl")]
    pub ttl_secs: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_confirmation_ttl(),
        }
    }
}

fn default_confirmation_ttl() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_log_file")]
    pub file: String,
    /// Used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file: default_log_file(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_log_file() -> String {
    "session.log".to_string()
}
fn default_log_filter() -> String {
    "info,reqwest=warn,hyper=warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert!(config.advisor.is_none());
        assert_eq!(config.bridge.poll_interval_ms, 1000);
        assert_eq!(config.bridge.connected_window_secs, 5);
        assert_eq!(config.workspace.script_timeout_secs, 30);
        assert_eq!(config.workspace.max_stdout_bytes, 100_000);
        assert_eq!(config.workspace.max_stderr_bytes, 50_000);
        assert_eq!(config.history.capacity, 500);
        assert_eq!(config.history.debounce_ms, 2000);
        assert_eq!(config.confirmation.ttl_secs, 300);
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
advisor:
  provider: anthropic
  model: claude-3-5-haiku-20241022
  api_key_env: ANTHROPIC_API_KEY
bridge:
  poll_interval_ms: 250
workspace:
  root: /tmp/hostpilot
"#;
        let config = AppConfig::parse(yaml).unwrap();
        let advisor = config.advisor.unwrap();
        assert_eq!(advisor.provider, "anthropic");
        assert_eq!(advisor.max_tokens, 300);
        assert_eq!(config.bridge.poll_interval_ms, 250);
        assert_eq!(config.bridge.plan_timeout_secs, 900);
        assert_eq!(config.workspace.root, PathBuf::from("/tmp/hostpilot"));
        assert_eq!(config.shell.args.last().map(String::as_str), Some("-File"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config.history.path, PathBuf::from("data/action-history.json"));
    }
}

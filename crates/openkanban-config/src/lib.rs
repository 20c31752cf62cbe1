use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod validate;

pub use validate::{ValidationEntry, ValidationResult};

pub const ENV_OPENKANBAN_CONFIG: &str = "OPENKANBAN_CONFIG";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;
pub const MIN_POLL_INTERVAL_SECS: u64 = 1;
const DEFAULT_THEME: &str = "catppuccin-mocha";
const DEFAULT_AGENT: &str = "claude";
const DEFAULT_BRANCH_PREFIX: &str = "task/";
const DEFAULT_SESSION_PREFIX: &str = "ok-";
const DEFAULT_REMOVE_WORKTREE_ON_DELETE: bool = true;

pub const KNOWN_THEMES: &[&str] = &[
    "catppuccin-mocha",
    "catppuccin-latte",
    "dracula",
    "gruvbox",
    "nord",
    "tokyo-night",
];

/// Placeholders the init-prompt template may reference.
pub const PROMPT_PLACEHOLDERS: &[&str] = &[
    "{{.Title}}",
    "{{.Description}}",
    "{{.BranchName}}",
    "{{.BaseBranch}}",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Message(String),
    #[error("invalid configuration:\n{0}")]
    Invalid(String),
}

impl ConfigError {
    fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AgentConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Relative path of a JSON status file inside the worktree, if the agent
    /// writes one.
    #[serde(default)]
    pub status_file: String,
    #[serde(default)]
    pub init_prompt: String,
    /// Flags appended when re-spawning an agent that already ran for the
    /// ticket, for agents that support session resumption.
    #[serde(default)]
    pub resume_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,
    #[serde(default = "default_agent")]
    pub default_agent: String,
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
    #[serde(default = "default_session_prefix")]
    pub session_prefix: String,
    #[serde(default = "default_remove_worktree_on_delete")]
    pub remove_worktree_on_delete: bool,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_theme() -> String {
    DEFAULT_THEME.to_owned()
}

fn default_agent() -> String {
    DEFAULT_AGENT.to_owned()
}

fn default_branch_prefix() -> String {
    DEFAULT_BRANCH_PREFIX.to_owned()
}

fn default_session_prefix() -> String {
    DEFAULT_SESSION_PREFIX.to_owned()
}

fn default_remove_worktree_on_delete() -> bool {
    DEFAULT_REMOVE_WORKTREE_ON_DELETE
}

impl Default for Config {
    fn default() -> Self {
        let mut agents = BTreeMap::new();
        agents.insert(
            "claude".to_owned(),
            AgentConfig {
                command: "claude".to_owned(),
                args: Vec::new(),
                env: BTreeMap::new(),
                status_file: String::new(),
                init_prompt: "Work on: {{.Title}}\n\n{{.Description}}\n\nYou are on branch {{.BranchName}} (based on {{.BaseBranch}}).".to_owned(),
                resume_args: vec!["--continue".to_owned()],
            },
        );
        agents.insert(
            "opencode".to_owned(),
            AgentConfig {
                command: "opencode".to_owned(),
                args: Vec::new(),
                env: BTreeMap::new(),
                status_file: String::new(),
                init_prompt: String::new(),
                resume_args: vec!["--continue".to_owned()],
            },
        );

        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            theme: DEFAULT_THEME.to_owned(),
            agents,
            default_agent: DEFAULT_AGENT.to_owned(),
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_owned(),
            session_prefix: DEFAULT_SESSION_PREFIX.to_owned(),
            remove_worktree_on_delete: DEFAULT_REMOVE_WORKTREE_ON_DELETE,
        }
    }
}

impl Config {
    /// Polling cadence with the 1 second floor applied.
    pub fn poll_interval_secs(&self) -> u64 {
        self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS)
    }

    pub fn agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.get(name)
    }

    pub fn default_agent_config(&self) -> Option<&AgentConfig> {
        self.agents.get(&self.default_agent)
    }
}

pub fn load_from_env() -> Result<Config, ConfigError> {
    load_from_path(config_path_from_env()?)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    load_or_create(path.as_ref())
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = resolve_home_dir().ok_or_else(|| {
        ConfigError::message("Unable to resolve home directory from HOME or USERPROFILE")
    })?;
    Ok(home.join(".config").join("openkanban").join("config.json"))
}

/// Data directory for ticket and project stores, and the log file.
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    let home = resolve_home_dir().ok_or_else(|| {
        ConfigError::message("Unable to resolve home directory from HOME or USERPROFILE")
    })?;
    Ok(home.join(".local").join("share").join("openkanban"))
}

fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_OPENKANBAN_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                default_config_path()
            } else {
                Ok(raw.into())
            }
        }
        Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(_) => Err(ConfigError::message(
            "OPENKANBAN_CONFIG contained invalid UTF-8",
        )),
    }
}

fn resolve_home_dir() -> Option<PathBuf> {
    for key in ["HOME", "USERPROFILE"] {
        if let Ok(value) = std::env::var(key) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(PathBuf::from(value));
            }
        }
    }
    None
}

fn load_or_create(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        let raw = fs::read_to_string(path).map_err(|error| {
            ConfigError::message(format!(
                "Failed to read config '{}': {error}",
                path.display()
            ))
        })?;
        return serde_json::from_str(&raw).map_err(|error| {
            ConfigError::message(format!(
                "Failed to parse config '{}': {error}",
                path.display()
            ))
        });
    }

    let config = Config::default();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| {
            ConfigError::message(format!(
                "Failed to create config directory '{}': {error}",
                parent.display()
            ))
        })?;
    }
    let rendered = serde_json::to_string_pretty(&config)
        .map_err(|error| ConfigError::message(format!("Failed to encode config: {error}")))?;
    fs::write(path, rendered).map_err(|error| {
        ConfigError::message(format!(
            "Failed to write config '{}': {error}",
            path.display()
        ))
    })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = Config::default();
        let serialized = serde_json::to_string(&config).expect("serialize config");
        let deserialized: Config = serde_json::from_str(&serialized).expect("deserialize config");
        assert_eq!(deserialized, config);
    }

    #[test]
    fn load_creates_default_config_when_missing() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("config.json");

        let config = load_from_path(&path).expect("load config");
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let reloaded = load_from_path(&path).expect("reload config");
        assert_eq!(reloaded, config);
    }

    #[test]
    fn poll_interval_floor_is_one_second() {
        let config = Config {
            poll_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.poll_interval_secs(), 1);

        let config = Config {
            poll_interval_secs: 5,
            ..Config::default()
        };
        assert_eq!(config.poll_interval_secs(), 5);
    }

    #[test]
    fn partial_config_files_fill_in_defaults() {
        let parsed: Config =
            serde_json::from_str(r#"{"default_agent": "claude"}"#).expect("parse partial config");
        assert_eq!(parsed.theme, DEFAULT_THEME);
        assert_eq!(parsed.branch_prefix, DEFAULT_BRANCH_PREFIX);
        assert_eq!(parsed.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
    }
}

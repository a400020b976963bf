use std::path::{Path, PathBuf};

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ExitError;

/// Config file name constant.
pub const CONFIG_TOML: &str = ".convoy.toml";

/// Find the config file in a project root. Returns None if absent.
pub fn find_config(dir: &Path) -> Option<PathBuf> {
    let path = dir.join(CONFIG_TOML);
    if path.exists() { Some(path) } else { None }
}

/// Top-level `.convoy.toml` config.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            project: ProjectConfig::default(),
            executor: ExecutorConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

/// Version-control settings for finalization.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProjectConfig {
    /// Branch that finished batches merge into.
    #[serde(default = "default_target_branch")]
    pub target_branch: String,
    /// Push the target branch to `origin` after a successful merge.
    #[serde(default)]
    pub push: bool,
    /// Revision to branch worktrees from. Defaults to the target branch.
    #[serde(default)]
    pub base_revision: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            target_branch: default_target_branch(),
            push: false,
            base_revision: None,
        }
    }
}

/// The per-item executor: an opaque shell command run once per work item.
///
/// The command runs with the worktree as its working directory and the item
/// description in `$CONVOY_ITEM`. Exit code 0 is success; the code lists
/// below classify failures, everything else is a permanent failure.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecutorConfig {
    /// Shell command run for each item (via `sh -c`). Required for start/resume.
    #[serde(default)]
    pub command: Option<String>,
    /// Per-item timeout in seconds. A timeout counts as a transient failure.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Exit codes classified as transient (retried). Default: 75 (EX_TEMPFAIL).
    #[serde(default = "default_transient_codes")]
    pub transient_exit_codes: Vec<i32>,
    /// Exit codes classified as security-critical (recorded, never retried).
    #[serde(default = "default_security_codes")]
    pub security_exit_codes: Vec<i32>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout: default_timeout(),
            transient_exit_codes: default_transient_codes(),
            security_exit_codes: default_security_codes(),
        }
    }
}

/// Batch loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchConfig {
    /// Maximum length of a single item description, in characters.
    #[serde(default = "default_max_item_length")]
    pub max_item_length: usize,
    /// Total attempts for a transiently-failing item.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Directory (relative to the project root) holding checkpoints and worktrees.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_item_length: default_max_item_length(),
            retry_attempts: default_retry_attempts(),
            state_dir: default_state_dir(),
        }
    }
}

fn default_version() -> String {
    "1".to_string()
}

fn default_target_branch() -> String {
    "main".to_string()
}

const fn default_timeout() -> u64 {
    900
}

fn default_transient_codes() -> Vec<i32> {
    vec![75]
}

fn default_security_codes() -> Vec<i32> {
    vec![77]
}

const fn default_max_item_length() -> usize {
    500
}

const fn default_retry_attempts() -> u32 {
    3
}

fn default_state_dir() -> String {
    ".convoy".to_string()
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&raw)
            .map_err(|e| ExitError::Config(format!("{}: {e}", path.display())).into())
    }

    /// Load config from the project root, falling back to defaults when no
    /// `.convoy.toml` exists.
    pub fn load_or_default(root: &Path) -> anyhow::Result<Self> {
        find_config(root).map_or_else(|| Ok(Self::default()), |path| Self::load(&path))
    }

    /// The executor command, or a config error naming the missing key.
    pub fn executor_command(&self) -> anyhow::Result<&str> {
        self.executor.command.as_deref().ok_or_else(|| {
            ExitError::Config(
                "executor.command is not set; add it to .convoy.toml".to_string(),
            )
            .into()
        })
    }
}

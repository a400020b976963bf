//! Per-item executor: the opaque external collaborator that does the work.
//!
//! The orchestrator has no visibility into what an executor does; it only
//! sees a classified result. The default backend runs a configured shell
//! command in the worktree and classifies its exit code.

use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::error::ExitError;
use crate::subprocess::Tool;

use super::FailureClass;

/// Classified result of executing one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Succeeded,
    Failed { class: FailureClass, reason: String },
}

/// Anything that can execute a work item inside a worktree.
pub trait ItemExecutor {
    fn execute(&self, description: &str, worktree: &Path) -> anyhow::Result<ExecOutcome>;
}

/// Shell-command executor.
///
/// Runs the command via `sh -c` with the worktree as cwd, the item in
/// `$CONVOY_ITEM`, and the worktree path in `$CONVOY_WORKTREE`. Exit code 0
/// is success; configured code lists select the failure class; a timeout is
/// a transient failure.
pub struct CommandExecutor {
    command: String,
    timeout: Duration,
    transient_codes: Vec<i32>,
    security_codes: Vec<i32>,
}

impl CommandExecutor {
    pub fn new(
        command: impl Into<String>,
        timeout: Duration,
        transient_codes: Vec<i32>,
        security_codes: Vec<i32>,
    ) -> Self {
        Self {
            command: command.into(),
            timeout,
            transient_codes,
            security_codes,
        }
    }

    /// Build the executor from `[executor]` config. Errors when no command
    /// is configured.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let command = config.executor_command()?.to_string();
        Ok(Self::new(
            command,
            Duration::from_secs(config.executor.timeout),
            config.executor.transient_exit_codes.clone(),
            config.executor.security_exit_codes.clone(),
        ))
    }

    fn classify(&self, exit_code: i32) -> FailureClass {
        if self.transient_codes.contains(&exit_code) {
            FailureClass::Transient
        } else if self.security_codes.contains(&exit_code) {
            FailureClass::SecurityCritical
        } else {
            FailureClass::Permanent
        }
    }
}

impl ItemExecutor for CommandExecutor {
    fn execute(&self, description: &str, worktree: &Path) -> anyhow::Result<ExecOutcome> {
        let result = Tool::new("sh")
            .args(&["-c", &self.command])
            .current_dir(worktree)
            .env("CONVOY_ITEM", description)
            .env("CONVOY_WORKTREE", &worktree.to_string_lossy())
            .timeout(self.timeout)
            .run();

        match result {
            Ok(output) if output.success() => Ok(ExecOutcome::Succeeded),
            Ok(output) => {
                let stderr = output.stderr.trim();
                let reason = if stderr.is_empty() {
                    format!("executor exited with code {}", output.exit_code)
                } else {
                    format!(
                        "executor exited with code {}: {}",
                        output.exit_code,
                        stderr.lines().last().unwrap_or(stderr)
                    )
                };
                Ok(ExecOutcome::Failed {
                    class: self.classify(output.exit_code),
                    reason,
                })
            }
            Err(e) => match e.downcast_ref::<ExitError>() {
                Some(ExitError::Timeout { timeout_secs, .. }) => Ok(ExecOutcome::Failed {
                    class: FailureClass::Transient,
                    reason: format!("executor timed out after {timeout_secs}s"),
                }),
                _ => Err(e),
            },
        }
    }
}

use std::process::ExitCode;

/// Errors that cause convoy to exit with a specific code.
#[derive(Debug, thiserror::Error)]
pub enum ExitError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("item {index} is {len} chars, max is {cap}")]
    ItemTooLong {
        index: usize,
        len: usize,
        cap: usize,
    },

    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{tool} failed (exit {code}): {message}")]
    ToolFailed {
        tool: String,
        code: i32,
        message: String,
    },

    #[error("{tool} timed out after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },

    #[error("worktree creation failed: {0}")]
    WorktreeCreation(String),

    #[error("no checkpoint found for batch {id}")]
    CheckpointNotFound { id: String },

    #[error("checkpoint for batch {id} is corrupt: {detail}")]
    CheckpointCorrupt { id: String, detail: String },

    #[error("merge conflicts in {} file(s): {}", files.len(), files.join(", "))]
    Conflicted { files: Vec<String> },

    #[error("batch {id} suspended at item {index}; resume with: convoy resume {id}")]
    Suspended { id: String, index: usize },

    #[error("{0}")]
    Other(String),
}

impl ExitError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) | Self::InvalidInput(_) | Self::ItemTooLong { .. } => ExitCode::from(2),
            Self::ToolNotFound { .. } => ExitCode::from(3),
            Self::Conflicted { .. } => ExitCode::from(4),
            Self::Suspended { .. } => ExitCode::from(5),
            Self::ToolFailed { .. }
            | Self::Timeout { .. }
            | Self::WorktreeCreation(_)
            | Self::CheckpointNotFound { .. }
            | Self::CheckpointCorrupt { .. }
            | Self::Other(_) => ExitCode::from(1),
        }
    }
}

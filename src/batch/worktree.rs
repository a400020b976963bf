//! Worktree manager: one isolated `git worktree` per batch job.
//!
//! Creation is correctness-critical (no batch runs without isolation);
//! removal is best-effort cleanup and only ever logs on failure.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ExitError;
use crate::subprocess::Tool;

/// An isolated workspace branched from a base revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worktree {
    pub path: PathBuf,
    pub branch: String,
}

pub struct WorktreeManager {
    repo_root: PathBuf,
    worktrees_dir: PathBuf,
}

impl WorktreeManager {
    pub fn new(repo_root: &Path, state_dir: &str) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
            worktrees_dir: repo_root.join(state_dir).join("worktrees"),
        }
    }

    /// Create a worktree for a batch, branched from `base_revision`.
    ///
    /// The path is keyed by the batch id (which carries a random suffix), so
    /// two live jobs never share a path. An existing path is a hard error,
    /// not something to silently reuse.
    pub fn create(&self, batch_id: &str, base_revision: &str) -> anyhow::Result<Worktree> {
        std::fs::create_dir_all(&self.worktrees_dir).map_err(|e| {
            ExitError::WorktreeCreation(format!(
                "creating {}: {e}",
                self.worktrees_dir.display()
            ))
        })?;

        let path = self.worktrees_dir.join(batch_id);
        if path.exists() {
            return Err(ExitError::WorktreeCreation(format!(
                "worktree path {} already exists",
                path.display()
            ))
            .into());
        }

        let branch = format!("convoy/{batch_id}");
        let output = Tool::new("git")
            .args(&["worktree", "add", "-b", &branch])
            .arg(&path.to_string_lossy())
            .arg(base_revision)
            .current_dir(&self.repo_root)
            .run()?;

        if !output.success() {
            return Err(ExitError::WorktreeCreation(format!(
                "git worktree add failed (exit {}): {}",
                output.exit_code,
                output.stderr.trim()
            ))
            .into());
        }

        tracing::info!(batch = batch_id, path = %path.display(), %branch, "worktree created");
        Ok(Worktree { path, branch })
    }

    /// Remove a worktree and its branch. Idempotent; never aborts a batch
    /// that otherwise succeeded; failures are logged and swallowed.
    pub fn remove(&self, worktree: &Worktree) {
        let result = Tool::new("git")
            .args(&["worktree", "remove", "--force"])
            .arg(&worktree.path.to_string_lossy())
            .current_dir(&self.repo_root)
            .run();
        match result {
            Ok(output) if output.success() => {
                tracing::info!(path = %worktree.path.display(), "worktree removed");
            }
            Ok(output) => {
                tracing::warn!(
                    path = %worktree.path.display(),
                    stderr = output.stderr.trim(),
                    "git worktree remove failed; leaving for manual cleanup"
                );
            }
            Err(e) => {
                tracing::warn!(path = %worktree.path.display(), error = %e, "worktree removal error");
            }
        }

        // The branch is only deleted after its work has been merged, so -D
        // cannot lose anything here.
        let result = Tool::new("git")
            .args(&["branch", "-D", &worktree.branch])
            .current_dir(&self.repo_root)
            .run();
        match result {
            Ok(output) if !output.success() => {
                tracing::debug!(
                    branch = worktree.branch,
                    stderr = output.stderr.trim(),
                    "branch delete skipped"
                );
            }
            Err(e) => tracing::warn!(branch = worktree.branch, error = %e, "branch delete error"),
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subprocess::Tool;

    fn init_repo(dir: &Path) {
        for args in [
            vec!["init", "-b", "main"],
            vec!["config", "user.email", "test@example.com"],
            vec!["config", "user.name", "Test"],
        ] {
            let args: Vec<&str> = args;
            assert!(Tool::new("git").args(&args).current_dir(dir).run().unwrap().success());
        }
        std::fs::write(dir.join("README.md"), "hello\n").unwrap();
        assert!(Tool::new("git").args(&["add", "-A"]).current_dir(dir).run().unwrap().success());
        assert!(
            Tool::new("git")
                .args(&["commit", "-m", "init"])
                .current_dir(dir)
                .run()
                .unwrap()
                .success()
        );
    }

    #[test]
    fn create_and_remove_worktree() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let manager = WorktreeManager::new(dir.path(), ".convoy");

        let wt = manager.create("b-1", "main").unwrap();
        assert!(wt.path.is_dir());
        assert!(wt.path.join("README.md").exists());
        assert_eq!(wt.branch, "convoy/b-1");

        manager.remove(&wt);
        assert!(!wt.path.exists());
        // removal is idempotent
        manager.remove(&wt);
    }

    #[test]
    fn two_jobs_never_share_a_path() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let manager = WorktreeManager::new(dir.path(), ".convoy");

        let a = manager.create("b-1", "main").unwrap();
        let b = manager.create("b-2", "main").unwrap();
        assert_ne!(a.path, b.path);

        // reusing a live id fails instead of clobbering
        let err = manager.create("b-1", "main").unwrap_err();
        let exit_err = err.downcast_ref::<ExitError>().unwrap();
        assert!(matches!(exit_err, ExitError::WorktreeCreation(_)));
    }

    #[test]
    fn bad_base_revision_fails_creation() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let manager = WorktreeManager::new(dir.path(), ".convoy");
        let err = manager.create("b-1", "no-such-rev").unwrap_err();
        let exit_err = err.downcast_ref::<ExitError>().unwrap();
        assert!(matches!(exit_err, ExitError::WorktreeCreation(_)));
    }
}

//! Finalizer: turn accumulated worktree changes into one durable change on
//! the target branch, then release or preserve the worktree.
//!
//! Policy: never force-merge, never discard conflicting work. A conflicted
//! merge is aborted in the primary tree and the worktree and checkpoint are
//! left intact for manual resolution.

use std::path::Path;

use crate::config::Config;
use crate::error::ExitError;
use crate::subprocess::Tool;

use super::checkpoint::CheckpointStore;
use super::worktree::{Worktree, WorktreeManager};
use super::{BatchJob, JobStatus};

/// Result of the merge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult {
    Merged { commit: String },
    Conflicted { files: Vec<String> },
}

pub struct Finalizer<'a> {
    repo_root: &'a Path,
    config: &'a Config,
    store: &'a CheckpointStore,
    manager: &'a WorktreeManager,
}

impl<'a> Finalizer<'a> {
    pub fn new(
        repo_root: &'a Path,
        config: &'a Config,
        store: &'a CheckpointStore,
        manager: &'a WorktreeManager,
    ) -> Self {
        Self {
            repo_root,
            config,
            store,
            manager,
        }
    }

    /// Commit, merge, and clean up (or preserve on conflict).
    ///
    /// Errors before the merge completes leave the checkpoint in place, so
    /// `convoy resume <id>` retries finalization without re-running items.
    pub fn finalize(&self, job: &mut BatchJob) -> anyhow::Result<MergeResult> {
        anyhow::ensure!(
            job.is_drained(),
            "batch {} still has pending items at index {}",
            job.id,
            job.current_index
        );

        self.commit_worktree(job)?;
        self.ensure_on_target_branch()?;

        match self.merge(job)? {
            MergeResult::Merged { commit } => {
                if self.config.project.push {
                    self.push()?;
                }
                self.manager.remove(&Worktree {
                    path: job.worktree_path.clone(),
                    branch: job.branch.clone(),
                });
                self.store.delete(&job.id)?;
                job.status = JobStatus::Completed;
                tracing::info!(batch = %job.id, %commit, "batch merged");
                Ok(MergeResult::Merged { commit })
            }
            MergeResult::Conflicted { files } => {
                // Deliberate halt state: worktree and checkpoint stay on disk.
                job.status = JobStatus::CompletedWithConflicts;
                self.store.save(job)?;
                tracing::warn!(
                    batch = %job.id,
                    conflicts = files.len(),
                    "merge conflicted; worktree preserved"
                );
                Ok(MergeResult::Conflicted { files })
            }
        }
    }

    /// Commit everything left in the worktree. No changes is an empty
    /// finalize, not an error.
    fn commit_worktree(&self, job: &BatchJob) -> anyhow::Result<()> {
        let status = Tool::new("git")
            .args(&["status", "--porcelain"])
            .current_dir(&job.worktree_path)
            .run_ok()?;
        if status.stdout.trim().is_empty() {
            tracing::info!(batch = %job.id, "nothing to commit in worktree");
            return Ok(());
        }

        Tool::new("git")
            .args(&["add", "-A"])
            .current_dir(&job.worktree_path)
            .run_ok()?;

        let counts = job.counts();
        let message = format!(
            "convoy {}: {} item(s), {} succeeded, {} failed",
            job.id,
            job.items.len(),
            counts.succeeded,
            counts.failed
        );
        Tool::new("git")
            .args(&["commit", "-m", &message])
            .current_dir(&job.worktree_path)
            .run_ok()?;
        Ok(())
    }

    /// The merge lands on whatever the primary tree has checked out, so
    /// refuse to proceed unless that is the configured target branch.
    fn ensure_on_target_branch(&self) -> anyhow::Result<()> {
        let head = Tool::new("git")
            .args(&["symbolic-ref", "--short", "HEAD"])
            .current_dir(self.repo_root)
            .run_ok()?;
        let current = head.stdout.trim().to_string();
        let target = &self.config.project.target_branch;
        if &current == target {
            Ok(())
        } else {
            Err(ExitError::Other(format!(
                "primary tree is on '{current}', expected '{target}'; \
                 check out {target} and resume the batch to finalize"
            ))
            .into())
        }
    }

    /// Non-destructive merge of the batch branch into the target branch.
    fn merge(&self, job: &BatchJob) -> anyhow::Result<MergeResult> {
        let message = format!("merge convoy batch {}", job.id);
        let output = Tool::new("git")
            .args(&["merge", "--no-ff", &job.branch, "-m", &message])
            .current_dir(self.repo_root)
            .run()?;

        if output.success() {
            let head = Tool::new("git")
                .args(&["rev-parse", "HEAD"])
                .current_dir(self.repo_root)
                .run_ok()?;
            return Ok(MergeResult::Merged {
                commit: head.stdout.trim().to_string(),
            });
        }

        let files = self.conflicted_files()?;
        // Restore the primary tree; the batch branch keeps the work.
        let abort = Tool::new("git")
            .args(&["merge", "--abort"])
            .current_dir(self.repo_root)
            .run()?;
        if !abort.success() {
            tracing::warn!(stderr = abort.stderr.trim(), "git merge --abort failed");
        }

        if files.is_empty() {
            // Merge failed for a reason other than content conflicts.
            return Err(ExitError::ToolFailed {
                tool: "git merge".to_string(),
                code: output.exit_code,
                message: output.stderr.trim().to_string(),
            }
            .into());
        }
        Ok(MergeResult::Conflicted { files })
    }

    fn conflicted_files(&self) -> anyhow::Result<Vec<String>> {
        let output = Tool::new("git")
            .args(&["diff", "--name-only", "--diff-filter=U"])
            .current_dir(self.repo_root)
            .run()?;
        Ok(output
            .stdout
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    fn push(&self) -> anyhow::Result<()> {
        Tool::new("git")
            .args(&["push", "origin", &self.config.project.target_branch])
            .current_dir(self.repo_root)
            .run_ok()?;
        Ok(())
    }
}

/// Manual-resolution steps surfaced when a merge conflicts.
pub fn conflict_guidance(job: &BatchJob, files: &[String], target_branch: &str) -> String {
    let path = &job.worktree_path;
    format!(
        "Merge of branch {branch} hit conflicts in: {files}\n\
         The worktree and checkpoint are preserved. To resolve manually:\n\
         \n\
         1. Merge the target branch into the batch branch and fix the markers:\n\
            cd {path}\n\
            git merge {target}\n\
            # edit the conflicted files, then: git add -A && git commit\n\
         \n\
         2. Re-run finalization:\n\
            convoy resume {id}\n\
         \n\
         Or discard the batch branch entirely (the work is lost):\n\
            git worktree remove --force {path} && git branch -D {branch}",
        branch = job.branch,
        files = files.join(", "),
        path = path.display(),
        target = target_branch,
        id = job.id,
    )
}

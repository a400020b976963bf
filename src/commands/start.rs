//! `convoy start`: read a feature queue, create the isolated worktree, and
//! run the batch to finalization.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use crate::batch::source::{items_from_issues, parse_feature_list};
use crate::batch::summary::OutputFormat;
use crate::batch::tracker::GhTracker;
use crate::batch::{BatchJob, WorkItem, generate_batch_id};
use crate::error::ExitError;

use super::{RunContext, drive, pick_format};

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Features file: one description per line (# comments and blanks ignored)
    pub features_file: Option<PathBuf>,
    /// Issue ids to batch instead of a features file
    #[arg(long, value_delimiter = ',')]
    pub issues: Vec<String>,
    /// Revision to branch the batch worktree from (default: the target branch)
    #[arg(long)]
    pub base: Option<String>,
    /// Project root directory
    #[arg(long)]
    pub project_root: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

impl StartArgs {
    pub fn execute(self) -> anyhow::Result<()> {
        let format = pick_format(self.format);
        let ctx = RunContext::open(self.project_root.clone())?;

        let items = self.read_items(&ctx)?;
        ctx.config.executor_command()?;

        let id = generate_batch_id();
        let base = self
            .base
            .clone()
            .or_else(|| ctx.config.project.base_revision.clone())
            .unwrap_or_else(|| ctx.config.project.target_branch.clone());

        // No partial batch without isolation: a worktree failure means the
        // job fails before its first checkpoint.
        let worktree = ctx.manager.create(&id, &base)?;

        let job = BatchJob::new(&id, items, worktree.path, worktree.branch);
        ctx.store.save(&job)?;
        tracing::info!(batch = %id, items = job.items.len(), %base, "batch started");

        drive(&ctx, job, format)
    }

    fn read_items(&self, ctx: &RunContext) -> anyhow::Result<Vec<WorkItem>> {
        let cap = ctx.config.batch.max_item_length;
        match (&self.features_file, self.issues.is_empty()) {
            (Some(_), false) => Err(ExitError::InvalidInput(
                "pass either a features file or --issues, not both".to_string(),
            )
            .into()),
            (Some(path), true) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                parse_feature_list(&raw, cap)
            }
            (None, false) => items_from_issues(&self.issues, &GhTracker, cap),
            (None, true) => Err(ExitError::InvalidInput(
                "provide a features file or --issues".to_string(),
            )
            .into()),
        }
    }
}

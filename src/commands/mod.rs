//! CLI command implementations.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Context;

use crate::batch::checkpoint::CheckpointStore;
use crate::batch::executor::CommandExecutor;
use crate::batch::finalize::{Finalizer, MergeResult, conflict_guidance};
use crate::batch::orchestrator::Orchestrator;
use crate::batch::summary::{FinalizationReport, OutputFormat, RunSummary, render};
use crate::batch::worktree::WorktreeManager;
use crate::batch::{BatchJob, JobStatus};
use crate::config::Config;
use crate::error::ExitError;

pub mod resume;
pub mod schema;
pub mod start;
pub mod status;

/// Everything a batch command needs: project root, config, and the stores
/// rooted under it.
pub(crate) struct RunContext {
    pub root: PathBuf,
    pub config: Config,
    pub store: CheckpointStore,
    pub manager: WorktreeManager,
}

impl RunContext {
    pub fn open(project_root: Option<PathBuf>) -> anyhow::Result<Self> {
        let root = match project_root {
            Some(p) => p,
            None => std::env::current_dir().context("determining project root")?,
        };
        let config = Config::load_or_default(&root)?;
        let store = CheckpointStore::open(&root, &config.batch.state_dir)?;
        let manager = WorktreeManager::new(&root, &config.batch.state_dir);
        Ok(Self {
            root,
            config,
            store,
            manager,
        })
    }
}

/// Pretty on a TTY, text otherwise, unless the user picked a format.
pub(crate) fn pick_format(arg: Option<OutputFormat>) -> OutputFormat {
    arg.unwrap_or_else(|| {
        if std::io::stdout().is_terminal() {
            OutputFormat::Pretty
        } else {
            OutputFormat::Text
        }
    })
}

/// Drive a running job to the end: drain the queue, then finalize.
///
/// Shared by `start` and `resume`; resume is just this function on a loaded
/// checkpoint. Prints the run summary and maps the terminal status to the
/// process exit code via `ExitError`.
pub(crate) fn drive(ctx: &RunContext, mut job: BatchJob, format: OutputFormat) -> anyhow::Result<()> {
    let executor = CommandExecutor::from_config(&ctx.config)?;
    let orchestrator = Orchestrator::new(
        &executor,
        &ctx.store,
        ctx.config.batch.retry_attempts,
    );
    orchestrator.install_interrupt_handler()?;

    let status = orchestrator.run(&mut job)?;
    if status == JobStatus::Suspended {
        let summary = RunSummary::from_job(
            &job,
            FinalizationReport::NotFinalized {
                reason: format!("suspended; resume with: convoy resume {}", job.id),
            },
        );
        println!("{}", render(&summary, format));
        return Err(ExitError::Suspended {
            id: job.id,
            index: job.current_index,
        }
        .into());
    }

    let finalizer = Finalizer::new(&ctx.root, &ctx.config, &ctx.store, &ctx.manager);
    match finalizer.finalize(&mut job)? {
        MergeResult::Merged { commit } => {
            let summary = RunSummary::from_job(&job, FinalizationReport::Merged { commit });
            println!("{}", render(&summary, format));
            Ok(())
        }
        MergeResult::Conflicted { files } => {
            let summary = RunSummary::from_job(
                &job,
                FinalizationReport::Conflicted {
                    files: files.clone(),
                },
            );
            println!("{}", render(&summary, format));
            eprintln!(
                "{}",
                conflict_guidance(&job, &files, &ctx.config.project.target_branch)
            );
            Err(ExitError::Conflicted { files }.into())
        }
    }
}

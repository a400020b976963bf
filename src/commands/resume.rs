//! `convoy resume`: pick up a checkpointed batch where it left off.
//!
//! Items before the checkpoint cursor are never replayed. A batch whose
//! queue already drained (e.g. a conflicted merge resolved by hand, or a
//! finalization that errored on the wrong branch) goes straight to
//! finalization.

use std::path::PathBuf;

use clap::Args;

use crate::batch::JobStatus;
use crate::batch::summary::OutputFormat;

use super::{RunContext, drive, pick_format};

#[derive(Debug, Args)]
pub struct ResumeArgs {
    /// Batch id to resume (see `convoy status`)
    pub batch_id: String,
    /// Project root directory
    #[arg(long)]
    pub project_root: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

impl ResumeArgs {
    pub fn execute(self) -> anyhow::Result<()> {
        let format = pick_format(self.format);
        let ctx = RunContext::open(self.project_root)?;

        let mut job = ctx.store.load(&self.batch_id)?;
        tracing::info!(
            batch = %job.id,
            index = job.current_index,
            total = job.items.len(),
            status = ?job.status,
            "resuming batch"
        );

        // Suspended → Running is the legal resume transition; a conflicted
        // or mid-finalize batch is already drained and only re-finalizes.
        job.status = JobStatus::Running;
        ctx.store.save(&job)?;

        drive(&ctx, job, format)
    }
}

//! `convoy status`: inspect checkpoints without touching them.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::batch::summary::{FinalizationReport, OutputFormat, RunSummary, render};

use super::{RunContext, pick_format};

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Batch id to show in detail; omit to list all checkpoints
    pub batch_id: Option<String>,
    /// Project root directory
    #[arg(long)]
    pub project_root: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Serialize)]
struct BatchLine {
    id: String,
    status: String,
    progress: String,
}

impl StatusArgs {
    pub fn execute(self) -> anyhow::Result<()> {
        let format = pick_format(self.format);
        let ctx = RunContext::open(self.project_root)?;

        if let Some(ref id) = self.batch_id {
            let job = ctx.store.load(id)?;
            let summary = RunSummary::from_job(
                &job,
                FinalizationReport::NotFinalized {
                    reason: "checkpoint on disk; not yet finalized".to_string(),
                },
            );
            println!("{}", render(&summary, format));
            return Ok(());
        }

        let mut lines = Vec::new();
        for id in ctx.store.list()? {
            match ctx.store.load(&id) {
                Ok(job) => lines.push(BatchLine {
                    id,
                    status: format!("{:?}", job.status),
                    progress: format!("{}/{}", job.current_index, job.items.len()),
                }),
                Err(e) => lines.push(BatchLine {
                    id,
                    status: "corrupt".to_string(),
                    progress: format!("{e:#}"),
                }),
            }
        }

        match format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&lines)
                        .unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
                );
            }
            OutputFormat::Text | OutputFormat::Pretty => {
                if lines.is_empty() {
                    println!("no checkpoints");
                } else {
                    for line in &lines {
                        println!("{}  {}  {}", line.id, line.status, line.progress);
                    }
                }
            }
        }
        Ok(())
    }
}

//! End-of-run summary rendering.
//!
//! - Text: concise line-per-item output for scripts and agents
//! - JSON: structured output with all details
//! - Pretty: colored output with symbols for humans

use serde::Serialize;

use super::{BatchJob, FailureClass, JobStatus, Outcome};

/// Output format for summaries and status reports.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Text,
    Json,
}

/// How the run ended up on the target branch.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FinalizationReport {
    Merged { commit: String },
    Conflicted { files: Vec<String> },
    NotFinalized { reason: String },
}

#[derive(Debug, Serialize)]
struct ItemReport {
    description: String,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempts: Option<u32>,
}

/// Everything a run reports when it stops: per-item outcomes, tallies, and
/// the finalization result.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub batch_id: String,
    pub status: JobStatus,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub security_flagged: usize,
    pub pending: usize,
    items: Vec<ItemReport>,
    pub finalization: FinalizationReport,
}

impl RunSummary {
    pub fn from_job(job: &BatchJob, finalization: FinalizationReport) -> Self {
        let counts = job.counts();
        let items = job
            .items
            .iter()
            .map(|item| match &item.outcome {
                Outcome::Pending => ItemReport {
                    description: item.description.clone(),
                    outcome: "pending",
                    class: None,
                    reason: None,
                    attempts: None,
                },
                Outcome::Succeeded => ItemReport {
                    description: item.description.clone(),
                    outcome: "succeeded",
                    class: None,
                    reason: None,
                    attempts: None,
                },
                Outcome::Failed {
                    class,
                    reason,
                    attempts,
                } => ItemReport {
                    description: item.description.clone(),
                    outcome: "failed",
                    class: Some(class.label()),
                    reason: Some(reason.clone()),
                    attempts: Some(*attempts),
                },
            })
            .collect();

        Self {
            batch_id: job.id.clone(),
            status: job.status,
            total: job.items.len(),
            succeeded: counts.succeeded,
            failed: counts.failed,
            security_flagged: counts.security_flagged,
            pending: counts.pending,
            items,
            finalization,
        }
    }
}

/// Render a summary in the requested format.
pub fn render(summary: &RunSummary, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => render_text(summary),
        OutputFormat::Json => render_json(summary),
        OutputFormat::Pretty => render_pretty(summary),
    }
}

fn item_status_line(report: &ItemReport) -> String {
    match report.outcome {
        "failed" => format!(
            "FAILED ({}, {} attempt(s)): {}",
            report.class.unwrap_or("unknown"),
            report.attempts.unwrap_or(0),
            report.reason.as_deref().unwrap_or("")
        ),
        "pending" => "pending".to_string(),
        _ => "ok".to_string(),
    }
}

fn finalization_line(finalization: &FinalizationReport) -> String {
    match finalization {
        FinalizationReport::Merged { commit } => format!("merged as {commit}"),
        FinalizationReport::Conflicted { files } => {
            format!("merge CONFLICTED in: {}", files.join(", "))
        }
        FinalizationReport::NotFinalized { reason } => format!("not finalized: {reason}"),
    }
}

fn render_text(summary: &RunSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("batch {}  {:?}\n", summary.batch_id, summary.status));
    for (idx, item) in summary.items.iter().enumerate() {
        out.push_str(&format!(
            "item {}/{}  {}  {}\n",
            idx + 1,
            summary.total,
            item.description,
            item_status_line(item)
        ));
    }
    out.push_str(&format!(
        "total {}  succeeded {}  failed {}",
        summary.total, summary.succeeded, summary.failed
    ));
    if summary.security_flagged > 0 {
        out.push_str(&format!("  security-flagged {}", summary.security_flagged));
    }
    if summary.pending > 0 {
        out.push_str(&format!("  pending {}", summary.pending));
    }
    out.push('\n');
    out.push_str(&finalization_line(&summary.finalization));
    out.push('\n');
    out
}

fn render_json(summary: &RunSummary) -> String {
    serde_json::to_string_pretty(summary).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

fn render_pretty(summary: &RunSummary) -> String {
    let green = "\x1b[32m";
    let red = "\x1b[31m";
    let yellow = "\x1b[33m";
    let gray = "\x1b[90m";
    let reset = "\x1b[0m";

    let mut out = String::new();
    out.push_str(&format!("batch {}  {:?}\n", summary.batch_id, summary.status));
    for (idx, item) in summary.items.iter().enumerate() {
        let (symbol, color) = match item.outcome {
            "succeeded" => ("✓", green),
            "failed" => ("✗", red),
            _ => ("·", gray),
        };
        out.push_str(&format!(
            "item {}/{}  {}  {color}{symbol}{reset}",
            idx + 1,
            summary.total,
            item.description,
        ));
        if item.outcome == "failed" {
            out.push_str(&format!("  {gray}{}{reset}", item_status_line(item)));
        }
        out.push('\n');
    }
    out.push_str(&format!(
        "{green}{} succeeded{reset}  {red}{} failed{reset}",
        summary.succeeded, summary.failed
    ));
    if summary.security_flagged > 0 {
        out.push_str(&format!(
            "  {yellow}{} security-flagged{reset}",
            summary.security_flagged
        ));
    }
    out.push('\n');
    out.push_str(&finalization_line(&summary.finalization));
    out.push('\n');
    out
}

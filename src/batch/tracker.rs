//! Issue-tracker collaborator: fetch issue titles for batch-from-issues mode.

use serde::Deserialize;

use crate::subprocess::Tool;

/// Narrow seam over the tracker so the reader can be tested without `gh`.
pub trait IssueTracker {
    fn fetch_title(&self, id: &str) -> anyhow::Result<String>;
}

/// GitHub tracker backed by the `gh` CLI.
pub struct GhTracker;

#[derive(Debug, Deserialize)]
struct IssueView {
    title: String,
}

impl IssueTracker for GhTracker {
    fn fetch_title(&self, id: &str) -> anyhow::Result<String> {
        let output = Tool::new("gh")
            .args(&["issue", "view", id, "--json", "title"])
            .run_ok()?;
        parse_title(&output.stdout)
    }
}

/// Parse `gh issue view --json title` output.
fn parse_title(stdout: &str) -> anyhow::Result<String> {
    let view: IssueView = serde_json::from_str(stdout)
        .map_err(|e| anyhow::anyhow!("failed to parse gh issue output: {e}"))?;
    Ok(view.title)
}

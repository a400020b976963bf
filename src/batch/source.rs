//! Feature source reader: turns raw input into an ordered item queue.
//!
//! Two modes: a features file (one description per line) or a list of issue
//! ids resolved through the issue tracker. Both are read-only; no job
//! exists until the queue parses cleanly.

use crate::error::ExitError;

use super::tracker::IssueTracker;
use super::{FailureClass, WorkItem};

/// Parse a features file into an ordered queue.
///
/// Lines starting with `#` and blank lines are ignored. Exact-text duplicates
/// are dropped, keeping first-occurrence order. Fails when the result is
/// empty or any item exceeds the length cap.
pub fn parse_feature_list(raw: &str, max_len: usize) -> anyhow::Result<Vec<WorkItem>> {
    let mut items: Vec<WorkItem> = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if items.iter().any(|item| item.description == trimmed) {
            continue;
        }
        if trimmed.chars().count() > max_len {
            return Err(ExitError::ItemTooLong {
                index: items.len(),
                len: trimmed.chars().count(),
                cap: max_len,
            }
            .into());
        }
        items.push(WorkItem::new(trimmed));
    }

    if items.is_empty() {
        return Err(ExitError::InvalidInput(
            "no work items found (only comments and blank lines)".to_string(),
        )
        .into());
    }

    Ok(items)
}

/// Build a queue from issue ids, fetching each title through the tracker.
///
/// A failed title fetch is a permanent failure for that single item, not
/// batch-fatal: the item is queued pre-failed and the orchestrator records
/// it without invoking the executor.
pub fn items_from_issues(
    ids: &[String],
    tracker: &dyn IssueTracker,
    max_len: usize,
) -> anyhow::Result<Vec<WorkItem>> {
    let mut items: Vec<WorkItem> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();

    for id in ids {
        let id = id.trim();
        if id.is_empty() || seen.contains(&id) {
            continue;
        }
        seen.push(id);

        match tracker.fetch_title(id) {
            Ok(title) => {
                let description = format!("#{id}: {title}");
                if description.chars().count() > max_len {
                    return Err(ExitError::ItemTooLong {
                        index: items.len(),
                        len: description.chars().count(),
                        cap: max_len,
                    }
                    .into());
                }
                items.push(WorkItem::new(description));
            }
            Err(e) => {
                tracing::warn!(issue = id, error = %e, "failed to fetch issue title");
                items.push(WorkItem::failed(
                    format!("#{id}"),
                    FailureClass::Permanent,
                    format!("issue title fetch failed: {e:#}"),
                ));
            }
        }
    }

    if items.is_empty() {
        return Err(ExitError::InvalidInput("no issue ids given".to_string()).into());
    }

    Ok(items)
}

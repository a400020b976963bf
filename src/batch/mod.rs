//! Batch data model: jobs, work items, outcomes.
//!
//! A `BatchJob` is one run of the multi-item pipeline, from queue creation
//! through finalization. The struct is the checkpoint: the store serializes
//! it whole, so everything needed to resume lives here.

use std::path::PathBuf;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub mod checkpoint;
pub mod executor;
pub mod finalize;
pub mod orchestrator;
pub mod source;
pub mod summary;
pub mod tracker;
pub mod worktree;

/// The three failure classes an item outcome may carry.
///
/// The boundary between them is asserted by the external executor (via its
/// exit code); convoy only applies retry policy to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureClass {
    /// Network/timeout class, retried up to the configured bound.
    Transient,
    /// Validation/syntax class, recorded immediately, never retried.
    Permanent,
    /// Recorded with a distinct flag, never retried, batch continues.
    SecurityCritical,
}

impl FailureClass {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::SecurityCritical => "security-critical",
        }
    }
}

/// Outcome of one work item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Outcome {
    #[default]
    Pending,
    Succeeded,
    Failed {
        class: FailureClass,
        reason: String,
        attempts: u32,
    },
}

impl Outcome {
    /// Terminal outcomes are checkpointed; pending items are still in the queue.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One unit of work in a batch queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub description: String,
    #[serde(default)]
    pub outcome: Outcome,
}

impl WorkItem {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            outcome: Outcome::Pending,
        }
    }

    /// An item that failed before the batch ever ran (e.g. its issue title
    /// could not be fetched). The orchestrator records it without invoking
    /// the executor.
    pub fn failed(description: impl Into<String>, class: FailureClass, reason: String) -> Self {
        Self {
            description: description.into(),
            outcome: Outcome::Failed {
                class,
                reason,
                attempts: 0,
            },
        }
    }
}

/// Lifecycle status of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Suspended,
    Completed,
    CompletedWithConflicts,
    Failed,
}

/// Per-class tallies over a job's items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub security_flagged: usize,
    pub pending: usize,
}

/// One invocation of batch processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: String,
    pub worktree_path: PathBuf,
    pub branch: String,
    /// Cursor into `items`: the next item to process. Monotonically
    /// non-decreasing; equal to `items.len()` once the queue has drained.
    pub current_index: usize,
    pub status: JobStatus,
    pub items: Vec<WorkItem>,
}

impl BatchJob {
    pub fn new(
        id: impl Into<String>,
        items: Vec<WorkItem>,
        worktree_path: PathBuf,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            worktree_path,
            branch: branch.into(),
            current_index: 0,
            status: JobStatus::Running,
            items,
        }
    }

    /// True once every item has a recorded outcome.
    pub fn is_drained(&self) -> bool {
        self.current_index >= self.items.len()
    }

    /// The item at the cursor, if the queue has not drained.
    pub fn current(&self) -> Option<&WorkItem> {
        self.items.get(self.current_index)
    }

    /// Record a terminal outcome for the current item and advance the cursor.
    pub fn record(&mut self, outcome: Outcome) -> anyhow::Result<()> {
        anyhow::ensure!(outcome.is_terminal(), "cannot record a pending outcome");
        let index = self.current_index;
        let Some(item) = self.items.get_mut(index) else {
            anyhow::bail!("batch {} already drained at index {index}", self.id);
        };
        item.outcome = outcome;
        self.current_index = index + 1;
        Ok(())
    }

    /// Tally item outcomes.
    pub fn counts(&self) -> ItemCounts {
        let mut counts = ItemCounts::default();
        for item in &self.items {
            match &item.outcome {
                Outcome::Pending => counts.pending += 1,
                Outcome::Succeeded => counts.succeeded += 1,
                Outcome::Failed { class, .. } => {
                    counts.failed += 1;
                    if *class == FailureClass::SecurityCritical {
                        counts.security_flagged += 1;
                    }
                }
            }
        }
        counts
    }
}

/// Generate a batch id: UTC timestamp plus a random hex suffix so two
/// batches started in the same second never collide.
pub fn generate_batch_id() -> String {
    let ts = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let suffix: u16 = rand::rng().random();
    format!("{ts}-{suffix:04x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with(descriptions: &[&str]) -> BatchJob {
        BatchJob::new(
            "b-test",
            descriptions.iter().map(|d| WorkItem::new(*d)).collect(),
            PathBuf::from("/tmp/wt"),
            "convoy/b-test",
        )
    }

    #[test]
    fn new_job_starts_at_zero_running() {
        let job = job_with(&["Add X", "Add Y"]);
        assert_eq!(job.current_index, 0);
        assert_eq!(job.status, JobStatus::Running);
        assert!(!job.is_drained());
        assert_eq!(job.current().unwrap().description, "Add X");
    }

    #[test]
    fn record_advances_cursor_monotonically() {
        let mut job = job_with(&["Add X", "Add Y"]);
        job.record(Outcome::Succeeded).unwrap();
        assert_eq!(job.current_index, 1);
        job.record(Outcome::Failed {
            class: FailureClass::Permanent,
            reason: "syntax".to_string(),
            attempts: 1,
        })
        .unwrap();
        assert_eq!(job.current_index, 2);
        assert!(job.is_drained());
        assert!(job.current().is_none());
    }

    #[test]
    fn record_rejects_pending_outcome() {
        let mut job = job_with(&["Add X"]);
        assert!(job.record(Outcome::Pending).is_err());
        assert_eq!(job.current_index, 0);
    }

    #[test]
    fn record_past_end_fails() {
        let mut job = job_with(&["Add X"]);
        job.record(Outcome::Succeeded).unwrap();
        assert!(job.record(Outcome::Succeeded).is_err());
        // cursor never moves backwards or past the end
        assert_eq!(job.current_index, 1);
    }

    #[test]
    fn counts_cover_every_item() {
        let mut job = job_with(&["a", "b", "c", "d"]);
        job.record(Outcome::Succeeded).unwrap();
        job.record(Outcome::Failed {
            class: FailureClass::Transient,
            reason: "net".to_string(),
            attempts: 3,
        })
        .unwrap();
        job.record(Outcome::Failed {
            class: FailureClass::SecurityCritical,
            reason: "blocked".to_string(),
            attempts: 1,
        })
        .unwrap();

        let counts = job.counts();
        assert_eq!(counts.succeeded, 1);
        assert_eq!(counts.failed, 2);
        assert_eq!(counts.security_flagged, 1);
        assert_eq!(counts.pending, 1);
        assert_eq!(
            counts.succeeded + counts.failed + counts.pending,
            job.items.len()
        );
    }

    #[test]
    fn batch_ids_are_unique_and_timestampish() {
        let a = generate_batch_id();
        let b = generate_batch_id();
        assert_ne!(a, b);
        // 20260830-120000-1a2b
        assert_eq!(a.len(), "20260830-120000-0000".len());
        assert!(a[..8].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn checkpoint_roundtrip_preserves_outcomes() {
        let mut job = job_with(&["Add X", "Add Y"]);
        job.record(Outcome::Failed {
            class: FailureClass::SecurityCritical,
            reason: "scan".to_string(),
            attempts: 1,
        })
        .unwrap();
        job.status = JobStatus::Suspended;

        let json = serde_json::to_string(&job).unwrap();
        let loaded: BatchJob = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.current_index, 1);
        assert_eq!(loaded.status, JobStatus::Suspended);
        assert_eq!(loaded.items, job.items);
    }
}

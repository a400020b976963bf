//! The batch state machine: pulls items off the queue, delegates each to the
//! executor, records outcomes, and checkpoints after every item.
//!
//! Items are strictly sequential: each may mutate shared worktree state, so
//! there is no parallelism and no reordering on retry. Cancellation is only
//! honored between items, preserving the checkpoint-at-item-boundaries
//! invariant.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::checkpoint::CheckpointStore;
use super::executor::{ExecOutcome, ItemExecutor};
use super::{BatchJob, FailureClass, JobStatus, Outcome};

pub struct Orchestrator<'a> {
    executor: &'a dyn ItemExecutor,
    store: &'a CheckpointStore,
    max_attempts: u32,
    cancel: Arc<AtomicBool>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        executor: &'a dyn ItemExecutor,
        store: &'a CheckpointStore,
        max_attempts: u32,
    ) -> Self {
        Self {
            executor,
            store,
            max_attempts: max_attempts.max(1),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared cancellation flag. Setting it suspends the job at the next
    /// item boundary.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Register a SIGINT handler that requests suspension.
    pub fn install_interrupt_handler(&self) -> anyhow::Result<()> {
        let flag = self.cancel_flag();
        ctrlc::set_handler(move || {
            eprintln!("interrupt received, suspending after the current item");
            flag.store(true, Ordering::SeqCst);
        })
        .map_err(|e| anyhow::anyhow!("installing interrupt handler: {e}"))
    }

    /// Drive the loop from the job's cursor until the queue drains or a
    /// cancellation suspends it. Returns the job's status: `Running` means
    /// drained and eligible for finalization.
    pub fn run(&self, job: &mut BatchJob) -> anyhow::Result<JobStatus> {
        anyhow::ensure!(
            job.status == JobStatus::Running,
            "batch {} is {:?}, not runnable",
            job.id,
            job.status
        );

        while !job.is_drained() {
            if self.cancel.load(Ordering::SeqCst) {
                job.status = JobStatus::Suspended;
                self.store.save(job)?;
                tracing::info!(batch = %job.id, index = job.current_index, "batch suspended");
                return Ok(JobStatus::Suspended);
            }

            // Items that arrived pre-failed (e.g. issue fetch errors) are
            // recorded without invoking the executor.
            let (description, existing) = {
                let item = job
                    .current()
                    .ok_or_else(|| anyhow::anyhow!("queue drained mid-loop"))?;
                (item.description.clone(), item.outcome.clone())
            };

            let outcome = if existing.is_terminal() {
                tracing::info!(batch = %job.id, item = %description, "item pre-resolved, skipping");
                existing
            } else {
                self.run_item(job, &description)
            };

            job.record(outcome)?;
            self.store.save(job)?;
        }

        tracing::info!(batch = %job.id, total = job.items.len(), "queue drained");
        Ok(JobStatus::Running)
    }

    /// Execute one item with bounded retry for transient failures. The item
    /// keeps its queue position across retries.
    fn run_item(&self, job: &BatchJob, description: &str) -> Outcome {
        let (batch_id, index) = (job.id.as_str(), job.current_index);
        let mut attempts = 0;
        loop {
            attempts += 1;
            tracing::info!(
                batch = batch_id,
                item = index,
                attempt = attempts,
                "executing item"
            );

            match self.executor.execute(description, &job.worktree_path) {
                Ok(ExecOutcome::Succeeded) => return Outcome::Succeeded,
                Ok(ExecOutcome::Failed {
                    class: FailureClass::Transient,
                    reason,
                }) if attempts < self.max_attempts => {
                    tracing::warn!(
                        batch = batch_id,
                        item = index,
                        attempt = attempts,
                        %reason,
                        "transient failure, retrying"
                    );
                }
                Ok(ExecOutcome::Failed { class, reason }) => {
                    if class == FailureClass::SecurityCritical {
                        tracing::warn!(
                            batch = batch_id,
                            item = index,
                            %reason,
                            "security-critical failure recorded; batch continues"
                        );
                    }
                    return Outcome::Failed {
                        class,
                        reason,
                        attempts,
                    };
                }
                // An executor that cannot even spawn is recorded, not fatal:
                // one bad item never halts the batch.
                Err(e) => {
                    return Outcome::Failed {
                        class: FailureClass::Permanent,
                        reason: format!("executor error: {e:#}"),
                        attempts,
                    };
                }
            }
        }
    }
}

//! Durable batch progress: one JSON checkpoint per batch id.
//!
//! Writes are atomic (temp file + rename) so a crash mid-write never leaves
//! a half-written checkpoint. A checkpoint that fails to parse is surfaced
//! as corrupt rather than silently resumed from wrong state.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::error::ExitError;

use super::BatchJob;

/// Store rooted at `<project>/<state_dir>/checkpoints/`.
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Open (and create) the store under the project's state directory.
    ///
    /// The state directory gets a `.gitignore` excluding itself so worktrees
    /// and checkpoints never show up as untracked files in the primary tree.
    pub fn open(project_root: &Path, state_dir: &str) -> anyhow::Result<Self> {
        let state = project_root.join(state_dir);
        let dir = state.join("checkpoints");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating {}", dir.display()))?;

        let gitignore = state.join(".gitignore");
        if !gitignore.exists() {
            std::fs::write(&gitignore, "*\n")
                .with_context(|| format!("writing {}", gitignore.display()))?;
        }

        Ok(Self { dir })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Write the full snapshot atomically.
    pub fn save(&self, job: &BatchJob) -> anyhow::Result<()> {
        let path = self.path_for(&job.id);
        let tmp = self.dir.join(format!("{}.json.tmp", job.id));
        let json = serde_json::to_string_pretty(job).context("serializing checkpoint")?;
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("renaming checkpoint into place at {}", path.display()))?;
        tracing::debug!(batch = %job.id, index = job.current_index, "checkpoint saved");
        Ok(())
    }

    /// Load a batch by id.
    pub fn load(&self, id: &str) -> anyhow::Result<BatchJob> {
        let path = self.path_for(id);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExitError::CheckpointNotFound { id: id.to_string() }.into());
            }
            Err(e) => {
                return Err(
                    anyhow::Error::new(e).context(format!("reading {}", path.display()))
                );
            }
        };
        serde_json::from_str(&raw).map_err(|e| {
            ExitError::CheckpointCorrupt {
                id: id.to_string(),
                detail: e.to_string(),
            }
            .into()
        })
    }

    /// Remove a checkpoint. Idempotent.
    pub fn delete(&self, id: &str) -> anyhow::Result<()> {
        match std::fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context(format!("deleting checkpoint {id}"))),
        }
    }

    /// True if a checkpoint exists for this id.
    pub fn exists(&self, id: &str) -> bool {
        self.path_for(id).exists()
    }

    /// List checkpoint ids, newest first (ids sort by timestamp).
    pub fn list(&self) -> anyhow::Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("listing {}", self.dir.display()))?
        {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        ids.reverse();
        Ok(ids)
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use super::differ::InventoryDiffer;
use super::error::SyncError;
use super::names::FileName;
use super::progress::{ProgressStore, write_mirror};
use super::queue::PendingQueue;
use super::scheduler::{BatchScheduler, RunSummary};
use crate::prompt::ConfirmationPrompt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every local image already exists remotely.
    Synced,
    /// A progress record exists but lists nothing; the operator has to rescan.
    NothingPending,
    /// The operator declined; the pending record is kept for the next run.
    Declined { pending: usize },
    Completed(RunSummary),
}

/// State of the progress record as seen from outside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    NeverScanned,
    Empty,
    Pending(usize),
}

pub async fn record_status(store: &dyn ProgressStore) -> Result<RecordStatus, SyncError> {
    Ok(match store.load().await? {
        None => RecordStatus::NeverScanned,
        Some(pending) if pending.is_empty() => RecordStatus::Empty,
        Some(pending) => RecordStatus::Pending(pending.len()),
    })
}

pub struct SessionController {
    store: Arc<dyn ProgressStore>,
    differ: InventoryDiffer,
    scheduler: BatchScheduler,
    prompt: Arc<dyn ConfirmationPrompt>,
    mirror_path: Option<PathBuf>,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        differ: InventoryDiffer,
        scheduler: BatchScheduler,
        prompt: Arc<dyn ConfirmationPrompt>,
    ) -> Self {
        Self {
            store,
            differ,
            scheduler,
            prompt,
            mirror_path: None,
        }
    }

    pub fn with_mirror(mut self, path: impl Into<PathBuf>) -> Self {
        self.mirror_path = Some(path.into());
        self
    }

    /// Drops any saved progress and starts over from a fresh inventory diff.
    pub async fn rescan(&self) -> Result<SessionOutcome, SyncError> {
        self.store.clear().await?;
        tracing::info!("progress record cleared for rescan");
        self.run().await
    }

    pub async fn run(&self) -> Result<SessionOutcome, SyncError> {
        let mut queue = match self.store.load().await? {
            Some(saved) if saved.is_empty() => {
                tracing::info!("progress record exists but is empty; rescan needed");
                return Ok(SessionOutcome::NothingPending);
            }
            Some(saved) => {
                tracing::info!(pending = saved.len(), "resuming saved session");
                let saved_len = saved.len();
                let queue = PendingQueue::from_names(saved);
                if queue.len() != saved_len {
                    // Record must equal the queue before anything else happens.
                    self.store.save(&queue.to_vec()).await?;
                }
                queue
            }
            None => {
                let pending = self.differ.compute().await?;
                if pending.is_empty() {
                    tracing::info!("everything is already uploaded");
                    return Ok(SessionOutcome::Synced);
                }
                self.store.save(&pending).await?;
                self.emit_mirror(&pending).await;
                PendingQueue::from_names(pending)
            }
        };

        let question = format!("Start uploading {} files now?", queue.len());
        if !self.prompt.ask(&question).await? {
            tracing::info!(pending = queue.len(), "upload declined; progress kept");
            return Ok(SessionOutcome::Declined {
                pending: queue.len(),
            });
        }

        let summary = self.scheduler.drain(&mut queue).await?;
        tracing::info!(
            batches = summary.batches,
            uploaded = summary.uploaded,
            dead_lettered = summary.dead_lettered.len(),
            "upload finished"
        );
        Ok(SessionOutcome::Completed(summary))
    }

    async fn emit_mirror(&self, pending: &[FileName]) {
        let Some(path) = &self.mirror_path else {
            return;
        };
        match write_mirror(path, pending).await {
            Ok(()) => tracing::info!(path = %path.display(), "pending list written"),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to write pending list")
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

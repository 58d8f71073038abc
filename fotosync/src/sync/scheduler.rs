use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use futures_util::future::join_all;

use super::error::SyncError;
use super::names::FileName;
use super::progress::ProgressStore;
use super::queue::PendingQueue;
use super::uploader::Uploader;

pub const DEFAULT_BATCH_SIZE: usize = 15;
/// Upper bound on concurrent uploads per batch.
pub const MAX_BATCH_SIZE: usize = 256;

/// What happens to a file that keeps failing within one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryPolicy {
    #[default]
    Forever,
    /// Drop the file from the queue after this many failed attempts in the current run.
    MaxAttempts(u32),
}

impl RetryPolicy {
    fn exhausted(self, failures: u32) -> bool {
        match self {
            RetryPolicy::Forever => false,
            RetryPolicy::MaxAttempts(max) => failures >= max.max(1),
        }
    }
}

/// Denominator used for the completion percentage in batch reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PercentBasis {
    /// Share of the queue length at the start of the run that has left the queue.
    #[default]
    InitialTotal,
    /// Files uploaded this run over uploaded plus still pending.
    LiveRemaining,
}

impl FromStr for PercentBasis {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "initial" | "initial-total" | "" => Ok(Self::InitialTotal),
            "live" | "live-remaining" => Ok(Self::LiveRemaining),
            other => Err(format!("unknown percent basis: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub batch_size: usize,
    pub retry: RetryPolicy,
    pub percent: PercentBasis,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::Forever,
            percent: PercentBasis::InitialTotal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub index: usize,
    pub batch_size: usize,
    pub succeeded: usize,
    pub failures: Vec<(FileName, String)>,
    pub dead_lettered: Vec<FileName>,
    pub remaining: usize,
    pub percent: u8,
}

pub trait BatchObserver: Send + Sync {
    fn on_batch(&self, report: &BatchReport);
}

/// Reports every batch through `tracing`.
pub struct LogObserver;

impl BatchObserver for LogObserver {
    fn on_batch(&self, report: &BatchReport) {
        for (file, error) in &report.failures {
            tracing::warn!(file = %file, error = %error, "upload failed, kept in queue");
        }
        for file in &report.dead_lettered {
            tracing::error!(file = %file, "giving up on file after repeated failures");
        }
        tracing::info!(
            batch = report.index,
            ok = report.succeeded,
            failed = report.failures.len(),
            remaining = report.remaining,
            "progress {}%",
            report.percent
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub uploaded: usize,
    pub dead_lettered: Vec<FileName>,
}

/// Drains a pending queue in fixed-size concurrent batches, checkpointing the queue
/// to the progress store after every batch that removed something.
pub struct BatchScheduler {
    uploader: Arc<dyn Uploader>,
    store: Arc<dyn ProgressStore>,
    observer: Arc<dyn BatchObserver>,
    config: SchedulerConfig,
}

impl BatchScheduler {
    pub fn new(
        uploader: Arc<dyn Uploader>,
        store: Arc<dyn ProgressStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            uploader,
            store,
            observer: Arc::new(LogObserver),
            config,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub async fn drain(&self, queue: &mut PendingQueue) -> Result<RunSummary, SyncError> {
        let batch_size = self.config.batch_size.max(1);
        let initial = queue.len();
        let mut failures_by_file: HashMap<FileName, u32> = HashMap::new();
        let mut summary = RunSummary::default();

        while !queue.is_empty() {
            let batch = queue.next_batch(batch_size);
            let outcomes = join_all(batch.iter().map(|file| self.uploader.upload(file))).await;

            let mut done = HashSet::new();
            let mut succeeded = 0usize;
            let mut failures = Vec::new();
            let mut dead_lettered = Vec::new();
            for outcome in outcomes {
                if outcome.success {
                    succeeded += 1;
                    done.insert(outcome.file);
                    continue;
                }
                let attempts = failures_by_file.entry(outcome.file.clone()).or_insert(0);
                *attempts += 1;
                if self.config.retry.exhausted(*attempts) {
                    dead_lettered.push(outcome.file.clone());
                    done.insert(outcome.file.clone());
                }
                let message = outcome
                    .error
                    .unwrap_or_else(|| "upload failed without a message".to_string());
                failures.push((outcome.file, message));
            }

            if queue.remove_all(&done) > 0 {
                self.store.save(&queue.to_vec()).await?;
            }

            summary.batches += 1;
            summary.uploaded += succeeded;
            let report = BatchReport {
                index: summary.batches,
                batch_size: batch.len(),
                succeeded,
                failures,
                dead_lettered: dead_lettered.clone(),
                remaining: queue.len(),
                percent: self.percent(initial, summary.uploaded, queue.len()),
            };
            summary.dead_lettered.extend(dead_lettered);
            self.observer.on_batch(&report);
        }

        self.store.clear().await?;
        Ok(summary)
    }

    fn percent(&self, initial: usize, uploaded: usize, remaining: usize) -> u8 {
        let (done, total) = match self.config.percent {
            PercentBasis::InitialTotal => (initial.saturating_sub(remaining), initial),
            PercentBasis::LiveRemaining => (uploaded, uploaded + remaining),
        };
        if total == 0 {
            return 100;
        }
        ((done as f64 / total as f64) * 100.0).round() as u8
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

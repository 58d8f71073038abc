//! Fakes shared by the scheduler and session tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::prompt::ConfirmationPrompt;

use super::differ::LocalDirectoryEnumerator;
use super::error::SyncError;
use super::listing::RemoteListingSource;
use super::names::FileName;
use super::progress::{JsonProgressStore, ProgressError, ProgressStore};
use super::scheduler::{BatchObserver, BatchReport};
use super::uploader::{UploadOutcome, Uploader};

pub fn names(values: &[&str]) -> Vec<FileName> {
    values.iter().map(|v| FileName::parse(*v).unwrap()).collect()
}

/// Succeeds unless a file has scripted failures left; counts calls and concurrency.
#[derive(Default)]
pub struct ScriptedUploader {
    failures_left: Mutex<HashMap<FileName, u32>>,
    always_fail: Mutex<Vec<FileName>>,
    calls: Mutex<Vec<FileName>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedUploader {
    pub fn fail_times(self, file: &str, times: u32) -> Self {
        self.failures_left
            .lock()
            .unwrap()
            .insert(FileName::parse(file).unwrap(), times);
        self
    }

    pub fn fail_always(self, file: &str) -> Self {
        self.always_fail
            .lock()
            .unwrap()
            .push(FileName::parse(file).unwrap());
        self
    }

    pub fn calls(&self) -> Vec<FileName> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, file: &str) -> usize {
        self.calls()
            .iter()
            .filter(|name| name.as_str() == file)
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Uploader for ScriptedUploader {
    async fn upload(&self, file: &FileName) -> UploadOutcome {
        self.calls.lock().unwrap().push(file.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.always_fail.lock().unwrap().contains(file) {
            return UploadOutcome::failed(file.clone(), "permanent failure");
        }
        let mut failures = self.failures_left.lock().unwrap();
        match failures.get_mut(file) {
            Some(left) if *left > 0 => {
                *left -= 1;
                UploadOutcome::failed(file.clone(), "transient failure")
            }
            _ => UploadOutcome::succeeded(file.clone()),
        }
    }
}

/// Delegates to a JSON store, remembers every saved snapshot and can fail the Nth save.
pub struct RecordingStore {
    inner: JsonProgressStore,
    snapshots: Mutex<Vec<Vec<FileName>>>,
    clears: AtomicUsize,
    fail_on_save: Option<usize>,
}

impl RecordingStore {
    pub fn new(inner: JsonProgressStore) -> Self {
        Self {
            inner,
            snapshots: Mutex::new(Vec::new()),
            clears: AtomicUsize::new(0),
            fail_on_save: None,
        }
    }

    /// Fails the `n`th save (1-based) as if the disk went away.
    pub fn failing_on_save(mut self, n: usize) -> Self {
        self.fail_on_save = Some(n);
        self
    }

    pub fn snapshots(&self) -> Vec<Vec<FileName>> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressStore for RecordingStore {
    async fn load(&self) -> Result<Option<Vec<FileName>>, ProgressError> {
        self.inner.load().await
    }

    async fn save(&self, pending: &[FileName]) -> Result<(), ProgressError> {
        let attempt = self.snapshots.lock().unwrap().len() + 1;
        if self.fail_on_save == Some(attempt) {
            return Err(ProgressError::Io {
                path: self.inner.path().to_path_buf(),
                source: std::io::Error::other("disk unavailable"),
            });
        }
        self.inner.save(pending).await?;
        self.snapshots.lock().unwrap().push(pending.to_vec());
        Ok(())
    }

    async fn clear(&self) -> Result<(), ProgressError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear().await
    }
}

#[derive(Default)]
pub struct CollectingObserver {
    reports: Mutex<Vec<BatchReport>>,
}

impl CollectingObserver {
    pub fn reports(&self) -> Vec<BatchReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl BatchObserver for CollectingObserver {
    fn on_batch(&self, report: &BatchReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

/// Listing bytes held in memory; counts fetches.
pub struct StaticListing {
    raw: Vec<u8>,
    fetches: AtomicUsize,
}

impl StaticListing {
    pub fn new(raw: impl Into<Vec<u8>>) -> Self {
        Self {
            raw: raw.into(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteListingSource for std::sync::Arc<StaticListing> {
    async fn fetch(&self) -> std::io::Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.raw.clone())
    }

    fn describe(&self) -> String {
        "in-memory listing".to_string()
    }
}

pub struct StaticDirectory(pub Vec<String>);

#[async_trait]
impl LocalDirectoryEnumerator for StaticDirectory {
    async fn list(&self) -> std::io::Result<Vec<String>> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "in-memory directory".to_string()
    }
}

/// Gives a fixed answer and remembers the questions.
pub struct FixedPrompt {
    answer: bool,
    asked: Mutex<Vec<String>>,
}

impl FixedPrompt {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfirmationPrompt for FixedPrompt {
    async fn ask(&self, message: &str) -> Result<bool, SyncError> {
        self.asked.lock().unwrap().push(message.to_string());
        Ok(self.answer)
    }
}

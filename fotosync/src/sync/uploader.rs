use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fotosync_core::{StorageClient, StorageError};
use tokio::sync::Semaphore;

use super::names::FileName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub file: FileName,
    pub success: bool,
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn succeeded(file: FileName) -> Self {
        Self {
            file,
            success: true,
            error: None,
        }
    }

    pub fn failed(file: FileName, error: impl Into<String>) -> Self {
        Self {
            file,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Single upload attempt. Implementations report failures in the outcome and never
/// retry on their own; the scheduler re-queues failed files.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, file: &FileName) -> UploadOutcome;
}

/// Uploads `<local_dir>/<name>` to `<remote_prefix>/<name>` in the configured bucket.
#[derive(Clone)]
pub struct HttpUploader {
    client: StorageClient,
    local_dir: PathBuf,
    remote_prefix: String,
    limit: Arc<Semaphore>,
}

impl HttpUploader {
    pub fn new(
        client: StorageClient,
        local_dir: impl Into<PathBuf>,
        remote_prefix: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            client,
            local_dir: local_dir.into(),
            remote_prefix: remote_prefix.into(),
            limit: Arc::new(Semaphore::new(concurrency.clamp(1, Semaphore::MAX_PERMITS))),
        }
    }

    pub fn remote_key(&self, file: &FileName) -> String {
        let prefix = self.remote_prefix.trim_matches('/');
        if prefix.is_empty() {
            file.to_string()
        } else {
            format!("{prefix}/{file}")
        }
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, file: &FileName) -> UploadOutcome {
        let Ok(_permit) = self.limit.acquire().await else {
            return UploadOutcome::failed(file.clone(), "upload limiter is closed");
        };
        let source = self.local_dir.join(file.as_str());
        let key = self.remote_key(file);
        match self.client.upload_file(&key, &source).await {
            Ok(()) => UploadOutcome::succeeded(file.clone()),
            Err(err) => UploadOutcome::failed(file.clone(), describe_failure(&err)),
        }
    }
}

fn describe_failure(err: &StorageError) -> String {
    match err.classification() {
        Some(class) => format!("{err} ({class:?})"),
        None => err.to_string(),
    }
}

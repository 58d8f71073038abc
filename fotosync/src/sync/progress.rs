use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use super::names::FileName;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("progress record {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode progress record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable home of the pending queue.
///
/// `load` distinguishes an absent record (`None`) from one that exists but is empty
/// (`Some` of an empty list).
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load(&self) -> Result<Option<Vec<FileName>>, ProgressError>;

    async fn save(&self, pending: &[FileName]) -> Result<(), ProgressError>;

    /// Removing an absent record succeeds.
    async fn clear(&self) -> Result<(), ProgressError>;
}

/// JSON-array record on disk, replaced atomically through a `.partial` sibling.
pub struct JsonProgressStore {
    path: PathBuf,
}

impl JsonProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> ProgressError {
        ProgressError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ProgressStore for JsonProgressStore {
    async fn load(&self) -> Result<Option<Vec<FileName>>, ProgressError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };
        let pending: Vec<FileName> =
            serde_json::from_slice(&raw).map_err(|source| ProgressError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(pending))
    }

    async fn save(&self, pending: &[FileName]) -> Result<(), ProgressError> {
        let payload = serde_json::to_vec_pretty(pending)?;
        write_replacing(&self.path, &payload)
            .await
            .map_err(|err| self.io_error(err))?;
        tracing::debug!(path = %self.path.display(), pending = pending.len(), "progress saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), ProgressError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// Writes the human-readable pending list, one name per line. Never read back.
pub async fn write_mirror(path: &Path, pending: &[FileName]) -> io::Result<()> {
    let body = pending
        .iter()
        .map(FileName::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    write_replacing(path, body.as_bytes()).await
}

async fn write_replacing(target: &Path, payload: &[u8]) -> io::Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = partial_path(target);
    let mut file = tokio::fs::File::create(&partial).await?;
    file.write_all(payload).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&partial, target).await
}

fn partial_path(target: &Path) -> PathBuf {
    target.with_extension(format!(
        "{}partial",
        target
            .extension()
            .map(|ext| format!("{}.", ext.to_string_lossy()))
            .unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names(values: &[&str]) -> Vec<FileName> {
        values.iter().map(|v| FileName::parse(*v).unwrap()).collect()
    }

    #[tokio::test]
    async fn absent_record_loads_as_none() {
        let dir = tempdir().unwrap();
        let store = JsonProgressStore::new(dir.path().join("progress.json"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_record_is_distinct_from_absent() {
        let dir = tempdir().unwrap();
        let store = JsonProgressStore::new(dir.path().join("progress.json"));
        store.save(&[]).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn save_round_trips_order() {
        let dir = tempdir().unwrap();
        let store = JsonProgressStore::new(dir.path().join("progress.json"));
        let pending = names(&["z.jpg", "a.png", "m.jpeg"]);
        store.save(&pending).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(pending));
    }

    #[tokio::test]
    async fn save_replaces_previous_record_and_leaves_no_partial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let store = JsonProgressStore::new(&path);
        store.save(&names(&["a.jpg", "b.jpg"])).await.unwrap();
        store.save(&names(&["b.jpg"])).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(names(&["b.jpg"])));
        assert!(!dir.path().join("progress.json.partial").exists());
    }

    #[tokio::test]
    async fn leftover_partial_does_not_affect_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let store = JsonProgressStore::new(&path);
        store.save(&names(&["a.jpg"])).await.unwrap();
        // A crash mid-write leaves only the sibling behind.
        std::fs::write(dir.path().join("progress.json.partial"), b"[\"b.j").unwrap();

        assert_eq!(store.load().await.unwrap(), Some(names(&["a.jpg"])));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let store = JsonProgressStore::new(&path);
        store.save(&names(&["a.jpg"])).await.unwrap();
        store.clear().await.unwrap();
        assert!(!path.exists());
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_record_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, b"{\"not\": \"a list\"}").unwrap();
        let store = JsonProgressStore::new(&path);
        assert!(matches!(
            store.load().await,
            Err(ProgressError::Corrupt { .. })
        ));

        std::fs::write(&path, b"[\"folder/a.jpg\"]").unwrap();
        assert!(matches!(
            store.load().await,
            Err(ProgressError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn record_is_a_pretty_json_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");
        JsonProgressStore::new(&path)
            .save(&names(&["a.jpg", "b.png"]))
            .await
            .unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!(["a.jpg", "b.png"]));
    }

    #[tokio::test]
    async fn mirror_lists_one_name_per_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pending_list.txt");
        write_mirror(&path, &names(&["b.png", "c.jpg"])).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "b.png\nc.jpg");
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/tmp/progress.json")),
            PathBuf::from("/tmp/progress.json.partial")
        );
        assert_eq!(
            partial_path(Path::new("/tmp/progress")),
            PathBuf::from("/tmp/progress.partial")
        );
    }
}

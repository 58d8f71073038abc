use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;

use super::error::SyncError;
use super::listing::{ListingEncoding, RemoteListingSource, decode_listing, parse_listing};
use super::names::FileName;

#[async_trait]
pub trait LocalDirectoryEnumerator: Send + Sync {
    /// Entry names directly inside the directory, without recursion.
    async fn list(&self) -> io::Result<Vec<String>>;

    fn describe(&self) -> String;
}

pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl LocalDirectoryEnumerator for FsDirectory {
    async fn list(&self) -> io::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::warn!(name = ?raw, "skipping non UTF-8 file name"),
            }
        }
        Ok(names)
    }

    fn describe(&self) -> String {
        format!("local directory {}", self.root.display())
    }
}

/// Local names absent from the remote set, sorted and free of duplicates.
pub fn pending_uploads<I>(local: I, remote: &HashSet<FileName>) -> Vec<FileName>
where
    I: IntoIterator<Item = FileName>,
{
    local
        .into_iter()
        .filter(|name| !remote.contains(name))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct InventoryDiffer {
    listing: Box<dyn RemoteListingSource>,
    local: Box<dyn LocalDirectoryEnumerator>,
    encoding: ListingEncoding,
}

impl InventoryDiffer {
    pub fn new(
        listing: Box<dyn RemoteListingSource>,
        local: Box<dyn LocalDirectoryEnumerator>,
    ) -> Self {
        Self {
            listing,
            local,
            encoding: ListingEncoding::Auto,
        }
    }

    pub fn with_encoding(mut self, encoding: ListingEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Reads both inventories and returns the files that still need uploading.
    ///
    /// Unreadable inputs are configuration errors; nothing has been persisted yet when
    /// they occur.
    pub async fn compute(&self) -> Result<Vec<FileName>, SyncError> {
        let raw = self
            .listing
            .fetch()
            .await
            .map_err(|err| SyncError::configuration(self.listing.describe(), err))?;
        let remote = parse_listing(&decode_listing(&raw, self.encoding));

        let entries = self
            .local
            .list()
            .await
            .map_err(|err| SyncError::configuration(self.local.describe(), err))?;
        let local: Vec<FileName> = entries
            .into_iter()
            .filter_map(|entry| FileName::parse(entry).ok())
            .collect();

        let pending = pending_uploads(local.iter().cloned(), &remote);
        tracing::info!(
            remote = remote.len(),
            local = local.len(),
            pending = pending.len(),
            "inventory diff computed"
        );
        Ok(pending)
    }
}

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use fotosync_core::StorageClient;

use super::names::FileName;

/// How the raw bytes of a remote listing are turned into text.
///
/// Exports of bucket listings arrive either as UTF-8 or as UTF-16LE (PowerShell
/// redirection); `Auto` tells them apart by the null bytes UTF-16 leaves behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListingEncoding {
    #[default]
    Auto,
    Utf8,
    Utf16Le,
}

impl FromStr for ListingEncoding {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "utf16" | "utf-16" | "utf16le" | "utf-16le" => Ok(Self::Utf16Le),
            other => Err(format!("unknown listing encoding: {other}")),
        }
    }
}

#[async_trait]
pub trait RemoteListingSource: Send + Sync {
    async fn fetch(&self) -> io::Result<Vec<u8>>;

    fn describe(&self) -> String;
}

pub struct FileListingSource {
    path: PathBuf,
}

impl FileListingSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RemoteListingSource for FileListingSource {
    async fn fetch(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    fn describe(&self) -> String {
        format!("remote listing {}", self.path.display())
    }
}

pub struct HttpListingSource {
    client: StorageClient,
    url: String,
}

impl HttpListingSource {
    pub fn new(client: StorageClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl RemoteListingSource for HttpListingSource {
    async fn fetch(&self) -> io::Result<Vec<u8>> {
        self.client
            .fetch_bytes(&self.url)
            .await
            .map_err(io::Error::other)
    }

    fn describe(&self) -> String {
        format!("remote listing {}", self.url)
    }
}

pub fn decode_listing(raw: &[u8], encoding: ListingEncoding) -> String {
    let encoding = match encoding {
        ListingEncoding::Auto if raw.contains(&0) => ListingEncoding::Utf16Le,
        ListingEncoding::Auto => ListingEncoding::Utf8,
        explicit => explicit,
    };
    match encoding {
        ListingEncoding::Utf16Le => {
            let pairs = raw.chunks_exact(2);
            let dangling = !pairs.remainder().is_empty();
            let units: Vec<u16> = pairs
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            let mut text = String::from_utf16_lossy(&units);
            if dangling {
                text.push(char::REPLACEMENT_CHARACTER);
            }
            text
        }
        _ => String::from_utf8_lossy(raw).into_owned(),
    }
}

/// Extracts the set of image names present in a decoded listing.
pub fn parse_listing(text: &str) -> HashSet<FileName> {
    let mut names = HashSet::new();
    let mut skipped = 0usize;
    for line in text.lines() {
        match FileName::from_listing_line(line) {
            Some(name) => {
                names.insert(name);
            }
            None if line.trim_matches(|c: char| c.is_whitespace() || c == '\0').is_empty() => {}
            None => {
                skipped += 1;
                tracing::trace!(line, "skipping listing line");
            }
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, kept = names.len(), "ignored non-image listing lines");
    }
    names
}

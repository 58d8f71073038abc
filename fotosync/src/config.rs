use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::sync::listing::ListingEncoding;
use crate::sync::scheduler::{
    DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE, PercentBasis, RetryPolicy, SchedulerConfig,
};

const DEFAULT_LOCAL_DIR: &str = "./fotos";
const DEFAULT_LISTING_PATH: &str = "./lista_storage.txt";
const DEFAULT_PROGRESS_PATH: &str = "./progress.json";
const DEFAULT_MIRROR_PATH: &str = "./pending_list.txt";
const DEFAULT_REMOTE_PREFIX: &str = "photos";
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 120;

/// Where the remote inventory comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListingLocation {
    File(PathBuf),
    Url(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageSettings {
    pub base_url: String,
    pub bucket: String,
    pub token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub local_dir: PathBuf,
    pub listing: ListingLocation,
    pub listing_encoding: ListingEncoding,
    pub progress_path: PathBuf,
    pub mirror_path: Option<PathBuf>,
    pub remote_prefix: String,
    pub storage: Option<StorageSettings>,
    pub upload_timeout: Duration,
    pub scheduler: SchedulerConfig,
}

impl SyncConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let path_var = |name: &str, default: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .map(|value| expand_with_home(&value, &home))
                .unwrap_or_else(|| PathBuf::from(default))
        };

        let local_dir = path_var("FOTOSYNC_LOCAL_DIR", DEFAULT_LOCAL_DIR);
        let listing = match lookup("FOTOSYNC_LISTING_URL").filter(|v| !v.trim().is_empty()) {
            Some(url) => ListingLocation::Url(url),
            None => ListingLocation::File(path_var("FOTOSYNC_LISTING_PATH", DEFAULT_LISTING_PATH)),
        };
        let listing_encoding = lookup("FOTOSYNC_LISTING_ENCODING")
            .map(|value| value.parse::<ListingEncoding>())
            .transpose()
            .map_err(anyhow::Error::msg)
            .context("invalid FOTOSYNC_LISTING_ENCODING")?
            .unwrap_or_default();
        let progress_path = path_var("FOTOSYNC_PROGRESS_PATH", DEFAULT_PROGRESS_PATH);
        let mirror_path = match lookup("FOTOSYNC_MIRROR_PATH") {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(expand_with_home(&value, &home)),
            None => Some(PathBuf::from(DEFAULT_MIRROR_PATH)),
        };
        let remote_prefix = lookup("FOTOSYNC_REMOTE_PREFIX")
            .unwrap_or_else(|| DEFAULT_REMOTE_PREFIX.to_string());

        let storage = match (lookup("FOTOSYNC_STORAGE_URL"), lookup("FOTOSYNC_BUCKET")) {
            (Some(base_url), Some(bucket)) => Some(StorageSettings {
                base_url,
                bucket,
                token: lookup("FOTOSYNC_TOKEN").filter(|v| !v.is_empty()),
            }),
            _ => None,
        };
        let upload_timeout = Duration::from_secs(read_u64(
            lookup("FOTOSYNC_UPLOAD_TIMEOUT_SECS"),
            DEFAULT_UPLOAD_TIMEOUT_SECS,
        ));

        let requested = read_u64(lookup("FOTOSYNC_CONCURRENCY"), DEFAULT_BATCH_SIZE as u64);
        let batch_size = usize::try_from(requested)
            .unwrap_or(usize::MAX)
            .min(MAX_BATCH_SIZE);
        if batch_size as u64 != requested {
            tracing::warn!(
                requested,
                used = batch_size,
                "FOTOSYNC_CONCURRENCY capped"
            );
        }
        let retry = match read_u64(lookup("FOTOSYNC_MAX_ATTEMPTS"), 0) {
            0 => RetryPolicy::Forever,
            max => RetryPolicy::MaxAttempts(u32::try_from(max).unwrap_or(u32::MAX)),
        };
        let percent = lookup("FOTOSYNC_PERCENT_BASIS")
            .map(|value| value.parse::<PercentBasis>())
            .transpose()
            .map_err(anyhow::Error::msg)
            .context("invalid FOTOSYNC_PERCENT_BASIS")?
            .unwrap_or_default();

        Ok(Self {
            local_dir,
            listing,
            listing_encoding,
            progress_path,
            mirror_path,
            remote_prefix,
            storage,
            upload_timeout,
            scheduler: SchedulerConfig {
                batch_size,
                retry,
                percent,
            },
        })
    }

    pub fn require_storage(&self) -> anyhow::Result<&StorageSettings> {
        self.storage
            .as_ref()
            .context("FOTOSYNC_STORAGE_URL and FOTOSYNC_BUCKET must be set to upload")
    }
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn read_u64(value: Option<String>, default: u64) -> u64 {
    value
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

use std::io;
use std::path::Path;
use std::time::Duration;

use reqwest::{Body, Client, StatusCode};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("storage url cannot carry object paths: {0}")]
    NotABase(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("storage returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

/// Minimal client for a bucket-style object store reachable over plain HTTP.
///
/// Objects live at `<base_url>/<bucket>/<key>`; uploads are single PUT requests with
/// the file streamed as the body.
#[derive(Clone)]
pub struct StorageClient {
    http: Client,
    base_url: Url,
    bucket: String,
    token: Option<String>,
}

impl StorageClient {
    pub fn new(base_url: &str, bucket: impl Into<String>) -> Result<Self, StorageError> {
        Self::with_http(Client::new(), base_url, bucket)
    }

    pub fn with_timeout(
        base_url: &str,
        bucket: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let http = Client::builder().timeout(timeout).build()?;
        Self::with_http(http, base_url, bucket)
    }

    pub fn with_http(
        http: Client,
        base_url: &str,
        bucket: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(StorageError::NotABase(base_url.to_string()));
        }
        Ok(Self {
            http,
            base_url,
            bucket: bucket.into(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Streams `source` to the object named `key`, replacing any existing object.
    pub async fn upload_file(&self, key: &str, source: &Path) -> Result<(), StorageError> {
        let url = self.object_url(key)?;
        let file = tokio::fs::File::open(source).await?;
        let length = file.metadata().await?.len();
        let body = Body::wrap_stream(ReaderStream::new(file));

        let mut request = self
            .http
            .put(url)
            .header("Content-Type", content_type_for(key))
            .header("Content-Length", length)
            .body(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        Self::check_status(response).await?;
        tracing::debug!(bucket = %self.bucket, key, bytes = length, "object uploaded");
        Ok(())
    }

    /// Fetches an arbitrary URL (typically an exported bucket listing) as raw bytes.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let url = Url::parse(url)?;
        let mut request = self.http.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = Self::check_status(request.send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub fn object_url(&self, key: &str) -> Result<Url, StorageError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::NotABase(self.base_url.to_string()))?;
            segments.pop_if_empty().push(&self.bucket);
            segments.extend(key.split('/').filter(|part| !part.is_empty()));
        }
        Ok(url)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(StorageError::Api { status, body })
        }
    }
}

impl StorageError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            StorageError::Api { status, .. } => Some(classify_api_status(*status)),
            StorageError::Request(err) if err.is_timeout() || err.is_connect() => {
                Some(ApiErrorClass::Transient)
            }
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_EARLY
        )
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

fn content_type_for(key: &str) -> &'static str {
    let lower = key.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

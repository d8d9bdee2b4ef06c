use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use publish_core::Session;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::connector::{ConnectorError, ConnectorErrorKind, StorageConnector};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn from_connector(err: &ConnectorError) -> Self {
        let kind = match err.kind {
            ConnectorErrorKind::NotFound => FailureKind::NotFound,
            _ => FailureKind::Storage,
        };
        Self::new(kind, err.message.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    NotFound,
    Storage,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "asset too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::NotFound => write!(f, "not found"),
            FailureKind::Storage => write!(f, "storage error"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_asset_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            redirect_limit: 5,
            max_asset_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Source of asset bytes during a publication.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, session: &Session, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Downloads assets over HTTP.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl ReqwestFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            max_bytes: settings.max_asset_bytes,
        })
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.max_bytes,
                actual: Some(actual),
            },
            "asset too large",
        )
    }
}

#[async_trait]
impl AssetFetcher for ReqwestFetcher {
    async fn fetch(&self, _session: &Session, url: &Url) -> Result<Vec<u8>, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::new(FailureKind::InvalidUrl, url.as_str()));
        }
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(self.too_large(len));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.max_bytes {
                return Err(self.too_large(next_len));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

/// Reads assets straight from the storage backend of the source website.
/// URLs are mapped to storage paths relative to `base_url`.
#[derive(Clone)]
pub struct StorageFetcher {
    storage: Arc<dyn StorageConnector>,
    website_id: String,
    base_url: Url,
}

impl StorageFetcher {
    pub fn new(storage: Arc<dyn StorageConnector>, website_id: impl Into<String>, base_url: Url) -> Self {
        Self {
            storage,
            website_id: website_id.into(),
            base_url,
        }
    }

    /// Storage path of `url`, or `None` when it lies outside the base URL.
    pub fn storage_path(&self, url: &Url) -> Option<String> {
        if url.origin() != self.base_url.origin() {
            return None;
        }
        let relative = self.base_url.make_relative(url)?;
        if relative.is_empty() || relative.starts_with("../") {
            return None;
        }
        Some(relative)
    }
}

#[async_trait]
impl AssetFetcher for StorageFetcher {
    async fn fetch(&self, session: &Session, url: &Url) -> Result<Vec<u8>, FetchError> {
        let path = self.storage_path(url).ok_or_else(|| {
            FetchError::new(FailureKind::InvalidUrl, format!("{url} is outside the website"))
        })?;
        let file = self
            .storage
            .read_asset(session, &self.website_id, &path)
            .await
            .map_err(|err| FetchError::from_connector(&err))?;
        Ok(file.content.as_bytes().to_vec())
    }
}

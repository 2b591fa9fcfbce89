//! Source photo download.

use std::path::Path;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http: {0}")]
    Http(String),
    #[error("fetch failed with status {0}")]
    Status(StatusCode),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait PhotoFetcher: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PhotoFetcher for HttpFetcher {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        download_photo(&self.http, url, dest).await
    }
}

/// Download a photo to `dest`. The shared client carries the request
/// timeout, so a stalled server cannot block the row forever.
pub async fn download_photo(
    http: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<(), FetchError> {
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Http(e.to_string()))?;

    if resp.status() != StatusCode::OK {
        return Err(FetchError::Status(resp.status()));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| FetchError::Http(e.to_string()))?;
    tokio::fs::write(dest, &bytes).await?;
    Ok(())
}

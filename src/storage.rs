//! Cloud storage sink (Yandex Disk REST API).

use std::path::Path;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("http: {0}")]
    Http(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("storage api error {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait StorageSink: Send + Sync {
    async fn upload(&self, local: &Path, remote: &str, overwrite: bool) -> Result<(), StorageError>;
    async fn mkdir(&self, path: &str) -> Result<(), StorageError>;
    async fn remove(&self, path: &str) -> Result<(), StorageError>;
    /// Make `path` public and return its public URL, when the backend
    /// reports one.
    async fn publish(&self, path: &str) -> Result<Option<String>, StorageError>;
}

/// Idempotent "directory exists and is empty": a missing directory on
/// remove and a pre-existing one on mkdir are both fine.
pub async fn reset_dir(sink: &dyn StorageSink, path: &str) -> Result<(), StorageError> {
    match sink.remove(path).await {
        Ok(()) | Err(StorageError::NotFound(_)) => {}
        Err(e) => return Err(e),
    }
    match sink.mkdir(path).await {
        Ok(()) | Err(StorageError::AlreadyExists(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

fn disk_api_url() -> String {
    std::env::var("DISK_API_URL")
        .unwrap_or_else(|_| "https://cloud-api.yandex.net/v1/disk".to_string())
}

pub struct DiskClient {
    http: reqwest::Client,
    token: String,
}

#[derive(Deserialize)]
struct UploadTarget {
    href: String,
}

impl DiskClient {
    pub fn new(http: reqwest::Client, token: String) -> Self {
        Self { http, token }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("OAuth {}", self.token))
    }

    async fn check(resp: reqwest::Response, path: &str) -> Result<reqwest::Response, StorageError> {
        match resp.status() {
            s if s.is_success() => Ok(resp),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(path.to_string())),
            StatusCode::CONFLICT => Err(StorageError::AlreadyExists(path.to_string())),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(StorageError::Api { status, body })
            }
        }
    }
}

#[async_trait]
impl StorageSink for DiskClient {
    async fn upload(&self, local: &Path, remote: &str, overwrite: bool) -> Result<(), StorageError> {
        // Two phases: ask for an upload href, then PUT the bytes to it.
        let url = format!(
            "{}/resources/upload?path={}&overwrite={}",
            disk_api_url(),
            urlencoding::encode(remote),
            overwrite
        );
        let resp = self
            .auth(self.http.get(&url))
            .send()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;
        let resp = Self::check(resp, remote).await?;
        let target = resp
            .json::<UploadTarget>()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;

        let bytes = tokio::fs::read(local).await?;
        let put = self
            .http
            .put(&target.href)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;
        Self::check(put, remote).await?;
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> Result<(), StorageError> {
        let url = format!(
            "{}/resources?path={}",
            disk_api_url(),
            urlencoding::encode(path)
        );
        let resp = self
            .auth(self.http.put(&url))
            .send()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;
        Self::check(resp, path).await?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        let url = format!(
            "{}/resources?path={}&permanently=true",
            disk_api_url(),
            urlencoding::encode(path)
        );
        let resp = self
            .auth(self.http.delete(&url))
            .send()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;
        Self::check(resp, path).await?;
        Ok(())
    }

    async fn publish(&self, path: &str) -> Result<Option<String>, StorageError> {
        let url = format!(
            "{}/resources/publish?path={}",
            disk_api_url(),
            urlencoding::encode(path)
        );
        let resp = self
            .auth(self.http.put(&url))
            .send()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;
        Self::check(resp, path).await?;

        let meta_url = format!(
            "{}/resources?path={}&fields=public_url",
            disk_api_url(),
            urlencoding::encode(path)
        );
        let resp = self
            .auth(self.http.get(&meta_url))
            .send()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;
        let resp = Self::check(resp, path).await?;
        let meta = resp
            .json::<serde_json::Value>()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;

        Ok(meta
            .get("public_url")
            .and_then(|v| v.as_str())
            .map(|u| u.replace("yadi.sk", "disk.yandex.ru")))
    }
}

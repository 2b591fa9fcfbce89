//! Background removal client.
//!
//! The cutout service is consumed as an opaque HTTP capability: raw image
//! bytes in, RGBA PNG with a transparent background out. Failures abort the
//! current row only.

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CutoutError {
    #[error("http: {0}")]
    Http(String),
    #[error("cutout api error {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[async_trait]
pub trait CutoutService: Send + Sync {
    async fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>, CutoutError>;
}

pub struct HttpCutout {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpCutout {
    pub fn new(http: reqwest::Client, endpoint: String, api_key: Option<String>) -> Self {
        Self {
            http,
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl CutoutService for HttpCutout {
    async fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>, CutoutError> {
        let mut req = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/octet-stream")
            .body(image.to_vec());
        if let Some(key) = &self.api_key {
            req = req.header("X-Api-Key", key);
        }

        let resp = req.send().await.map_err(|e| CutoutError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CutoutError::Api { status, body });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| CutoutError::Http(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

//! Object-storage upload collaborator
//!
//! The pipeline hands rendered bytes to an [`ObjectStore`] and relays the URL
//! it returns. [`HttpObjectStore`] posts the file as multipart form data with a
//! bearer API key and expects a JSON body carrying `url`.

use crate::error::{Result, UploadError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

/// Durable location of an uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Public URL of the stored file
    pub url: String,
}

/// External storage that turns bytes into a durable URL
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `filename`
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<UploadReceipt>;
}

/// Settings for [`HttpObjectStore`]
#[derive(Clone)]
pub struct UploadConfig {
    /// Endpoint receiving the multipart POST
    pub endpoint: Url,
    /// Bearer credential
    pub api_key: String,
    /// Optional folder/prefix sent alongside the file
    pub folder: Option<String>,
    /// Whole-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl std::fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"<redacted>")
            .field("folder", &self.folder)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Generate a collision-resistant filename: `<prefix>-<unix millis>-<random>.pdf`
pub fn unique_filename(prefix: &str) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}.pdf",
        prefix,
        Utc::now().timestamp_millis(),
        &nonce[..8]
    )
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    url: Option<String>,
}

/// Extract a usable absolute http(s) URL from a storage response body
fn receipt_from_body(body: &[u8]) -> Result<UploadReceipt> {
    let response: UploadResponse =
        serde_json::from_slice(body).map_err(|_| UploadError::MissingUrl)?;

    let url = response
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or(UploadError::MissingUrl)?;

    match Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(UploadReceipt { url }),
        _ => Err(UploadError::MissingUrl.into()),
    }
}

/// Multipart HTTP upload client
pub struct HttpObjectStore {
    client: reqwest::Client,
    config: UploadConfig,
}

impl HttpObjectStore {
    /// Build a client for `config`
    pub fn new(config: UploadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| UploadError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Upload settings
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<UploadReceipt> {
        info!("Uploading {}", filename);

        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")
            .map_err(|e| UploadError::RequestFailed(e.to_string()))?;

        let mut form = Form::new()
            .part("file", part)
            .text("filename", filename.to_string());
        if let Some(ref folder) = self.config.folder {
            form = form.text("folder", folder.clone());
        }

        let response = self
            .client
            .post(self.config.endpoint.clone())
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| UploadError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).chars().take(512).collect(),
            }
            .into());
        }

        let receipt = receipt_from_body(&body)?;
        debug!("Upload stored at {}", receipt.url);
        Ok(receipt)
    }
}

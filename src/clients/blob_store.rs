//! HTTP client for the durable blob store.
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::{Client, Url};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

#[derive(Debug, Clone)]
pub struct BlobStoreClient {
    client: Client,
    base_url: Url,
}

impl BlobStoreClient {
    /// # Errors
    /// Returns an error when the HTTP client cannot be built or the base URL
    /// is invalid.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build blob-store client")?;

        let base_url = Url::parse(&base_url.into()).context("invalid blob-store base URL")?;

        Ok(Self { client, base_url })
    }

    /// Upload bytes under the given path and return the permanent URL.
    pub async fn upload(&self, bytes: Bytes, path: &str, content_type: &str) -> Result<String> {
        let url = self
            .base_url
            .join("v1/blobs/")
            .and_then(|base| base.join(path))
            .context("failed to build blob upload URL")?;

        let response = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .context("blob upload request failed")?
            .error_for_status()
            .context("blob upload returned error status")?;

        let parsed = response
            .json::<UploadResponse>()
            .await
            .context("failed to deserialize blob upload response")?;

        Ok(parsed.url)
    }
}

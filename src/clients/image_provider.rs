//! HTTP client for the image-generation service.
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::scheduler::SubscriptionTier;

/// Tier-derived generation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageQuality {
    pub width: u32,
    pub height: u32,
}

impl ImageQuality {
    #[must_use]
    pub fn for_tier(tier: SubscriptionTier) -> Self {
        match tier {
            SubscriptionTier::Free => Self {
                width: 512,
                height: 512,
            },
            SubscriptionTier::Basic => Self {
                width: 768,
                height: 768,
            },
            SubscriptionTier::Premium => Self {
                width: 1024,
                height: 1024,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateImageResponse {
    url: String,
}

#[derive(Debug, Clone)]
pub struct ImageProviderClient {
    client: Client,
    base_url: Url,
}

impl ImageProviderClient {
    /// # Errors
    /// Returns an error when the HTTP client cannot be built or the base URL
    /// is invalid.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build image-provider client")?;

        let base_url = Url::parse(&base_url.into()).context("invalid image-provider base URL")?;

        Ok(Self { client, base_url })
    }

    pub async fn health_check(&self) -> Result<()> {
        let url = self
            .base_url
            .join("health")
            .context("failed to build image-provider health URL")?;

        self.client
            .get(url)
            .send()
            .await
            .context("image-provider health request failed")?
            .error_for_status()
            .context("image-provider health endpoint returned error status")?;

        Ok(())
    }

    /// Generate one image and return its temporary URL.
    pub async fn generate(&self, prompt: &str, quality: ImageQuality) -> Result<String> {
        let url = self
            .base_url
            .join("v1/images/generate")
            .context("failed to build image generate URL")?;

        let body = serde_json::json!({
            "prompt": prompt,
            "width": quality.width,
            "height": quality.height,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("image-provider generate request failed")?
            .error_for_status()
            .context("image-provider generate returned error status")?;

        let parsed = response
            .json::<GenerateImageResponse>()
            .await
            .context("failed to deserialize image generate response")?;

        Ok(parsed.url)
    }

    /// Fetch the generated bytes from the provider's temporary URL.
    pub async fn download(&self, temporary_url: &str) -> Result<Bytes> {
        let url = Url::parse(temporary_url).context("invalid temporary image URL")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("image download request failed")?
            .error_for_status()
            .context("image download returned error status")?;

        response
            .bytes()
            .await
            .context("failed to read image body")
    }
}

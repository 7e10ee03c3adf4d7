//! HTTP client for the LLM content-generation service.
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::draft::{NutritionFacts, RecipeDraft};

/// Raw recipe payload as returned by the content generator, before
/// structural validation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawRecipePayload {
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_servings")]
    pub servings: u32,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub steps: Vec<RawStepPayload>,
    #[serde(default)]
    pub nutrition: Option<NutritionFacts>,
    #[serde(default)]
    pub prep_time_minutes: Option<u32>,
    #[serde(default)]
    pub cook_time_minutes: Option<u32>,
    #[serde(default)]
    pub total_time_minutes: Option<u32>,
}

fn default_servings() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawStepPayload {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub illustration_prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct QualityReview {
    pub overall: f64,
}

#[derive(Debug, Clone)]
pub struct ContentGeneratorClient {
    client: Client,
    base_url: Url,
}

impl ContentGeneratorClient {
    /// # Errors
    /// Returns an error when the HTTP client cannot be built or the base URL
    /// is invalid.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build content-generator client")?;

        let base_url =
            Url::parse(&base_url.into()).context("invalid content-generator base URL")?;

        Ok(Self { client, base_url })
    }

    pub async fn health_check(&self) -> Result<()> {
        let url = self
            .base_url
            .join("health")
            .context("failed to build content-generator health URL")?;

        self.client
            .get(url)
            .send()
            .await
            .context("content-generator health request failed")?
            .error_for_status()
            .context("content-generator health endpoint returned error status")?;

        Ok(())
    }

    /// Generate a structured recipe for a natural-language query.
    pub async fn compose(
        &self,
        query: &str,
        preferences: Option<&Value>,
    ) -> Result<RawRecipePayload> {
        let url = self
            .base_url
            .join("v1/recipes/compose")
            .context("failed to build compose URL")?;

        let body = serde_json::json!({
            "query": query,
            "preferences": preferences,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("content-generator compose request failed")?
            .error_for_status()
            .context("content-generator compose returned error status")?;

        response
            .json::<RawRecipePayload>()
            .await
            .context("failed to deserialize compose response")
    }

    /// Score a draft on a 0-10 scale.
    pub async fn score(&self, draft: &RecipeDraft) -> Result<QualityReview> {
        let url = self
            .base_url
            .join("v1/recipes/score")
            .context("failed to build score URL")?;

        let response = self
            .client
            .post(url)
            .json(draft)
            .send()
            .await
            .context("content-generator score request failed")?
            .error_for_status()
            .context("content-generator score returned error status")?;

        response
            .json::<QualityReview>()
            .await
            .context("failed to deserialize score response")
    }

    /// Ask for an improved version of a below-threshold draft.
    pub async fn improve(&self, draft: &RecipeDraft, score: f64) -> Result<RawRecipePayload> {
        let url = self
            .base_url
            .join("v1/recipes/improve")
            .context("failed to build improve URL")?;

        let body = serde_json::json!({
            "recipe": draft,
            "score": score,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("content-generator improve request failed")?
            .error_for_status()
            .context("content-generator improve returned error status")?;

        response
            .json::<RawRecipePayload>()
            .await
            .context("failed to deserialize improve response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn compose_parses_recipe_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/recipes/compose"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": "Margherita Pizza",
                "servings": 2,
                "ingredients": ["flour", "tomato", "mozzarella"],
                "steps": [
                    {"text": "Make the dough", "illustration_prompt": "dough on a counter"}
                ]
            })))
            .mount(&server)
            .await;

        let client = ContentGeneratorClient::new(server.uri(), TIMEOUT).expect("client builds");
        let payload = client
            .compose("margherita pizza", None)
            .await
            .expect("compose succeeds");

        assert_eq!(payload.title, "Margherita Pizza");
        assert_eq!(payload.servings, 2);
        assert_eq!(payload.ingredients.len(), 3);
        assert_eq!(payload.steps.len(), 1);
    }

    #[tokio::test]
    async fn compose_surfaces_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/recipes/compose"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ContentGeneratorClient::new(server.uri(), TIMEOUT).expect("client builds");
        let error = client
            .compose("margherita pizza", None)
            .await
            .expect_err("should fail");
        assert!(error.to_string().contains("error status"));
    }

    #[tokio::test]
    async fn health_check_succeeds_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = ContentGeneratorClient::new(server.uri(), TIMEOUT).expect("client builds");
        client.health_check().await.expect("health check succeeds");
    }
}

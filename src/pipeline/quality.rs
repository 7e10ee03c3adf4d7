//! Quality scoring and the single-shot enhancement pass.
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::clients::ContentGeneratorClient;
use crate::pipeline::content::{draft_from_payload, validate_payload};
use crate::pipeline::draft::RecipeDraft;

#[async_trait]
pub trait QualityStage: Send + Sync {
    /// Score below which a draft gets one enhancement pass.
    fn threshold(&self) -> f64;

    /// Score a draft on a 0-10 scale.
    async fn score(&self, draft: &RecipeDraft) -> Result<f64>;

    /// Produce an improved draft. The result keeps the input draft's id so
    /// downstream identity (snapshots, blob paths) is unaffected.
    async fn enhance(&self, draft: &RecipeDraft, score: f64) -> Result<RecipeDraft>;
}

pub struct LlmQualityStage {
    client: Arc<ContentGeneratorClient>,
    threshold: f64,
}

impl LlmQualityStage {
    #[must_use]
    pub fn new(client: Arc<ContentGeneratorClient>, threshold: f64) -> Self {
        Self { client, threshold }
    }
}

#[async_trait]
impl QualityStage for LlmQualityStage {
    fn threshold(&self) -> f64 {
        self.threshold
    }

    async fn score(&self, draft: &RecipeDraft) -> Result<f64> {
        let review = self.client.score(draft).await?;
        Ok(review.overall)
    }

    async fn enhance(&self, draft: &RecipeDraft, score: f64) -> Result<RecipeDraft> {
        let payload = self
            .client
            .improve(draft, score)
            .await
            .context("enhancement request failed")?;

        // An enhanced payload that fails structural validation is worse
        // than the draft we already have.
        validate_payload(&payload).context("enhanced recipe failed validation")?;

        Ok(draft_from_payload(payload, draft.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_draft() -> RecipeDraft {
        use crate::pipeline::draft::StepDraft;
        RecipeDraft {
            id: Uuid::new_v4(),
            title: "Flat Soup".to_string(),
            servings: 2,
            ingredients: vec!["water".to_string()],
            steps: vec![StepDraft {
                text: "Boil".to_string(),
                illustration_prompt: "pot".to_string(),
                image_url: None,
            }],
            nutrition: Default::default(),
            prep_time_minutes: None,
            cook_time_minutes: None,
            total_time_minutes: None,
            category: None,
            tags: vec![],
            quality_score: None,
            similarity_hash: None,
            thumbnail_url: None,
        }
    }

    async fn stage_for(server: &MockServer) -> LlmQualityStage {
        let client =
            ContentGeneratorClient::new(server.uri(), Duration::from_secs(5)).expect("client builds");
        LlmQualityStage::new(Arc::new(client), 7.0)
    }

    #[tokio::test]
    async fn score_returns_overall() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/recipes/score"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"overall": 6.4})),
            )
            .mount(&server)
            .await;

        let stage = stage_for(&server).await;
        let score = stage.score(&sample_draft()).await.expect("score succeeds");
        assert!((score - 6.4).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn enhance_keeps_the_draft_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/recipes/improve"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": "Hearty Vegetable Soup",
                "servings": 2,
                "ingredients": ["water", "carrot", "celery"],
                "steps": [{"text": "Simmer the vegetables", "illustration_prompt": "pot"}]
            })))
            .mount(&server)
            .await;

        let stage = stage_for(&server).await;
        let draft = sample_draft();
        let enhanced = stage.enhance(&draft, 6.4).await.expect("enhance succeeds");

        assert_eq!(enhanced.id, draft.id);
        assert_eq!(enhanced.title, "Hearty Vegetable Soup");
    }

    #[tokio::test]
    async fn invalid_enhanced_payload_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/recipes/improve"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": "",
                "ingredients": [],
                "steps": []
            })))
            .mount(&server)
            .await;

        let stage = stage_for(&server).await;
        let error = stage
            .enhance(&sample_draft(), 6.4)
            .await
            .expect_err("should reject");
        assert!(error.to_string().contains("validation"));
    }
}

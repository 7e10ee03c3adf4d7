//! Content generation: the only stage whose failure is always fatal.
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::clients::ContentGeneratorClient;
use crate::clients::content_generator::RawRecipePayload;
use crate::pipeline::draft::{RecipeDraft, StepDraft};
use crate::scheduler::RequestContext;
use crate::util::error::PipelineError;

#[async_trait]
pub trait ContentStage: Send + Sync {
    /// Produce a validated initial draft for the request.
    async fn generate(&self, request: &RequestContext) -> Result<RecipeDraft, PipelineError>;
}

pub struct LlmContentStage {
    client: Arc<ContentGeneratorClient>,
}

impl LlmContentStage {
    #[must_use]
    pub fn new(client: Arc<ContentGeneratorClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentStage for LlmContentStage {
    async fn generate(&self, request: &RequestContext) -> Result<RecipeDraft, PipelineError> {
        let payload = self
            .client
            .compose(&request.query, request.preferences.as_ref())
            .await
            .map_err(PipelineError::ContentGeneration)?;

        validate_payload(&payload)?;
        Ok(draft_from_payload(payload, Uuid::new_v4()))
    }
}

/// Structural checks on a raw payload. A payload failing these is unusable:
/// there is nothing to score, illustrate, or persist.
pub(crate) fn validate_payload(payload: &RawRecipePayload) -> Result<(), PipelineError> {
    if payload.title.trim().is_empty() {
        return Err(PipelineError::InvalidContent("empty title".to_string()));
    }
    if payload.ingredients.iter().all(|line| line.trim().is_empty()) {
        return Err(PipelineError::InvalidContent(
            "no ingredients".to_string(),
        ));
    }
    if payload
        .steps
        .iter()
        .all(|step| step.text.trim().is_empty())
    {
        return Err(PipelineError::InvalidContent(
            "no instruction steps".to_string(),
        ));
    }
    Ok(())
}

/// Shape a raw payload into a draft under a fixed id. Steps without an
/// illustration prompt get one derived from the instruction text.
pub(crate) fn draft_from_payload(payload: RawRecipePayload, id: Uuid) -> RecipeDraft {
    let steps = payload
        .steps
        .into_iter()
        .filter(|step| !step.text.trim().is_empty())
        .map(|step| {
            let illustration_prompt = if step.illustration_prompt.trim().is_empty() {
                format!("Overhead food photo of this cooking step: {}", step.text)
            } else {
                step.illustration_prompt
            };
            StepDraft {
                text: step.text,
                illustration_prompt,
                image_url: None,
            }
        })
        .collect();

    RecipeDraft {
        id,
        title: payload.title,
        servings: payload.servings.max(1),
        ingredients: payload
            .ingredients
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect(),
        steps,
        nutrition: payload.nutrition.unwrap_or_default(),
        prep_time_minutes: payload.prep_time_minutes,
        cook_time_minutes: payload.cook_time_minutes,
        total_time_minutes: payload.total_time_minutes,
        category: None,
        tags: vec![],
        quality_score: None,
        similarity_hash: None,
        thumbnail_url: None,
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::draft::{NutritionFacts, RecipeDraft, StepDraft};

/// A persisted recipe. Global copies have `owner_id = None`; caller-owned
/// copies carry the owner and their own id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRecord {
    pub id: Uuid,
    pub title: String,
    pub servings: u32,
    pub ingredients: Vec<String>,
    pub steps: Vec<StepDraft>,
    pub nutrition: NutritionFacts,
    pub prep_time_minutes: Option<u32>,
    pub cook_time_minutes: Option<u32>,
    pub total_time_minutes: Option<u32>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub quality_score: Option<f64>,
    pub similarity_hash: Option<String>,
    pub thumbnail_url: Option<String>,
    pub owner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecipeRecord {
    /// Build a record from a finished draft. The record keeps the draft id
    /// unless the caller supplies a new one (owner copies get fresh ids).
    #[must_use]
    pub fn from_draft(draft: &RecipeDraft, id: Uuid, owner_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: draft.title.clone(),
            servings: draft.servings,
            ingredients: draft.ingredients.clone(),
            steps: draft.steps.clone(),
            nutrition: draft.nutrition.clone(),
            prep_time_minutes: draft.prep_time_minutes,
            cook_time_minutes: draft.cook_time_minutes,
            total_time_minutes: draft.total_time_minutes,
            category: draft.category.clone(),
            tags: draft.tags.clone(),
            quality_score: draft.quality_score,
            similarity_hash: draft.similarity_hash.clone(),
            thumbnail_url: draft.thumbnail_url.clone(),
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// View of the record as a draft, for similarity scoring and merging.
    #[must_use]
    pub fn as_draft(&self) -> RecipeDraft {
        RecipeDraft {
            id: self.id,
            title: self.title.clone(),
            servings: self.servings,
            ingredients: self.ingredients.clone(),
            steps: self.steps.clone(),
            nutrition: self.nutrition.clone(),
            prep_time_minutes: self.prep_time_minutes,
            cook_time_minutes: self.cook_time_minutes,
            total_time_minutes: self.total_time_minutes,
            category: self.category.clone(),
            tags: self.tags.clone(),
            quality_score: self.quality_score,
            similarity_hash: self.similarity_hash.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
        }
    }
}

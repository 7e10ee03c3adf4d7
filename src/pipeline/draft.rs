//! The evolving recipe assembled by one pipeline run.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One instruction step. `image_url` stays `None` until the step's image
/// sub-job succeeds; a sub-job that exhausts its retries leaves it `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDraft {
    pub text: String,
    pub illustration_prompt: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Per-serving nutrition facts, as free-form quantity strings ("320 kcal").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutritionFacts {
    #[serde(default)]
    pub calories: String,
    #[serde(default)]
    pub protein: String,
    #[serde(default)]
    pub fat: String,
    #[serde(default)]
    pub carbohydrates: String,
}

impl NutritionFacts {
    /// True when all four fields are populated with a non-zero quantity.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        [&self.calories, &self.protein, &self.fat, &self.carbohydrates]
            .into_iter()
            .all(|field| is_non_zero_quantity(field))
    }
}

fn is_non_zero_quantity(field: &str) -> bool {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return false;
    }
    let numeric: String = trimmed
        .chars()
        .take_while(|ch| ch.is_ascii_digit() || *ch == '.')
        .collect();
    match numeric.parse::<f64>() {
        Ok(value) => value != 0.0,
        // Non-numeric text ("trace amounts") still counts as populated.
        Err(_) => true,
    }
}

/// The in-memory recipe being assembled.
///
/// `id` is assigned once and never changes. The step list is fixed once
/// content generation completes; afterwards only each step's `image_url` is
/// filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDraft {
    pub id: Uuid,
    pub title: String,
    pub servings: u32,
    pub ingredients: Vec<String>,
    pub steps: Vec<StepDraft>,
    #[serde(default)]
    pub nutrition: NutritionFacts,
    #[serde(default)]
    pub prep_time_minutes: Option<u32>,
    #[serde(default)]
    pub cook_time_minutes: Option<u32>,
    #[serde(default)]
    pub total_time_minutes: Option<u32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub similarity_hash: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl RecipeDraft {
    /// Instruction texts of all steps, in order.
    #[must_use]
    pub fn step_texts(&self) -> Vec<String> {
        self.steps.iter().map(|step| step.text.clone()).collect()
    }
}

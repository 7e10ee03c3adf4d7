//! The recipe generation pipeline: stages, orchestration, and the engines
//! they share.
pub mod categorize;
pub mod content;
pub mod draft;
pub mod duplicate;
pub mod images;
pub mod merge;
pub mod orchestrator;
pub mod persist;
pub mod quality;
pub mod similarity;

pub use draft::{NutritionFacts, RecipeDraft, StepDraft};
pub use orchestrator::{PipelineBuilder, PipelineOrchestrator, RunOutcome};
pub use similarity::{SimilarityEngine, SimilarityResult};

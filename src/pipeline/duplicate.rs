//! Duplicate detection against the canonical store.
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::pipeline::draft::RecipeDraft;
use crate::pipeline::similarity::SimilarityEngine;
use crate::store::RecipeStore;

/// A stored recipe close enough to count as the same dish.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateCandidate {
    pub existing_id: Uuid,
    pub score: f64,
}

#[derive(Debug, Default)]
pub struct DuplicateOutcome {
    pub candidate: Option<DuplicateCandidate>,
    pub warnings: Vec<String>,
}

#[async_trait]
pub trait DuplicateStage: Send + Sync {
    /// Fingerprint the draft and search the store for a duplicate. Store
    /// failures degrade to "no duplicate" with a warning; generating a
    /// near-copy beats failing the whole run.
    async fn check(&self, draft: &mut RecipeDraft) -> DuplicateOutcome;
}

pub struct StoreDuplicateStage {
    store: Arc<dyn RecipeStore>,
    engine: SimilarityEngine,
    candidate_limit: usize,
}

impl StoreDuplicateStage {
    #[must_use]
    pub fn new(store: Arc<dyn RecipeStore>, engine: SimilarityEngine, candidate_limit: usize) -> Self {
        Self {
            store,
            engine,
            candidate_limit,
        }
    }
}

#[async_trait]
impl DuplicateStage for StoreDuplicateStage {
    async fn check(&self, draft: &mut RecipeDraft) -> DuplicateOutcome {
        let hash = SimilarityEngine::hash(draft);
        draft.similarity_hash = Some(hash.clone());

        let candidates = match self
            .store
            .find_candidates(&draft.title, &hash, self.candidate_limit)
            .await
        {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(recipe_id = %draft.id, error = %error, "candidate lookup failed, treating as no duplicate");
                return DuplicateOutcome {
                    candidate: None,
                    warnings: vec![format!("duplicate check skipped: {error:#}")],
                };
            }
        };

        let mut best: Option<DuplicateCandidate> = None;
        for candidate in &candidates {
            let result = self.engine.score(draft, &candidate.as_draft());
            debug!(
                recipe_id = %draft.id,
                candidate_id = %candidate.id,
                score = result.combined_score,
                "scored duplicate candidate"
            );
            if result.is_duplicate
                && best.is_none_or(|current| result.combined_score > current.score)
            {
                best = Some(DuplicateCandidate {
                    existing_id: candidate.id,
                    score: result.combined_score,
                });
            }
        }

        DuplicateOutcome {
            candidate: best,
            warnings: Vec::new(),
        }
    }
}

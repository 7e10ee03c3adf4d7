//! Dual persistence: the canonical copy is required, the owner copy is
//! best-effort.
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pipeline::draft::RecipeDraft;
use crate::pipeline::duplicate::DuplicateCandidate;
use crate::pipeline::merge;
use crate::scheduler::RequestContext;
use crate::store::RecipeStore;
use crate::store::models::RecipeRecord;
use crate::util::error::PipelineError;

#[derive(Debug)]
pub struct PersistResult {
    pub record: RecipeRecord,
    pub merged: bool,
    pub warnings: Vec<String>,
}

#[async_trait]
pub trait PersistStage: Send + Sync {
    /// Write the canonical copy (merging into a duplicate when one was
    /// found), then the caller-owned copy when requested. Only the
    /// canonical write can fail the run.
    async fn persist(
        &self,
        request: &RequestContext,
        draft: &RecipeDraft,
        duplicate: Option<DuplicateCandidate>,
    ) -> Result<PersistResult, PipelineError>;
}

pub struct StorePersistStage {
    store: Arc<dyn RecipeStore>,
}

impl StorePersistStage {
    #[must_use]
    pub fn new(store: Arc<dyn RecipeStore>) -> Self {
        Self { store }
    }

    /// Resolve what the canonical write should contain. A duplicate whose
    /// record has meanwhile disappeared degrades to a plain insert.
    async fn canonical_record(
        &self,
        draft: &RecipeDraft,
        duplicate: Option<DuplicateCandidate>,
        warnings: &mut Vec<String>,
    ) -> (RecipeRecord, bool) {
        if let Some(candidate) = duplicate {
            match self.store.fetch(candidate.existing_id).await {
                Ok(Some(existing)) => {
                    info!(
                        recipe_id = %draft.id,
                        existing_id = %existing.id,
                        score = candidate.score,
                        "merging into existing recipe"
                    );
                    return (merge::merge(draft, &existing), true);
                }
                Ok(None) => {
                    warnings.push(format!(
                        "duplicate {} vanished before merge, persisting as new",
                        candidate.existing_id
                    ));
                }
                Err(error) => {
                    warnings.push(format!(
                        "could not load duplicate {}: {error:#}, persisting as new",
                        candidate.existing_id
                    ));
                }
            }
        }

        (RecipeRecord::from_draft(draft, draft.id, None), false)
    }
}

#[async_trait]
impl PersistStage for StorePersistStage {
    async fn persist(
        &self,
        request: &RequestContext,
        draft: &RecipeDraft,
        duplicate: Option<DuplicateCandidate>,
    ) -> Result<PersistResult, PipelineError> {
        let mut warnings = Vec::new();

        let (canonical, merged) = self.canonical_record(draft, duplicate, &mut warnings).await;
        let record = self
            .store
            .upsert(canonical)
            .await
            .map_err(PipelineError::CanonicalPersist)?;

        if let Some(owner_id) = request.owner_id {
            if request.persist {
                let mut owner_copy = record.clone();
                owner_copy.id = Uuid::new_v4();
                owner_copy.owner_id = Some(owner_id);
                if let Err(error) = self.store.upsert(owner_copy).await {
                    warn!(
                        request_id = %request.request_id,
                        owner_id = %owner_id,
                        error = %error,
                        "owner copy write failed"
                    );
                    warnings.push(format!("owner copy not saved: {error:#}"));
                }
            }
        }

        Ok(PersistResult {
            record,
            merged,
            warnings,
        })
    }
}

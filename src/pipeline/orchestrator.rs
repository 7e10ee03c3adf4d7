//! Pipeline orchestrator and builder for the recipe generation pipeline.
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::cache::{CancellationToken, SnapshotCache};
use crate::clients::ContentGeneratorClient;
use crate::config::Config;
use crate::pipeline::categorize::KeywordCategorizer;
use crate::pipeline::content::{ContentStage, LlmContentStage};
use crate::pipeline::draft::RecipeDraft;
use crate::pipeline::duplicate::{DuplicateStage, StoreDuplicateStage};
use crate::pipeline::images::{self, ImageStage, QueueImageStage};
use crate::pipeline::persist::{PersistStage, StorePersistStage};
use crate::pipeline::quality::{LlmQualityStage, QualityStage};
use crate::pipeline::similarity::SimilarityEngine;
use crate::queue::ImageJobQueue;
use crate::scheduler::{JobPhase, JobTracker, RequestContext};
use crate::store::RecipeStore;
use crate::store::models::RecipeRecord;
use crate::util::error::PipelineError;

/// Terminal result of one pipeline run.
#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        record: RecipeRecord,
        warnings: Vec<String>,
    },
    Cancelled,
}

/// Container for all pipeline stages.
pub struct PipelineStages {
    pub(super) content: Arc<dyn ContentStage>,
    pub(super) quality: Arc<dyn QualityStage>,
    pub(super) duplicate: Arc<dyn DuplicateStage>,
    pub(super) images: Arc<dyn ImageStage>,
    pub(super) persist: Arc<dyn PersistStage>,
}

/// Coordinates the phases of one generation run. Cancellation is consulted
/// at every phase boundary; a run never stops mid-phase.
pub struct PipelineOrchestrator {
    stages: PipelineStages,
    categorizer: KeywordCategorizer,
    snapshots: Arc<SnapshotCache>,
    tracker: Arc<JobTracker>,
}

/// Builder pattern for constructing `PipelineOrchestrator`, used by tests
/// to swap individual stages for stubs.
pub struct PipelineBuilder {
    content: Option<Arc<dyn ContentStage>>,
    quality: Option<Arc<dyn QualityStage>>,
    duplicate: Option<Arc<dyn DuplicateStage>>,
    images: Option<Arc<dyn ImageStage>>,
    persist: Option<Arc<dyn PersistStage>>,
    snapshots: Arc<SnapshotCache>,
    tracker: Arc<JobTracker>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new(snapshots: Arc<SnapshotCache>, tracker: Arc<JobTracker>) -> Self {
        Self {
            content: None,
            quality: None,
            duplicate: None,
            images: None,
            persist: None,
            snapshots,
            tracker,
        }
    }

    #[must_use]
    pub fn with_content_stage(mut self, stage: Arc<dyn ContentStage>) -> Self {
        self.content = Some(stage);
        self
    }

    #[must_use]
    pub fn with_quality_stage(mut self, stage: Arc<dyn QualityStage>) -> Self {
        self.quality = Some(stage);
        self
    }

    #[must_use]
    pub fn with_duplicate_stage(mut self, stage: Arc<dyn DuplicateStage>) -> Self {
        self.duplicate = Some(stage);
        self
    }

    #[must_use]
    pub fn with_image_stage(mut self, stage: Arc<dyn ImageStage>) -> Self {
        self.images = Some(stage);
        self
    }

    #[must_use]
    pub fn with_persist_stage(mut self, stage: Arc<dyn PersistStage>) -> Self {
        self.persist = Some(stage);
        self
    }

    /// # Errors
    /// Returns an error when a required stage is missing or the categorizer
    /// fails to compile its keyword tables.
    pub fn build(self) -> Result<PipelineOrchestrator> {
        let missing = |name: &str| anyhow::anyhow!("pipeline builder missing {name} stage");
        Ok(PipelineOrchestrator {
            stages: PipelineStages {
                content: self.content.ok_or_else(|| missing("content"))?,
                quality: self.quality.ok_or_else(|| missing("quality"))?,
                duplicate: self.duplicate.ok_or_else(|| missing("duplicate"))?,
                images: self.images.ok_or_else(|| missing("images"))?,
                persist: self.persist.ok_or_else(|| missing("persist"))?,
            },
            categorizer: KeywordCategorizer::new()?,
            snapshots: self.snapshots,
            tracker: self.tracker,
        })
    }
}

impl PipelineOrchestrator {
    /// Wire the default stage implementations from configuration.
    pub fn new(
        config: &Config,
        content_client: Arc<ContentGeneratorClient>,
        store: Arc<dyn RecipeStore>,
        image_queue: Arc<ImageJobQueue>,
        snapshots: Arc<SnapshotCache>,
        tracker: Arc<JobTracker>,
    ) -> Result<Self> {
        let engine = SimilarityEngine::new(config.duplicate_threshold());

        PipelineBuilder::new(snapshots, tracker)
            .with_content_stage(Arc::new(LlmContentStage::new(Arc::clone(&content_client))))
            .with_quality_stage(Arc::new(LlmQualityStage::new(
                content_client,
                config.quality_threshold(),
            )))
            .with_duplicate_stage(Arc::new(StoreDuplicateStage::new(
                Arc::clone(&store),
                engine,
                config.duplicate_candidate_limit(),
            )))
            .with_image_stage(Arc::new(QueueImageStage::new(image_queue)))
            .with_persist_stage(Arc::new(StorePersistStage::new(store)))
            .build()
    }

    /// Execute the full pipeline for one request.
    ///
    /// Returns `Ok(Cancelled)` when a boundary check observes the flag;
    /// `Err` only for the fatal failures in `PipelineError`.
    pub async fn run(
        &self,
        request: &RequestContext,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, PipelineError> {
        let request_id = request.request_id;
        let mut warnings: Vec<String> = Vec::new();

        if !self.advance(request_id, JobPhase::GeneratingContent, cancel).await {
            return Ok(RunOutcome::Cancelled);
        }
        let mut draft = self.stages.content.generate(request).await?;
        info!(
            request_id = %request_id,
            recipe_id = %draft.id,
            steps = draft.steps.len(),
            "content generated"
        );
        self.snapshots.put(request_id, &draft).await;

        if !self.advance(request_id, JobPhase::QualityCheck, cancel).await {
            return Ok(RunOutcome::Cancelled);
        }
        match self.stages.quality.score(&draft).await {
            Ok(score) => {
                draft.quality_score = Some(score);
                if score < self.stages.quality.threshold() {
                    if !self.advance(request_id, JobPhase::Enhancing, cancel).await {
                        return Ok(RunOutcome::Cancelled);
                    }
                    self.enhance_once(&mut draft, score, &mut warnings).await;
                }
            }
            Err(error) => {
                warn!(request_id = %request_id, error = %error, "quality scoring failed");
                warnings.push(format!("quality scoring skipped: {error:#}"));
            }
        }
        self.snapshots.put(request_id, &draft).await;

        if !self.advance(request_id, JobPhase::Categorizing, cancel).await {
            return Ok(RunOutcome::Cancelled);
        }
        let classification = self.categorizer.classify(&draft);
        draft.category = Some(classification.category);
        draft.tags = classification.tags;
        self.snapshots.put(request_id, &draft).await;

        if !self.advance(request_id, JobPhase::DuplicateCheck, cancel).await {
            return Ok(RunOutcome::Cancelled);
        }
        let duplicate_outcome = self.stages.duplicate.check(&mut draft).await;
        warnings.extend(duplicate_outcome.warnings);

        if !self.advance(request_id, JobPhase::FanningOutImages, cancel).await {
            return Ok(RunOutcome::Cancelled);
        }
        let handles = self.stages.images.submit(request, &draft, cancel).await;

        if !self.advance(request_id, JobPhase::Aggregating, cancel).await {
            return Ok(RunOutcome::Cancelled);
        }
        warnings.extend(images::collect_into(&mut draft, handles).await);
        self.snapshots.put(request_id, &draft).await;

        if !self.advance(request_id, JobPhase::Persisting, cancel).await {
            return Ok(RunOutcome::Cancelled);
        }
        let persisted = self
            .stages
            .persist
            .persist(request, &draft, duplicate_outcome.candidate)
            .await?;
        warnings.extend(persisted.warnings);

        Ok(RunOutcome::Completed {
            record: persisted.record,
            warnings,
        })
    }

    /// Single enhancement pass; adopted unconditionally when structurally
    /// valid, then re-scored so the stored score describes the stored text.
    async fn enhance_once(&self, draft: &mut RecipeDraft, score: f64, warnings: &mut Vec<String>) {
        match self.stages.quality.enhance(draft, score).await {
            Ok(enhanced) => {
                *draft = enhanced;
                match self.stages.quality.score(draft).await {
                    Ok(rescore) => draft.quality_score = Some(rescore),
                    Err(error) => {
                        draft.quality_score = None;
                        warnings.push(format!("re-scoring after enhancement failed: {error:#}"));
                    }
                }
            }
            Err(error) => {
                warnings.push(format!("enhancement skipped: {error:#}"));
            }
        }
    }

    /// Boundary check: either the run moves to `phase` or it stops.
    async fn advance(
        &self,
        request_id: uuid::Uuid,
        phase: JobPhase,
        cancel: &CancellationToken,
    ) -> bool {
        if cancel.is_cancelled() {
            info!(request_id = %request_id, at_phase = phase.as_str(), "cancellation observed");
            return false;
        }
        self.tracker.set_phase(request_id, phase).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    use crate::cache::CancellationRegistry;
    use crate::pipeline::draft::StepDraft;
    use crate::pipeline::duplicate::DuplicateOutcome;
    use crate::pipeline::images::StepImageHandle;
    use crate::pipeline::persist::PersistResult;
    use crate::queue::StepImageOutcome;
    use crate::scheduler::SubscriptionTier;

    struct StubContent;

    #[async_trait]
    impl ContentStage for StubContent {
        async fn generate(&self, _request: &RequestContext) -> Result<RecipeDraft, PipelineError> {
            Ok(RecipeDraft {
                id: Uuid::new_v4(),
                title: "Margherita Pizza".to_string(),
                servings: 2,
                ingredients: vec!["flour".to_string(), "tomato sauce".to_string()],
                steps: vec![
                    StepDraft {
                        text: "Make the dough".to_string(),
                        illustration_prompt: "dough".to_string(),
                        image_url: None,
                    },
                    StepDraft {
                        text: "Bake until golden".to_string(),
                        illustration_prompt: "oven".to_string(),
                        image_url: None,
                    },
                ],
                nutrition: Default::default(),
                prep_time_minutes: Some(20),
                cook_time_minutes: Some(15),
                total_time_minutes: None,
                category: None,
                tags: vec![],
                quality_score: None,
                similarity_hash: None,
                thumbnail_url: None,
            })
        }
    }

    struct StubQuality {
        score: f64,
    }

    #[async_trait]
    impl QualityStage for StubQuality {
        fn threshold(&self) -> f64 {
            7.0
        }
        async fn score(&self, _draft: &RecipeDraft) -> Result<f64> {
            Ok(self.score)
        }
        async fn enhance(&self, draft: &RecipeDraft, _score: f64) -> Result<RecipeDraft> {
            let mut improved = draft.clone();
            improved.title = format!("Improved {}", draft.title);
            Ok(improved)
        }
    }

    struct StubDuplicate;

    #[async_trait]
    impl DuplicateStage for StubDuplicate {
        async fn check(&self, draft: &mut RecipeDraft) -> DuplicateOutcome {
            draft.similarity_hash = Some("stub-hash".to_string());
            DuplicateOutcome::default()
        }
    }

    struct StubImages {
        submissions: AtomicUsize,
    }

    #[async_trait]
    impl ImageStage for StubImages {
        async fn submit(
            &self,
            _request: &RequestContext,
            draft: &RecipeDraft,
            _cancel: &CancellationToken,
        ) -> Vec<StepImageHandle> {
            self.submissions.fetch_add(draft.steps.len(), Ordering::SeqCst);
            draft
                .steps
                .iter()
                .enumerate()
                .map(|(step_index, _)| {
                    let (sender, receiver) = tokio::sync::oneshot::channel();
                    let _ = sender.send(StepImageOutcome::success(
                        step_index,
                        format!("https://img/{step_index}.png"),
                    ));
                    StepImageHandle {
                        step_index,
                        receiver,
                    }
                })
                .collect()
        }
    }

    struct StubPersist;

    #[async_trait]
    impl PersistStage for StubPersist {
        async fn persist(
            &self,
            _request: &RequestContext,
            draft: &RecipeDraft,
            _duplicate: Option<crate::pipeline::duplicate::DuplicateCandidate>,
        ) -> Result<PersistResult, PipelineError> {
            Ok(PersistResult {
                record: RecipeRecord::from_draft(draft, draft.id, None),
                merged: false,
                warnings: vec![],
            })
        }
    }

    fn request() -> RequestContext {
        RequestContext {
            request_id: Uuid::new_v4(),
            query: "margherita pizza".to_string(),
            preferences: None,
            tier: SubscriptionTier::Free,
            owner_id: None,
            persist: false,
            progressive: true,
        }
    }

    fn orchestrator_with(
        images: Arc<StubImages>,
        quality_score: f64,
        tracker: Arc<JobTracker>,
    ) -> PipelineOrchestrator {
        PipelineBuilder::new(Arc::new(SnapshotCache::new(None)), tracker)
            .with_content_stage(Arc::new(StubContent))
            .with_quality_stage(Arc::new(StubQuality {
                score: quality_score,
            }))
            .with_duplicate_stage(Arc::new(StubDuplicate))
            .with_image_stage(images)
            .with_persist_stage(Arc::new(StubPersist))
            .build()
            .expect("orchestrator builds")
    }

    #[tokio::test]
    async fn full_run_completes_with_images_and_category() {
        let images = Arc::new(StubImages {
            submissions: AtomicUsize::new(0),
        });
        let tracker = Arc::new(JobTracker::new());
        let orchestrator = orchestrator_with(images.clone(), 8.0, tracker.clone());

        let request = request();
        let registry = Arc::new(CancellationRegistry::new());
        registry.register(request.request_id);
        tracker.insert_queued(request.request_id).await;

        let outcome = orchestrator
            .run(&request, &registry.token(request.request_id))
            .await
            .expect("run succeeds");

        let RunOutcome::Completed { record, warnings } = outcome else {
            panic!("expected completed outcome");
        };
        assert!(warnings.is_empty());
        assert_eq!(images.submissions.load(Ordering::SeqCst), 2);
        assert_eq!(record.steps[0].image_url.as_deref(), Some("https://img/0.png"));
        assert_eq!(record.category.as_deref(), Some("pizza"));
        assert_eq!(record.quality_score, Some(8.0));
        assert!(record.thumbnail_url.is_some());
    }

    #[tokio::test]
    async fn low_score_triggers_single_enhancement() {
        let images = Arc::new(StubImages {
            submissions: AtomicUsize::new(0),
        });
        let tracker = Arc::new(JobTracker::new());
        let orchestrator = orchestrator_with(images, 5.5, tracker.clone());

        let request = request();
        let registry = Arc::new(CancellationRegistry::new());
        registry.register(request.request_id);
        tracker.insert_queued(request.request_id).await;

        let outcome = orchestrator
            .run(&request, &registry.token(request.request_id))
            .await
            .expect("run succeeds");

        let RunOutcome::Completed { record, .. } = outcome else {
            panic!("expected completed outcome");
        };
        assert!(record.title.starts_with("Improved"));
        // The enhanced draft is adopted even though its re-score is still
        // below the threshold.
        assert_eq!(record.quality_score, Some(5.5));
    }

    #[tokio::test]
    async fn cancellation_before_fan_out_submits_nothing() {
        let images = Arc::new(StubImages {
            submissions: AtomicUsize::new(0),
        });
        let tracker = Arc::new(JobTracker::new());

        struct CancellingDuplicate {
            registry: Arc<CancellationRegistry>,
            request_id: Uuid,
        }

        #[async_trait]
        impl DuplicateStage for CancellingDuplicate {
            async fn check(&self, _draft: &mut RecipeDraft) -> DuplicateOutcome {
                // Cancel while the duplicate check is in flight; the next
                // boundary check must stop the run.
                self.registry.cancel(self.request_id);
                DuplicateOutcome::default()
            }
        }

        let request = request();
        let registry = Arc::new(CancellationRegistry::new());
        registry.register(request.request_id);
        tracker.insert_queued(request.request_id).await;

        let orchestrator = PipelineBuilder::new(Arc::new(SnapshotCache::new(None)), tracker)
            .with_content_stage(Arc::new(StubContent))
            .with_quality_stage(Arc::new(StubQuality { score: 8.0 }))
            .with_duplicate_stage(Arc::new(CancellingDuplicate {
                registry: registry.clone(),
                request_id: request.request_id,
            }))
            .with_image_stage(images.clone())
            .with_persist_stage(Arc::new(StubPersist))
            .build()
            .expect("orchestrator builds");

        let outcome = orchestrator
            .run(&request, &registry.token(request.request_id))
            .await
            .expect("run returns");

        assert!(matches!(outcome, RunOutcome::Cancelled));
        assert_eq!(images.submissions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_stage_fails_the_builder() {
        let result = PipelineBuilder::new(
            Arc::new(SnapshotCache::new(None)),
            Arc::new(JobTracker::new()),
        )
        .with_content_stage(Arc::new(StubContent))
        .build();
        assert!(result.is_err());
    }
}

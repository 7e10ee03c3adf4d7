//! Image fan-out and fan-in around the sub-job queue.
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::oneshot;
use tracing::info;

use crate::cache::CancellationToken;
use crate::pipeline::draft::RecipeDraft;
use crate::queue::{ImageJobQueue, StepImageOutcome, StepImageTask};
use crate::scheduler::RequestContext;

/// Pending completion for one step's image sub-job.
pub struct StepImageHandle {
    pub step_index: usize,
    pub receiver: oneshot::Receiver<StepImageOutcome>,
}

#[async_trait]
pub trait ImageStage: Send + Sync {
    /// Enqueue one sub-job per step, all before any completion is awaited,
    /// so the pool works the whole recipe in parallel.
    async fn submit(
        &self,
        request: &RequestContext,
        draft: &RecipeDraft,
        cancel: &CancellationToken,
    ) -> Vec<StepImageHandle>;
}

pub struct QueueImageStage {
    queue: Arc<ImageJobQueue>,
}

impl QueueImageStage {
    #[must_use]
    pub fn new(queue: Arc<ImageJobQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl ImageStage for QueueImageStage {
    async fn submit(
        &self,
        request: &RequestContext,
        draft: &RecipeDraft,
        cancel: &CancellationToken,
    ) -> Vec<StepImageHandle> {
        let mut handles = Vec::with_capacity(draft.steps.len());
        for (step_index, step) in draft.steps.iter().enumerate() {
            let task = StepImageTask {
                request_id: request.request_id,
                recipe_id: draft.id,
                step_index,
                prompt: step.illustration_prompt.clone(),
                tier: request.tier,
                progressive: request.progressive,
            };
            let receiver = self.queue.submit(task, cancel.clone()).await;
            handles.push(StepImageHandle {
                step_index,
                receiver,
            });
        }

        info!(
            request_id = %request.request_id,
            recipe_id = %draft.id,
            sub_jobs = handles.len(),
            "image sub-jobs fanned out"
        );
        handles
    }
}

/// Await every sub-job and fold the results into the draft. A step whose
/// sub-job failed keeps `image_url = None` and contributes a warning; the
/// first successful image becomes the thumbnail.
pub async fn collect_into(draft: &mut RecipeDraft, handles: Vec<StepImageHandle>) -> Vec<String> {
    let mut warnings = Vec::new();

    let indices: Vec<usize> = handles.iter().map(|handle| handle.step_index).collect();
    let outcomes = join_all(handles.into_iter().map(|handle| handle.receiver)).await;

    for (step_index, outcome) in indices.into_iter().zip(outcomes) {
        match outcome {
            Ok(StepImageOutcome {
                result: Ok(url), ..
            }) => {
                if let Some(step) = draft.steps.get_mut(step_index) {
                    step.image_url = Some(url);
                }
            }
            Ok(StepImageOutcome {
                result: Err(error), ..
            }) => {
                warnings.push(format!("step {step_index} image failed: {error}"));
            }
            Err(_) => {
                warnings.push(format!("step {step_index} image sub-job was dropped"));
            }
        }
    }

    if draft.thumbnail_url.is_none() {
        draft.thumbnail_url = draft
            .steps
            .iter()
            .find_map(|step| step.image_url.clone());
    }

    warnings
}

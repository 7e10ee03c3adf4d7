use tokio::sync::oneshot;
use uuid::Uuid;

use crate::cache::CancellationToken;
use crate::scheduler::SubscriptionTier;

/// One image sub-job: illustrate a single recipe step.
#[derive(Debug, Clone)]
pub struct StepImageTask {
    pub request_id: Uuid,
    pub recipe_id: Uuid,
    pub step_index: usize,
    pub prompt: String,
    pub tier: SubscriptionTier,
    pub progressive: bool,
}

/// Terminal result of one image sub-job.
#[derive(Debug)]
pub struct StepImageOutcome {
    pub step_index: usize,
    pub result: Result<String, String>,
}

impl StepImageOutcome {
    #[must_use]
    pub fn success(step_index: usize, url: String) -> Self {
        Self {
            step_index,
            result: Ok(url),
        }
    }

    #[must_use]
    pub fn failure(step_index: usize, error: impl Into<String>) -> Self {
        Self {
            step_index,
            result: Err(error.into()),
        }
    }
}

/// Task plus the channel its completion is reported on.
pub(crate) struct QueuedImageTask {
    pub(crate) task: StepImageTask,
    pub(crate) cancel: CancellationToken,
    pub(crate) completion: oneshot::Sender<StepImageOutcome>,
}

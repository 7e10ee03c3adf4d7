//! Job bookkeeping and the bounded scheduler that drives pipeline runs.
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{RwLock, Semaphore};
use uuid::Uuid;

use crate::cache::{CancellationRegistry, SnapshotCache};
use crate::pipeline::orchestrator::{PipelineOrchestrator, RunOutcome};

/// Caller subscription tier, controls image generation quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Basic,
    Premium,
}

/// Everything a single generation run needs to know about its caller.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub query: String,
    pub preferences: Option<Value>,
    pub tier: SubscriptionTier,
    pub owner_id: Option<Uuid>,
    pub persist: bool,
    pub progressive: bool,
}

/// Pipeline phase as observed from outside.
///
/// `Unknown` never appears in the tracker; it is the status reported for a
/// request id with no tracked job (for example after a restart, when only
/// a durable snapshot survives).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Unknown,
    Queued,
    GeneratingContent,
    QualityCheck,
    Enhancing,
    Categorizing,
    DuplicateCheck,
    FanningOutImages,
    Aggregating,
    Persisting,
    Completed,
    Failed,
    Cancelled,
}

impl JobPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobPhase::Unknown => "unknown",
            JobPhase::Queued => "queued",
            JobPhase::GeneratingContent => "generating_content",
            JobPhase::QualityCheck => "quality_check",
            JobPhase::Enhancing => "enhancing",
            JobPhase::Categorizing => "categorizing",
            JobPhase::DuplicateCheck => "duplicate_check",
            JobPhase::FanningOutImages => "fanning_out_images",
            JobPhase::Aggregating => "aggregating",
            JobPhase::Persisting => "persisting",
            JobPhase::Completed => "completed",
            JobPhase::Failed => "failed",
            JobPhase::Cancelled => "cancelled",
        }
    }

    /// Coarse progress estimate. Aggregation is refined by the status
    /// endpoint from the snapshot's per-step completion.
    #[must_use]
    pub fn base_progress(self) -> u8 {
        match self {
            JobPhase::Unknown | JobPhase::Queued => 0,
            JobPhase::GeneratingContent => 10,
            JobPhase::QualityCheck => 30,
            JobPhase::Enhancing => 35,
            JobPhase::Categorizing => 45,
            JobPhase::DuplicateCheck => 55,
            JobPhase::FanningOutImages | JobPhase::Aggregating => 60,
            JobPhase::Persisting => 95,
            JobPhase::Completed | JobPhase::Failed | JobPhase::Cancelled => 100,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobPhase::Completed | JobPhase::Failed | JobPhase::Cancelled
        )
    }
}

/// Tracker entry for one submitted request. Terminal entries are retained
/// so status polls can still answer after the run finishes.
#[derive(Debug, Clone)]
pub struct TrackedJob {
    pub phase: JobPhase,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub recipe_id: Option<Uuid>,
}

impl TrackedJob {
    fn queued() -> Self {
        Self {
            phase: JobPhase::Queued,
            warnings: Vec::new(),
            error: None,
            recipe_id: None,
        }
    }
}

/// In-memory phase registry shared between the scheduler, the orchestrator,
/// and the HTTP handlers.
#[derive(Debug, Default)]
pub struct JobTracker {
    entries: RwLock<HashMap<Uuid, TrackedJob>>,
}

impl JobTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_queued(&self, request_id: Uuid) {
        self.entries
            .write()
            .await
            .insert(request_id, TrackedJob::queued());
    }

    pub async fn set_phase(&self, request_id: Uuid, phase: JobPhase) {
        if let Some(entry) = self.entries.write().await.get_mut(&request_id) {
            entry.phase = phase;
        }
    }

    pub async fn finish_completed(
        &self,
        request_id: Uuid,
        recipe_id: Uuid,
        warnings: Vec<String>,
    ) {
        if let Some(entry) = self.entries.write().await.get_mut(&request_id) {
            entry.phase = JobPhase::Completed;
            entry.recipe_id = Some(recipe_id);
            entry.warnings = warnings;
        }
    }

    pub async fn finish_failed(&self, request_id: Uuid, error: String) {
        if let Some(entry) = self.entries.write().await.get_mut(&request_id) {
            entry.phase = JobPhase::Failed;
            entry.error = Some(error);
        }
    }

    pub async fn finish_cancelled(&self, request_id: Uuid) {
        if let Some(entry) = self.entries.write().await.get_mut(&request_id) {
            entry.phase = JobPhase::Cancelled;
        }
    }

    pub async fn get(&self, request_id: Uuid) -> Option<TrackedJob> {
        self.entries.read().await.get(&request_id).cloned()
    }
}

/// Drives accepted requests through the pipeline under a bounded
/// concurrency budget. Excess submissions wait for a permit while their
/// jobs report `queued`.
#[derive(Clone)]
pub struct Scheduler {
    pipeline: Arc<PipelineOrchestrator>,
    tracker: Arc<JobTracker>,
    snapshots: Arc<SnapshotCache>,
    cancellations: Arc<CancellationRegistry>,
    permits: Arc<Semaphore>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        pipeline: Arc<PipelineOrchestrator>,
        tracker: Arc<JobTracker>,
        snapshots: Arc<SnapshotCache>,
        cancellations: Arc<CancellationRegistry>,
        concurrency: usize,
    ) -> Self {
        Self {
            pipeline,
            tracker,
            snapshots,
            cancellations,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Accept a request and spawn its run. Returns immediately; progress is
    /// observable through the tracker.
    pub async fn submit(&self, request: RequestContext) {
        let request_id = request.request_id;
        self.cancellations.register(request_id);
        self.tracker.insert_queued(request_id).await;

        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_job(request).await;
        });

        tracing::info!(request_id = %request_id, "recipe generation job accepted");
    }

    /// Request cooperative cancellation. Returns false for unknown or
    /// already-terminal jobs.
    pub async fn cancel(&self, request_id: Uuid) -> bool {
        match self.tracker.get(request_id).await {
            Some(entry) if !entry.phase.is_terminal() => self.cancellations.cancel(request_id),
            _ => false,
        }
    }

    async fn run_job(&self, request: RequestContext) {
        let request_id = request.request_id;

        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // Semaphore closed during shutdown.
                self.tracker
                    .finish_failed(request_id, "scheduler shut down".to_string())
                    .await;
                return;
            }
        };

        let token = self.cancellations.token(request_id);
        let outcome = self.pipeline.run(&request, &token).await;
        drop(permit);

        match outcome {
            Ok(RunOutcome::Completed { record, warnings }) => {
                tracing::info!(
                    request_id = %request_id,
                    recipe_id = %record.id,
                    warnings = warnings.len(),
                    "recipe generation completed"
                );
                self.tracker
                    .finish_completed(request_id, record.id, warnings)
                    .await;
            }
            Ok(RunOutcome::Cancelled) => {
                tracing::info!(request_id = %request_id, "recipe generation cancelled");
                self.tracker.finish_cancelled(request_id).await;
            }
            Err(error) => {
                tracing::error!(request_id = %request_id, error = %error, "recipe generation failed");
                self.tracker
                    .finish_failed(request_id, error.to_string())
                    .await;
            }
        }

        self.snapshots.clear(request_id).await;
        self.cancellations.cleanup(request_id);
    }
}

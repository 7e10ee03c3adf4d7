//! Executes one image sub-job: generate, download, upload, each phase with
//! its own bounded retry budget.
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::types::{StepImageOutcome, StepImageTask};
use crate::cache::{CancellationToken, SnapshotCache};
use crate::clients::image_provider::ImageQuality;
use crate::clients::{BlobStoreClient, ImageProviderClient};
use crate::util::error::is_retryable;
use crate::util::retry::RetryConfig;

pub struct ImageJobRunner {
    image_provider: ImageProviderClient,
    blob_store: BlobStoreClient,
    snapshots: Arc<SnapshotCache>,
    retry: RetryConfig,
}

impl ImageJobRunner {
    #[must_use]
    pub fn new(
        image_provider: ImageProviderClient,
        blob_store: BlobStoreClient,
        snapshots: Arc<SnapshotCache>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            image_provider,
            blob_store,
            snapshots,
            retry,
        }
    }

    /// Run the three phases in order. A phase that exhausts its retries
    /// fails the whole sub-job; later phases are never attempted.
    pub async fn execute(&self, task: &StepImageTask, cancel: &CancellationToken) -> StepImageOutcome {
        let outcome = match self.run_phases(task).await {
            Ok(url) => StepImageOutcome::success(task.step_index, url),
            Err(error) => {
                warn!(
                    request_id = %task.request_id,
                    step_index = task.step_index,
                    error = %error,
                    "image sub-job failed"
                );
                StepImageOutcome::failure(task.step_index, format!("{error:#}"))
            }
        };

        // A cancelled parent must not see step results appear after the
        // fact, so the snapshot write is skipped once cancellation is set.
        if task.progressive && !cancel.is_cancelled() {
            let image_url = outcome.result.as_ref().ok().cloned();
            self.snapshots
                .put_step_result(task.request_id, task.step_index, image_url)
                .await;
        }

        outcome
    }

    async fn run_phases(&self, task: &StepImageTask) -> Result<String> {
        let quality = ImageQuality::for_tier(task.tier);

        let provider = self.image_provider.clone();
        let prompt = task.prompt.clone();
        let temporary_url = self
            .run_phase(task, "generate", move || {
                let provider = provider.clone();
                let prompt = prompt.clone();
                async move { provider.generate(&prompt, quality).await }
            })
            .await?;

        let provider = self.image_provider.clone();
        let download_url = temporary_url.clone();
        let bytes = self
            .run_phase(task, "download", move || {
                let provider = provider.clone();
                let url = download_url.clone();
                async move { provider.download(&url).await }
            })
            .await?;

        let blob_store = self.blob_store.clone();
        let blob_path = format!("recipes/{}/{}.png", task.recipe_id, task.step_index);
        let permanent_url = self
            .run_phase(task, "upload", move || {
                let blob_store = blob_store.clone();
                let bytes = bytes.clone();
                let path = blob_path.clone();
                async move { blob_store.upload(bytes, &path, "image/png").await }
            })
            .await?;

        Ok(permanent_url)
    }

    /// Retry loop for one phase. The attempt counter resets per phase;
    /// only transient errors consume further attempts.
    async fn run_phase<T, F, Fut>(
        &self,
        task: &StepImageTask,
        phase: &'static str,
        mut attempt_fn: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0_usize;
        loop {
            attempts += 1;
            let delay = self.retry.delay_before_attempt(attempts);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match attempt_fn().await {
                Ok(value) => {
                    debug!(
                        request_id = %task.request_id,
                        step_index = task.step_index,
                        phase,
                        attempts,
                        "image phase succeeded"
                    );
                    return Ok(value);
                }
                Err(error) => {
                    if is_retryable(&error) && self.retry.can_retry(attempts) {
                        warn!(
                            request_id = %task.request_id,
                            step_index = task.step_index,
                            phase,
                            attempts,
                            error = %error,
                            "image phase attempt failed, retrying"
                        );
                        continue;
                    }
                    return Err(error).with_context(|| {
                        format!("{phase} phase failed after {attempts} attempt(s)")
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::cache::CancellationRegistry;
    use crate::scheduler::SubscriptionTier;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 10,
        }
    }

    fn runner_for(server: &MockServer) -> (ImageJobRunner, Arc<SnapshotCache>) {
        let snapshots = Arc::new(SnapshotCache::new(None));
        let runner = ImageJobRunner::new(
            ImageProviderClient::new(server.uri(), TIMEOUT).expect("provider builds"),
            BlobStoreClient::new(server.uri(), TIMEOUT).expect("blob store builds"),
            snapshots.clone(),
            fast_retry(),
        );
        (runner, snapshots)
    }

    fn task(progressive: bool) -> StepImageTask {
        StepImageTask {
            request_id: Uuid::new_v4(),
            recipe_id: Uuid::new_v4(),
            step_index: 0,
            prompt: "dough on a counter".to_string(),
            tier: SubscriptionTier::Free,
            progressive,
        }
    }

    fn token_for(task: &StepImageTask) -> CancellationToken {
        let registry = Arc::new(CancellationRegistry::new());
        registry.register(task.request_id);
        registry.token(task.request_id)
    }

    fn one_step_draft() -> crate::pipeline::draft::RecipeDraft {
        crate::pipeline::draft::RecipeDraft {
            id: Uuid::new_v4(),
            title: "Test".into(),
            servings: 2,
            ingredients: vec!["salt".into()],
            steps: vec![crate::pipeline::draft::StepDraft {
                text: "step".into(),
                illustration_prompt: "prompt".into(),
                image_url: None,
            }],
            nutrition: Default::default(),
            prep_time_minutes: None,
            cook_time_minutes: None,
            total_time_minutes: None,
            category: None,
            tags: vec![],
            quality_score: None,
            similarity_hash: None,
            thumbnail_url: None,
        }
    }

    #[tokio::test]
    async fn happy_path_returns_permanent_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": format!("{}/tmp/step.png", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tmp/step.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": "https://cdn.example/final.png"
            })))
            .mount(&server)
            .await;

        let (runner, _snapshots) = runner_for(&server);
        let task = task(false);
        let cancel = token_for(&task);

        let outcome = runner.execute(&task, &cancel).await;
        assert_eq!(outcome.result.as_deref().expect("succeeds"), "https://cdn.example/final.png");
    }

    #[tokio::test]
    async fn generation_failure_skips_later_phases() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generate"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;
        // No GET/PUT mocks mounted: a download or upload attempt would 404
        // and the expect(3) above would still catch extra generate calls.

        let (runner, _snapshots) = runner_for(&server);
        let task = task(false);
        let cancel = token_for(&task);

        let outcome = runner.execute(&task, &cancel).await;
        let error = outcome.result.expect_err("should fail");
        assert!(error.contains("generate phase"));
    }

    #[tokio::test]
    async fn transient_failure_is_retried_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generate"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": format!("{}/tmp/step.png", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tmp/step.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": "https://cdn.example/final.png"
            })))
            .mount(&server)
            .await;

        let (runner, _snapshots) = runner_for(&server);
        let task = task(false);
        let cancel = token_for(&task);

        let outcome = runner.execute(&task, &cancel).await;
        assert!(outcome.result.is_ok());
    }

    #[tokio::test]
    async fn progressive_success_writes_snapshot_step() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": format!("{}/tmp/step.png", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tmp/step.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": "https://cdn.example/final.png"
            })))
            .mount(&server)
            .await;

        let (runner, snapshots) = runner_for(&server);
        let task = task(true);
        let cancel = token_for(&task);

        // Seed a snapshot with one step so the step write has a target.
        snapshots.put(task.request_id, &one_step_draft()).await;

        runner.execute(&task, &cancel).await;

        let snapshot = snapshots.get(task.request_id).await.expect("snapshot present");
        assert_eq!(
            snapshot.steps[0].image_url.as_deref(),
            Some("https://cdn.example/final.png")
        );
    }

    #[tokio::test]
    async fn cancelled_parent_suppresses_snapshot_write() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": format!("{}/tmp/step.png", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tmp/step.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "url": "https://cdn.example/final.png"
            })))
            .mount(&server)
            .await;

        let (runner, snapshots) = runner_for(&server);
        let task = task(true);

        let registry = Arc::new(CancellationRegistry::new());
        registry.register(task.request_id);
        let cancel = registry.token(task.request_id);

        snapshots.put(task.request_id, &one_step_draft()).await;

        registry.cancel(task.request_id);
        runner.execute(&task, &cancel).await;

        let snapshot = snapshots.get(task.request_id).await.expect("snapshot present");
        assert!(snapshot.steps[0].image_url.is_none());
    }
}

//! In-process queue feeding a fixed pool of image workers.
//!
//! Sub-jobs are submitted with a completion channel; a bounded mpsc channel
//! holds pending tasks and the worker pool drains it independently of the
//! orchestrator pool, so image work for one request never starves pipeline
//! progress on another.
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

mod types;
mod worker;

pub use types::{StepImageOutcome, StepImageTask};
use types::QueuedImageTask;
pub use worker::ImageJobRunner;

use crate::cache::CancellationToken;

pub struct ImageJobQueue {
    sender: mpsc::Sender<QueuedImageTask>,
    workers: Vec<JoinHandle<()>>,
}

impl ImageJobQueue {
    /// Spawn `concurrency` workers draining a channel of `capacity` slots.
    #[must_use]
    pub fn new(runner: ImageJobRunner, concurrency: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<QueuedImageTask>(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let runner = Arc::new(runner);

        let mut workers = Vec::with_capacity(concurrency.max(1));
        for worker_id in 0..concurrency.max(1) {
            let receiver = receiver.clone();
            let runner = runner.clone();
            workers.push(tokio::spawn(async move {
                debug!(worker_id, "image worker started");
                loop {
                    let queued = {
                        let mut receiver = receiver.lock().await;
                        receiver.recv().await
                    };
                    let Some(queued) = queued else {
                        debug!(worker_id, "image worker stopping, queue closed");
                        break;
                    };

                    let outcome = runner.execute(&queued.task, &queued.cancel).await;
                    // The orchestrator may have stopped waiting; a dropped
                    // receiver is not an error.
                    let _ = queued.completion.send(outcome);
                }
            }));
        }

        info!(concurrency, capacity, "image job queue initialized");

        Self { sender, workers }
    }

    /// Enqueue one sub-job. The returned channel resolves with the terminal
    /// outcome; it errors if the queue shuts down first.
    pub async fn submit(
        &self,
        task: StepImageTask,
        cancel: CancellationToken,
    ) -> oneshot::Receiver<StepImageOutcome> {
        let (completion, receiver) = oneshot::channel();
        let step_index = task.step_index;
        let request_id = task.request_id;

        let queued = QueuedImageTask {
            task,
            cancel,
            completion,
        };
        if let Err(error) = self.sender.send(queued).await {
            warn!(
                request_id = %request_id,
                step_index,
                "image queue closed, dropping sub-job"
            );
            // Complete immediately so the aggregation side never hangs.
            let _ = error.0.completion.send(StepImageOutcome::failure(
                step_index,
                "image queue unavailable",
            ));
        }

        receiver
    }

    /// Stop accepting work and abort the worker pool.
    pub fn shutdown(&mut self) {
        for handle in self.workers.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for ImageJobQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

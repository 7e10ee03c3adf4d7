//! Progressive-result cache backing the status endpoint.
//!
//! Two tiers: a shared primary store (database-backed in production) and a
//! local in-process map. The primary is tried first; when it is unavailable
//! the cache degrades to the local map instead of failing the request, so
//! progressive polling keeps working within a single process.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;
use uuid::Uuid;

use crate::pipeline::draft::RecipeDraft;

/// Shared snapshot persistence, keyed by request id.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn put(&self, request_id: Uuid, draft: &RecipeDraft) -> Result<()>;
    async fn get(&self, request_id: Uuid) -> Result<Option<RecipeDraft>>;
    async fn clear(&self, request_id: Uuid) -> Result<()>;
}

pub struct SnapshotCache {
    primary: Option<Arc<dyn SnapshotStore>>,
    local: RwLock<HashMap<Uuid, RecipeDraft>>,
    // Per-request write serialization for step results; see put_step_result.
    step_locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl SnapshotCache {
    #[must_use]
    pub fn new(primary: Option<Arc<dyn SnapshotStore>>) -> Self {
        Self {
            primary,
            local: RwLock::new(HashMap::new()),
            step_locks: Mutex::new(HashMap::new()),
        }
    }

    fn step_lock(&self, request_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.step_locks.lock().expect("step lock registry poisoned");
        Arc::clone(locks.entry(request_id).or_default())
    }

    async fn primary_get(&self, request_id: Uuid) -> Option<RecipeDraft> {
        let primary = self.primary.as_ref()?;
        match primary.get(request_id).await {
            Ok(draft) => draft,
            Err(error) => {
                warn!(%request_id, error = %error, "snapshot primary read failed, using local tier");
                None
            }
        }
    }

    /// Store the latest known-good draft for a request.
    ///
    /// The local tier is written through unconditionally so reads keep
    /// working if the primary becomes unavailable later.
    pub async fn put(&self, request_id: Uuid, draft: &RecipeDraft) {
        if let Some(primary) = &self.primary {
            if let Err(error) = primary.put(request_id, draft).await {
                warn!(%request_id, error = %error, "snapshot primary write failed, using local tier");
            }
        }

        self.local
            .write()
            .expect("snapshot lock poisoned")
            .insert(request_id, draft.clone());
    }

    /// Record one step's image outcome. `None` marks a step whose sub-job
    /// exhausted its retries, distinct from a step not yet attempted.
    ///
    /// Step writes only ever touch their own index. The local entry is the
    /// merge authority: it is mutated in place under its write lock, and
    /// writes for the same request are serialized so two sub-jobs finishing
    /// together cannot clobber each other through a read-modify-write of
    /// the whole draft.
    pub async fn put_step_result(
        &self,
        request_id: Uuid,
        step_index: usize,
        image_url: Option<String>,
    ) {
        let lock = self.step_lock(request_id);
        let _guard = lock.lock().await;

        let local_entry_missing = !self
            .local
            .read()
            .expect("snapshot lock poisoned")
            .contains_key(&request_id);
        if local_entry_missing {
            // Fresh process: rebuild the local entry from the primary tier.
            let Some(draft) = self.primary_get(request_id).await else {
                warn!(%request_id, step_index, "no snapshot to record step result into");
                return;
            };
            self.local
                .write()
                .expect("snapshot lock poisoned")
                .entry(request_id)
                .or_insert(draft);
        }

        let merged = {
            let mut local = self.local.write().expect("snapshot lock poisoned");
            let Some(draft) = local.get_mut(&request_id) else {
                warn!(%request_id, step_index, "no snapshot to record step result into");
                return;
            };
            let Some(step) = draft.steps.get_mut(step_index) else {
                warn!(%request_id, step_index, "step index out of range for snapshot");
                return;
            };
            step.image_url = image_url;
            draft.clone()
        };

        if let Some(primary) = &self.primary {
            if let Err(error) = primary.put(request_id, &merged).await {
                warn!(%request_id, error = %error, "snapshot primary write failed, using local tier");
            }
        }
    }

    pub async fn get(&self, request_id: Uuid) -> Option<RecipeDraft> {
        if let Some(draft) = self.primary_get(request_id).await {
            return Some(draft);
        }

        self.local
            .read()
            .expect("snapshot lock poisoned")
            .get(&request_id)
            .cloned()
    }

    /// Remove the snapshot for a request. Idempotent: clearing an absent
    /// entry is a no-op, and primary failures are logged, not surfaced.
    pub async fn clear(&self, request_id: Uuid) {
        if let Some(primary) = &self.primary {
            if let Err(error) = primary.clear(request_id).await {
                warn!(%request_id, error = %error, "snapshot primary clear failed");
            }
        }

        self.local
            .write()
            .expect("snapshot lock poisoned")
            .remove(&request_id);
        self.step_locks
            .lock()
            .expect("step lock registry poisoned")
            .remove(&request_id);
    }
}

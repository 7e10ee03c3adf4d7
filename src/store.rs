use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub mod dao;
pub mod memory;
pub mod models;

use models::RecipeRecord;

/// Canonical recipe persistence, consumed by the duplicate check and the
/// persist stage.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Bounded shortlist of duplicate candidates: global recipes whose title
    /// loosely matches the hint or whose similarity hash matches exactly.
    async fn find_candidates(
        &self,
        title_hint: &str,
        similarity_hash: &str,
        limit: usize,
    ) -> Result<Vec<RecipeRecord>>;

    async fn fetch(&self, id: Uuid) -> Result<Option<RecipeRecord>>;

    /// Insert or replace a record under its own id.
    async fn upsert(&self, record: RecipeRecord) -> Result<RecipeRecord>;
}

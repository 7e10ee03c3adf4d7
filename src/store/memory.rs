//! In-memory recipe store used by tests and local development.
use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::util::text;

use super::RecipeStore;
use super::models::RecipeRecord;

#[derive(Debug, Default)]
pub struct InMemoryRecipeStore {
    records: RwLock<HashMap<Uuid, RecipeRecord>>,
}

impl InMemoryRecipeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, for test assertions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().expect("store lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First record owned by the given caller, for test assertions.
    pub async fn fetch_by_owner(&self, owner_id: Uuid) -> Option<RecipeRecord> {
        let records = self.records.read().expect("store lock poisoned");
        records
            .values()
            .find(|record| record.owner_id == Some(owner_id))
            .cloned()
    }
}

#[async_trait]
impl RecipeStore for InMemoryRecipeStore {
    async fn find_candidates(
        &self,
        title_hint: &str,
        similarity_hash: &str,
        limit: usize,
    ) -> Result<Vec<RecipeRecord>> {
        let hint = text::normalize(title_hint);
        let records = self.records.read().expect("store lock poisoned");

        let mut candidates: Vec<RecipeRecord> = records
            .values()
            .filter(|record| record.owner_id.is_none())
            .filter(|record| {
                let title = text::normalize(&record.title);
                let hash_match = record
                    .similarity_hash
                    .as_deref()
                    .is_some_and(|hash| hash == similarity_hash);
                hash_match || title.contains(&hint) || hint.contains(&title)
            })
            .cloned()
            .collect();

        candidates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<RecipeRecord>> {
        let records = self.records.read().expect("store lock poisoned");
        Ok(records.get(&id).cloned())
    }

    async fn upsert(&self, record: RecipeRecord) -> Result<RecipeRecord> {
        let mut records = self.records.write().expect("store lock poisoned");
        records.insert(record.id, record.clone());
        Ok(record)
    }
}

//! Postgres-backed recipe store and snapshot primary tier.
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::cache::snapshot::SnapshotStore;
use crate::pipeline::draft::{NutritionFacts, RecipeDraft, StepDraft};

use super::RecipeStore;
use super::models::RecipeRecord;

#[derive(Debug, Clone)]
pub struct PgRecipeStore {
    pool: PgPool,
}

impl PgRecipeStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> Result<RecipeRecord> {
    let servings: i32 = row.try_get("servings").context("servings column")?;
    let prep: Option<i32> = row.try_get("prep_time_minutes").context("prep column")?;
    let cook: Option<i32> = row.try_get("cook_time_minutes").context("cook column")?;
    let total: Option<i32> = row.try_get("total_time_minutes").context("total column")?;
    let ingredients: Json<Vec<String>> = row.try_get("ingredients").context("ingredients column")?;
    let steps: Json<Vec<StepDraft>> = row.try_get("steps").context("steps column")?;
    let nutrition: Json<NutritionFacts> = row.try_get("nutrition").context("nutrition column")?;
    let tags: Json<Vec<String>> = row.try_get("tags").context("tags column")?;
    let created_at: DateTime<Utc> = row.try_get("created_at").context("created_at column")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").context("updated_at column")?;

    Ok(RecipeRecord {
        id: row.try_get("id").context("id column")?,
        title: row.try_get("title").context("title column")?,
        servings: u32::try_from(servings).unwrap_or(0),
        ingredients: ingredients.0,
        steps: steps.0,
        nutrition: nutrition.0,
        prep_time_minutes: prep.and_then(|v| u32::try_from(v).ok()),
        cook_time_minutes: cook.and_then(|v| u32::try_from(v).ok()),
        total_time_minutes: total.and_then(|v| u32::try_from(v).ok()),
        category: row.try_get("category").context("category column")?,
        tags: tags.0,
        quality_score: row.try_get("quality_score").context("quality_score column")?,
        similarity_hash: row
            .try_get("similarity_hash")
            .context("similarity_hash column")?,
        thumbnail_url: row
            .try_get("thumbnail_url")
            .context("thumbnail_url column")?,
        owner_id: row.try_get("owner_id").context("owner_id column")?,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl RecipeStore for PgRecipeStore {
    async fn find_candidates(
        &self,
        title_hint: &str,
        similarity_hash: &str,
        limit: usize,
    ) -> Result<Vec<RecipeRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, title, servings, ingredients, steps, nutrition,
                   prep_time_minutes, cook_time_minutes, total_time_minutes,
                   category, tags, quality_score, similarity_hash,
                   thumbnail_url, owner_id, created_at, updated_at
            FROM recipes
            WHERE owner_id IS NULL
              AND (title ILIKE '%' || $1 || '%' OR similarity_hash = $2)
            ORDER BY updated_at DESC
            LIMIT $3
            ",
        )
        .bind(title_hint)
        .bind(similarity_hash)
        .bind(i64::try_from(limit).unwrap_or(10))
        .fetch_all(&self.pool)
        .await
        .context("failed to query duplicate candidates")?;

        rows.iter().map(record_from_row).collect()
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<RecipeRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, title, servings, ingredients, steps, nutrition,
                   prep_time_minutes, cook_time_minutes, total_time_minutes,
                   category, tags, quality_score, similarity_hash,
                   thumbnail_url, owner_id, created_at, updated_at
            FROM recipes
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch recipe")?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn upsert(&self, record: RecipeRecord) -> Result<RecipeRecord> {
        sqlx::query(
            r"
            INSERT INTO recipes
                (id, title, servings, ingredients, steps, nutrition,
                 prep_time_minutes, cook_time_minutes, total_time_minutes,
                 category, tags, quality_score, similarity_hash,
                 thumbnail_url, owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                servings = EXCLUDED.servings,
                ingredients = EXCLUDED.ingredients,
                steps = EXCLUDED.steps,
                nutrition = EXCLUDED.nutrition,
                prep_time_minutes = EXCLUDED.prep_time_minutes,
                cook_time_minutes = EXCLUDED.cook_time_minutes,
                total_time_minutes = EXCLUDED.total_time_minutes,
                category = EXCLUDED.category,
                tags = EXCLUDED.tags,
                quality_score = EXCLUDED.quality_score,
                similarity_hash = EXCLUDED.similarity_hash,
                thumbnail_url = EXCLUDED.thumbnail_url,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(record.id)
        .bind(&record.title)
        .bind(i32::try_from(record.servings).unwrap_or(i32::MAX))
        .bind(Json(&record.ingredients))
        .bind(Json(&record.steps))
        .bind(Json(&record.nutrition))
        .bind(record.prep_time_minutes.map(|v| v as i32))
        .bind(record.cook_time_minutes.map(|v| v as i32))
        .bind(record.total_time_minutes.map(|v| v as i32))
        .bind(&record.category)
        .bind(Json(&record.tags))
        .bind(record.quality_score)
        .bind(&record.similarity_hash)
        .bind(&record.thumbnail_url)
        .bind(record.owner_id)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .context("failed to upsert recipe")?;

        Ok(record)
    }
}

/// Snapshot primary tier kept in the same database as the recipes.
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn put(&self, request_id: Uuid, draft: &RecipeDraft) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO recipe_snapshots (request_id, draft, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (request_id) DO UPDATE SET
                draft = EXCLUDED.draft,
                updated_at = NOW()
            ",
        )
        .bind(request_id)
        .bind(Json(draft))
        .execute(&self.pool)
        .await
        .context("failed to store snapshot")?;
        Ok(())
    }

    async fn get(&self, request_id: Uuid) -> Result<Option<RecipeDraft>> {
        let row = sqlx::query("SELECT draft FROM recipe_snapshots WHERE request_id = $1")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load snapshot")?;

        match row {
            Some(row) => {
                let draft: Json<RecipeDraft> = row.try_get("draft").context("draft column")?;
                Ok(Some(draft.0))
            }
            None => Ok(None),
        }
    }

    async fn clear(&self, request_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM recipe_snapshots WHERE request_id = $1")
            .bind(request_id)
            .execute(&self.pool)
            .await
            .context("failed to clear snapshot")?;
        Ok(())
    }
}

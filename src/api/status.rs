use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{app::AppState, pipeline::RecipeDraft, scheduler::JobPhase};

#[derive(Debug, Serialize)]
struct StatusResponse {
    request_id: Uuid,
    phase: JobPhase,
    progress_percent: u8,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipe_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    partial_recipe: Option<RecipeDraft>,
}

/// Always answers with a well-formed status object. An id without a
/// tracked job reports `unknown`, with the snapshot cache consulted for a
/// partial recipe that may have outlived the tracker entry.
pub(crate) async fn get_status(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> impl IntoResponse {
    let entry = state.tracker().get(request_id).await;
    let phase = entry
        .as_ref()
        .map_or(JobPhase::Unknown, |entry| entry.phase);

    let partial_recipe = if phase.is_terminal() {
        None
    } else {
        state.snapshots().get(request_id).await
    };

    let progress_percent = progress_for(phase, partial_recipe.as_ref());
    let (warnings, error, recipe_id) = entry
        .map(|entry| (entry.warnings, entry.error, entry.recipe_id))
        .unwrap_or_default();

    let body = Json(StatusResponse {
        request_id,
        phase,
        progress_percent,
        warnings,
        error,
        recipe_id,
        partial_recipe,
    });
    (StatusCode::OK, body).into_response()
}

/// Phase-based progress, with aggregation interpolated from how many steps
/// already carry an image.
fn progress_for(phase: JobPhase, partial: Option<&RecipeDraft>) -> u8 {
    let base = phase.base_progress();
    if phase != JobPhase::Aggregating {
        return base;
    }

    let Some(draft) = partial else { return base };
    if draft.steps.is_empty() {
        return base;
    }

    let done = draft
        .steps
        .iter()
        .filter(|step| step.image_url.is_some())
        .count();
    let span = u64::from(JobPhase::Persisting.base_progress() - base);
    let extra = span * done as u64 / draft.steps.len() as u64;
    base + u8::try_from(extra).unwrap_or(0)
}

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use uuid::Uuid;

use crate::app::AppState;

#[derive(Debug, Serialize)]
struct CancelResponse {
    request_id: Uuid,
    accepted: bool,
}

/// Request cooperative cancellation. Acceptance means the flag is set, not
/// that the job has stopped: the run winds down at its next phase boundary.
pub(crate) async fn cancel(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> impl IntoResponse {
    state.telemetry().record_cancel_invocation();

    let accepted = state.scheduler().cancel(request_id).await;
    let status = if accepted {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CONFLICT
    };

    (
        status,
        Json(CancelResponse {
            request_id,
            accepted,
        }),
    )
        .into_response()
}

pub(crate) mod cancel;
pub(crate) mod generate;
pub(crate) mod health;
pub(crate) mod status;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/v1/recipes/generate", post(generate::submit))
        .route("/v1/recipes/generate/{request_id}", get(status::get_status))
        .route(
            "/v1/recipes/generate/{request_id}/cancel",
            post(cancel::cancel),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

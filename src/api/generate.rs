use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    app::AppState,
    scheduler::{RequestContext, SubscriptionTier},
};

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateRecipeRequest {
    query: String,
    #[serde(default)]
    preferences: Option<Value>,
    #[serde(default)]
    tier: SubscriptionTier,
    #[serde(default)]
    owner_id: Option<Uuid>,
    #[serde(default)]
    persist: bool,
    #[serde(default = "default_progressive")]
    progressive: bool,
}

fn default_progressive() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct GenerateRecipeResponse {
    request_id: Uuid,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub(crate) async fn submit(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRecipeRequest>,
) -> impl IntoResponse {
    state.telemetry().record_submit_invocation();

    let query = payload.query.trim().to_string();
    if query.is_empty() {
        let body = Json(ErrorResponse {
            error: "query must be a non-empty string".into(),
        });
        return (StatusCode::BAD_REQUEST, body).into_response();
    }

    let request_id = Uuid::new_v4();
    let request = RequestContext {
        request_id,
        query,
        preferences: payload.preferences,
        tier: payload.tier,
        owner_id: payload.owner_id,
        persist: payload.persist,
        progressive: payload.progressive,
    };

    state.scheduler().submit(request).await;

    let body = Json(GenerateRecipeResponse {
        request_id,
        status: "accepted",
    });
    (StatusCode::ACCEPTED, body).into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    use crate::app::test_support::state_with_memory_store;

    #[tokio::test]
    async fn submit_returns_accepted_with_request_id() {
        let state = state_with_memory_store().await;
        let router = crate::api::router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/recipes/generate")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({"query": "margherita pizza"}).to_string(),
                    ))
                    .expect("request builds"),
            )
            .await
            .expect("handler responds");

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["status"], "accepted");
        assert!(body["request_id"].as_str().is_some());
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let state = state_with_memory_store().await;
        let router = crate::api::router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/recipes/generate")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::json!({"query": "  "}).to_string()))
                    .expect("request builds"),
            )
            .await
            .expect("handler responds");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

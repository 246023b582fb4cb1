use axum::extract::State;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::middleware::{bearer_auth, request_id, RequestId};
use crate::state::AppState;

use super::jobs;

pub const SERVICE_NAME: &str = "capstan-api";

/// Assemble the control API. Everything under `/v1` requires the bearer
/// token; `/health` is public. Every response carries `x-request-id`.
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/v1/jobs/enqueue",
            post(jobs::enqueue).fallback(method_not_allowed),
        )
        .route(
            "/v1/jobs/dequeue",
            post(jobs::dequeue).fallback(method_not_allowed),
        )
        .route(
            "/v1/jobs/complete",
            post(jobs::complete).fallback(method_not_allowed),
        )
        .route("/v1/jobs/fail", post(jobs::fail).fallback(method_not_allowed))
        .route("/v1/jobs/get", get(jobs::get_job).fallback(method_not_allowed))
        .route("/v1/jobs/stats", get(jobs::stats).fallback(method_not_allowed))
        .route("/v1/jobs/list", get(jobs::list).fallback(method_not_allowed))
        .route(
            "/v1/jobs/purge",
            post(jobs::purge).fallback(method_not_allowed),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), bearer_auth));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .fallback(not_found)
        .layer(middleware::from_fn(request_id))
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": SERVICE_NAME,
        "env": state.environment,
        "requestId": request_id,
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

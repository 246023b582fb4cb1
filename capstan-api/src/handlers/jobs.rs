//! The admission surface of the queue: one handler per engine or inspector
//! operation. Handlers parse and validate, call into `capstan-core`, and
//! serialize the response envelope - they own no state of their own.

use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use uuid::Uuid;

use capstan_core::{JobInit, JobKind, JobStatus};

use crate::errors::ApiError;
use crate::state::AppState;

/// Accept any JSON for an optional integer field, reading non-integers as
/// absent so the engine's default-and-clamp behavior applies.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| value.as_i64()))
}

fn reject(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonSyntaxError(_) => ApiError::InvalidJson,
        _ => ApiError::InvalidBody,
    }
}

/// The body of a request made to create a job. The gateway mints the job id
/// and creation timestamp; producers only say what to do and to what.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueBody {
    #[serde(rename = "type")]
    kind: JobKind,
    target: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    max_attempts: Option<i64>,
}

pub async fn enqueue(
    State(state): State<AppState>,
    body: Result<Json<EnqueueBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(body) = body.map_err(reject)?;

    let init = JobInit {
        id: Uuid::new_v4().to_string(),
        kind: body.kind,
        target: body.target,
        created_at: Utc::now().timestamp_millis(),
        max_attempts: body.max_attempts,
    };

    let start_time = Instant::now();
    let job = state
        .queue
        .enqueue(&init)
        .await
        .map_err(|error| ApiError::from_queue(error, "enqueue_failed"))?;
    metrics::histogram!("jobs_api_enqueue").record(start_time.elapsed().as_secs_f64());

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"ok": true, "accepted": true, "job": job})),
    ))
}

pub async fn dequeue(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let leased = state
        .queue
        .dequeue()
        .await
        .map_err(|error| ApiError::from_queue(error, "dequeue_failed"))?;

    match leased {
        Some(job) => Ok(Json(json!({
            "ok": true,
            "job": {
                "id": job.id,
                "type": job.kind,
                "target": job.target,
                "createdAt": job.created_at,
            },
            "leaseUntil": job.lease_until,
        }))),
        None => Ok(Json(json!({"ok": true, "job": null}))),
    }
}

#[derive(Debug, Deserialize)]
pub struct CompleteBody {
    id: Option<String>,
    #[serde(default)]
    result: Value,
}

pub async fn complete(
    State(state): State<AppState>,
    body: Result<Json<CompleteBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(reject)?;
    let id = body
        .id
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingField("id"))?;

    state
        .queue
        .complete(&id, &body.result)
        .await
        .map_err(|error| ApiError::from_queue(error, "complete_failed"))?;

    Ok(Json(json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct FailBody {
    id: Option<String>,
    error: Option<String>,
}

pub async fn fail(
    State(state): State<AppState>,
    body: Result<Json<FailBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(reject)?;
    let id = body
        .id
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingField("id"))?;
    let message = body.error.unwrap_or_else(|| "unknown error".to_owned());

    let outcome = state
        .queue
        .fail(&id, &message)
        .await
        .map_err(|error| ApiError::from_queue(error, "fail_failed"))?;

    let mut response = json!({
        "ok": true,
        "retried": outcome.retried,
        "attempts": outcome.attempts,
        "maxAttempts": outcome.max_attempts,
    });
    if let Some(next_run_at) = outcome.next_run_at {
        response["nextRunAt"] = json!(next_run_at);
    }

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct GetParams {
    id: Option<String>,
}

pub async fn get_job(
    State(state): State<AppState>,
    Query(params): Query<GetParams>,
) -> Result<Json<Value>, ApiError> {
    let id = params
        .id
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingField("id"))?;

    let job = state
        .queue
        .get(&id)
        .await
        .map_err(|error| ApiError::from_queue(error, "get_failed"))?;

    Ok(Json(json!({"ok": true, "job": job})))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stats = state
        .queue
        .stats()
        .await
        .map_err(|error| ApiError::from_queue(error, "stats_failed"))?;

    Ok(Json(json!({"ok": true, "stats": stats})))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    status: Option<String>,
    limit: Option<String>,
    cursor: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    // Unknown status values and non-numeric limits are ignored, not rejected.
    let status = params
        .status
        .as_deref()
        .and_then(|status| status.parse::<JobStatus>().ok());
    let limit = params
        .limit
        .as_deref()
        .and_then(|limit| limit.parse::<i64>().ok());

    let page = state
        .queue
        .list(status, limit, params.cursor.as_deref())
        .await
        .map_err(|error| ApiError::from_queue(error, "list_failed"))?;

    Ok(Json(
        json!({"ok": true, "items": page.items, "nextCursor": page.next_cursor}),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeBody {
    #[serde(default, deserialize_with = "lenient_i64")]
    before_ms: Option<i64>,
}

pub async fn purge(
    State(state): State<AppState>,
    body: Result<Json<PurgeBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(reject)?;
    let before_ms = body.before_ms.ok_or(ApiError::MissingField("beforeMs"))?;

    let deleted = state
        .queue
        .purge(before_ms)
        .await
        .map_err(|error| ApiError::from_queue(error, "purge_failed"))?;
    let stats_after = state
        .queue
        .stats()
        .await
        .map_err(|error| ApiError::from_queue(error, "purge_failed"))?;

    Ok(Json(json!({
        "ok": true,
        "beforeMs": before_ms,
        "deleted": deleted,
        "statsAfter": stats_after,
    })))
}

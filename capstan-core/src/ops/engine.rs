//! The queue state machine: enqueue, lease, complete, fail-with-retry.
//!
//! Every function takes an explicit `now_ms` so transitions are deterministic
//! under test; the `Queue` facade stamps wall-clock time. Reclaim of expired
//! leases has no operation of its own - it is folded into the eligibility
//! predicate of [`dequeue_job`].

use serde_json::Value;

use crate::error::QueueError;
use crate::retry;
use crate::types::{FailOutcome, Job, JobInit, LeasedJob};
use crate::{DEFAULT_MAX_ATTEMPTS, MAX_MAX_ATTEMPTS, MIN_MAX_ATTEMPTS};

pub async fn create_job<'c, E>(executor: E, init: &JobInit, now_ms: i64) -> Result<Job, QueueError>
where
    E: sqlx::Executor<'c, Database = sqlx::Sqlite>,
{
    if init.id.is_empty() {
        return Err(QueueError::InvalidPayload("id must be a non-empty string"));
    }
    if init.target.is_empty() {
        return Err(QueueError::InvalidPayload(
            "target must be a non-empty string",
        ));
    }

    let max_attempts = init
        .max_attempts
        .unwrap_or(DEFAULT_MAX_ATTEMPTS)
        .clamp(MIN_MAX_ATTEMPTS, MAX_MAX_ATTEMPTS);

    let job = sqlx::query_as::<_, Job>(
        r#"
INSERT INTO jobs
    (id, kind, target, created_at, status, updated_at, lease_until, attempts, max_attempts, next_run_at, result, error, sort_at)
VALUES
    (?, ?, ?, ?, 'queued', ?, NULL, 0, ?, NULL, NULL, NULL, ?)
RETURNING *
        "#,
    )
    .bind(&init.id)
    .bind(init.kind)
    .bind(&init.target)
    .bind(init.created_at)
    .bind(now_ms)
    .bind(max_attempts)
    .bind(now_ms)
    .fetch_one(executor)
    .await
    .map_err(|error| {
        if let sqlx::Error::Database(db_error) = &error {
            if db_error.is_unique_violation() {
                return QueueError::Conflict(init.id.clone());
            }
        }
        QueueError::from(error)
    })?;

    Ok(job)
}

/// Atomically select and lease the oldest eligible job.
///
/// A job is eligible when it is `queued` and due, or when it is `processing`
/// with an expired lease (the reclaim rule - note that reclaiming does not
/// touch `attempts`; only an explicit `fail` spends the retry budget). The
/// select-and-update is one statement, so two concurrent dequeues can never
/// lease the same row.
pub async fn dequeue_job<'c, E>(
    executor: E,
    now_ms: i64,
    lease_ms: i64,
) -> Result<Option<LeasedJob>, QueueError>
where
    E: sqlx::Executor<'c, Database = sqlx::Sqlite>,
{
    let job = sqlx::query_as::<_, LeasedJob>(
        r#"
UPDATE jobs
SET
    status = 'processing',
    lease_until = ? + ?,
    updated_at = ?,
    sort_at = ?,
    next_run_at = NULL
WHERE id = (
    SELECT id
    FROM jobs
    WHERE
        (status = 'queued' AND (next_run_at IS NULL OR next_run_at <= ?))
        OR (status = 'processing' AND lease_until IS NOT NULL AND lease_until < ?)
    ORDER BY created_at ASC, id ASC
    LIMIT 1
)
RETURNING id, kind, target, created_at, lease_until
        "#,
    )
    .bind(now_ms)
    .bind(lease_ms)
    .bind(now_ms)
    .bind(now_ms)
    .bind(now_ms)
    .bind(now_ms)
    .fetch_optional(executor)
    .await?;

    Ok(job)
}

/// Mark a job done, storing the serialized result. Deliberately not gated on
/// the job's prior state or on the caller holding the lease: acks must stay
/// safe across consumer crashes and reclaim races, so a repeated or late
/// `complete` simply overwrites the terminal state. Unknown ids are a no-op.
pub async fn complete_job<'c, E>(
    executor: E,
    id: &str,
    result: &Value,
    now_ms: i64,
) -> Result<(), QueueError>
where
    E: sqlx::Executor<'c, Database = sqlx::Sqlite>,
{
    let payload = serde_json::to_string(result)?;

    sqlx::query(
        r#"
UPDATE jobs
SET
    status = 'done',
    result = ?,
    error = NULL,
    lease_until = NULL,
    next_run_at = NULL,
    updated_at = ?,
    sort_at = ?
WHERE id = ?
        "#,
    )
    .bind(payload)
    .bind(now_ms)
    .bind(now_ms)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(())
}

/// Record a failure. If the job has attempts left it goes back to `queued`
/// with a backoff encoded in `next_run_at`; otherwise it becomes terminally
/// `failed`. Unknown ids are an error, unlike `complete`: a consumer failing
/// a job it never held is a bug worth surfacing.
pub async fn fail_job<'c, C>(
    connection: &mut C,
    id: &str,
    message: &str,
    now_ms: i64,
) -> Result<FailOutcome, QueueError>
where
    C: sqlx::Connection<Database = sqlx::Sqlite>,
{
    let mut txn = connection.begin().await?;

    let row = sqlx::query_as::<_, (i64, i64)>(
        "SELECT attempts, max_attempts FROM jobs WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *txn)
    .await?;

    let Some((attempts, max_attempts)) = row else {
        return Err(QueueError::NotFound(id.to_owned()));
    };

    // Clamped so a duplicate fail on an already-exhausted job cannot push
    // attempts past the ceiling.
    let next_attempts = (attempts + 1).min(max_attempts);

    let outcome = if next_attempts < max_attempts {
        let next_run_at = now_ms + retry::backoff_ms(next_attempts);
        sqlx::query(
            r#"
UPDATE jobs
SET
    status = 'queued',
    attempts = ?,
    next_run_at = ?,
    lease_until = NULL,
    error = ?,
    updated_at = ?,
    sort_at = ?
WHERE id = ?
            "#,
        )
        .bind(next_attempts)
        .bind(next_run_at)
        .bind(message)
        .bind(now_ms)
        .bind(now_ms)
        .bind(id)
        .execute(&mut *txn)
        .await?;

        FailOutcome {
            retried: true,
            attempts: next_attempts,
            max_attempts,
            next_run_at: Some(next_run_at),
        }
    } else {
        sqlx::query(
            r#"
UPDATE jobs
SET
    status = 'failed',
    attempts = ?,
    lease_until = NULL,
    next_run_at = NULL,
    error = ?,
    updated_at = ?,
    sort_at = ?
WHERE id = ?
            "#,
        )
        .bind(next_attempts)
        .bind(message)
        .bind(now_ms)
        .bind(now_ms)
        .bind(id)
        .execute(&mut *txn)
        .await?;

        FailOutcome {
            retried: false,
            attempts: next_attempts,
            max_attempts,
            next_run_at: None,
        }
    };

    txn.commit().await?;

    Ok(outcome)
}

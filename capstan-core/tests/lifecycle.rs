use capstan_core::ops::{engine, inspect};
use capstan_core::{JobStatus, QueueError, LEASE_MS};
use serde_json::json;
use sqlx::SqlitePool;

use common::{assert_invariants, crawl_init, T0};

mod common;

#[sqlx::test(migrations = "./migrations")]
async fn enqueue_then_dequeue_once(db: SqlitePool) {
    let init = crawl_init("A", T0);
    engine::create_job(&db, &init, T0).await.expect("failed to enqueue");

    let leased = engine::dequeue_job(&db, T0 + 1, LEASE_MS)
        .await
        .expect("failed to dequeue")
        .expect("expected a job");

    assert_eq!(leased.id, "A");
    assert_eq!(leased.kind, init.kind);
    assert_eq!(leased.target, init.target);
    assert_eq!(leased.created_at, T0);
    assert_eq!(leased.lease_until, T0 + 1 + LEASE_MS);

    let job = inspect::get_job(&db, "A")
        .await
        .expect("failed to get job")
        .expect("job should exist");
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.updated_at, Some(T0 + 1));
    assert_eq!(job.sort_at, T0 + 1);
    assert_eq!(job.attempts, 0);
    assert_invariants(&job);
}

#[sqlx::test(migrations = "./migrations")]
async fn enqueue_echoes_user_fields(db: SqlitePool) {
    let init = crawl_init("A", T0);
    let job = engine::create_job(&db, &init, T0 + 5).await.expect("failed to enqueue");

    assert_eq!(job.id, init.id);
    assert_eq!(job.kind, init.kind);
    assert_eq!(job.target, init.target);
    assert_eq!(job.created_at, T0);
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.max_attempts, 3);
    assert_eq!(job.next_run_at, None);
    assert_eq!(job.updated_at, Some(T0 + 5));
    assert_invariants(&job);
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_id_is_a_conflict(db: SqlitePool) {
    let init = crawl_init("A", T0);
    engine::create_job(&db, &init, T0).await.expect("failed to enqueue");

    let error = engine::create_job(&db, &init, T0 + 1)
        .await
        .expect_err("duplicate id should be rejected");
    assert!(matches!(error, QueueError::Conflict(id) if id == "A"));
}

#[sqlx::test(migrations = "./migrations")]
async fn rejects_empty_id_and_target(db: SqlitePool) {
    let mut init = crawl_init("", T0);
    let error = engine::create_job(&db, &init, T0).await.expect_err("empty id");
    assert!(matches!(error, QueueError::InvalidPayload(_)));

    init = crawl_init("A", T0);
    init.target = String::new();
    let error = engine::create_job(&db, &init, T0).await.expect_err("empty target");
    assert!(matches!(error, QueueError::InvalidPayload(_)));
}

#[sqlx::test(migrations = "./migrations")]
async fn max_attempts_is_clamped(db: SqlitePool) {
    let mut init = crawl_init("low", T0);
    init.max_attempts = Some(0);
    let job = engine::create_job(&db, &init, T0).await.expect("failed to enqueue");
    assert_eq!(job.max_attempts, 1);

    let mut init = crawl_init("high", T0);
    init.max_attempts = Some(11);
    let job = engine::create_job(&db, &init, T0).await.expect("failed to enqueue");
    assert_eq!(job.max_attempts, 10);

    let init = crawl_init("default", T0);
    let job = engine::create_job(&db, &init, T0).await.expect("failed to enqueue");
    assert_eq!(job.max_attempts, 3);
}

#[sqlx::test(migrations = "./migrations")]
async fn single_retry_applies_backoff(db: SqlitePool) {
    engine::create_job(&db, &crawl_init("A", T0), T0).await.expect("failed to enqueue");
    engine::dequeue_job(&db, T0 + 1, LEASE_MS)
        .await
        .expect("failed to dequeue")
        .expect("expected a job");

    let mut connection = db.acquire().await.expect("failed to acquire connection");
    let outcome = engine::fail_job(&mut *connection, "A", "oops", T0 + 2)
        .await
        .expect("failed to fail job");
    drop(connection);

    assert!(outcome.retried);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.max_attempts, 3);
    assert_eq!(outcome.next_run_at, Some(T0 + 2 + 10_000));

    let job = inspect::get_job(&db, "A").await.expect("get failed").expect("job exists");
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.error.as_deref(), Some("oops"));
    assert_invariants(&job);

    // Not yet due
    let nothing = engine::dequeue_job(&db, T0 + 3, LEASE_MS).await.expect("dequeue failed");
    assert!(nothing.is_none());

    // Due exactly at next_run_at
    let leased = engine::dequeue_job(&db, T0 + 2 + 10_000, LEASE_MS)
        .await
        .expect("dequeue failed")
        .expect("job should be due again");
    assert_eq!(leased.id, "A");
}

#[sqlx::test(migrations = "./migrations")]
async fn exhausting_attempts_fails_terminally(db: SqlitePool) {
    let mut init = crawl_init("B", T0);
    init.max_attempts = Some(2);
    engine::create_job(&db, &init, T0).await.expect("failed to enqueue");

    engine::dequeue_job(&db, T0 + 1, LEASE_MS)
        .await
        .expect("dequeue failed")
        .expect("expected a job");
    let mut connection = db.acquire().await.expect("failed to acquire connection");
    let outcome = engine::fail_job(&mut *connection, "B", "e1", T0 + 2)
        .await
        .expect("fail failed");
    drop(connection);
    assert!(outcome.retried);
    assert_eq!(outcome.attempts, 1);

    let due_at = outcome.next_run_at.expect("retry must carry next_run_at");
    engine::dequeue_job(&db, due_at, LEASE_MS)
        .await
        .expect("dequeue failed")
        .expect("job should be due again");

    let mut connection = db.acquire().await.expect("failed to acquire connection");
    let outcome = engine::fail_job(&mut *connection, "B", "e2", due_at + 1)
        .await
        .expect("fail failed");
    drop(connection);
    assert!(!outcome.retried);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.max_attempts, 2);
    assert_eq!(outcome.next_run_at, None);

    let job = inspect::get_job(&db, "B").await.expect("get failed").expect("job exists");
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("e2"));
    assert_invariants(&job);

    // Terminal jobs are never leased again
    let nothing = engine::dequeue_job(&db, due_at + LEASE_MS, LEASE_MS)
        .await
        .expect("dequeue failed");
    assert!(nothing.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn expired_lease_is_reclaimed_without_spending_attempts(db: SqlitePool) {
    engine::create_job(&db, &crawl_init("C", T0), T0).await.expect("failed to enqueue");

    let first = engine::dequeue_job(&db, T0, LEASE_MS)
        .await
        .expect("dequeue failed")
        .expect("expected a job");
    assert_eq!(first.lease_until, T0 + LEASE_MS);

    // The lease bound is strict: at exactly lease_until the job is still held.
    let nothing = engine::dequeue_job(&db, T0 + LEASE_MS, LEASE_MS).await.expect("dequeue failed");
    assert!(nothing.is_none());

    let reclaimed = engine::dequeue_job(&db, T0 + LEASE_MS + 1, LEASE_MS)
        .await
        .expect("dequeue failed")
        .expect("expired lease should be reclaimable");
    assert_eq!(reclaimed.id, "C");
    assert_eq!(reclaimed.lease_until, T0 + LEASE_MS + 1 + LEASE_MS);

    let job = inspect::get_job(&db, "C").await.expect("get failed").expect("job exists");
    assert_eq!(job.attempts, 0);
    assert_eq!(job.status, JobStatus::Processing);
    assert_invariants(&job);
}

#[sqlx::test(migrations = "./migrations")]
async fn complete_is_idempotent_and_ungated(db: SqlitePool) {
    engine::create_job(&db, &crawl_init("A", T0), T0).await.expect("failed to enqueue");
    engine::dequeue_job(&db, T0 + 1, LEASE_MS)
        .await
        .expect("dequeue failed")
        .expect("expected a job");

    engine::complete_job(&db, "A", &json!({"pages": 3}), T0 + 2)
        .await
        .expect("complete failed");
    engine::complete_job(&db, "A", &json!({"pages": 4}), T0 + 3)
        .await
        .expect("repeated complete failed");

    let job = inspect::get_job(&db, "A").await.expect("get failed").expect("job exists");
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.result.as_deref(), Some(r#"{"pages":4}"#));
    assert_eq!(job.updated_at, Some(T0 + 3));
    assert_invariants(&job);

    // Acking an id that was never enqueued is accepted as a no-op.
    engine::complete_job(&db, "ghost", &json!(null), T0 + 4)
        .await
        .expect("unknown-id complete should be a no-op");
    assert!(inspect::get_job(&db, "ghost").await.expect("get failed").is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn late_complete_wins_over_reclaim(db: SqlitePool) {
    engine::create_job(&db, &crawl_init("A", T0), T0).await.expect("failed to enqueue");

    // First consumer leases, stalls past its lease, and a second consumer
    // reclaims the job.
    engine::dequeue_job(&db, T0, LEASE_MS)
        .await
        .expect("dequeue failed")
        .expect("expected a job");
    engine::dequeue_job(&db, T0 + LEASE_MS + 1, LEASE_MS)
        .await
        .expect("dequeue failed")
        .expect("expected reclaim");

    // The original consumer finishes anyway; the ack lands.
    engine::complete_job(&db, "A", &json!("done late"), T0 + LEASE_MS + 2)
        .await
        .expect("late complete failed");

    let job = inspect::get_job(&db, "A").await.expect("get failed").expect("job exists");
    assert_eq!(job.status, JobStatus::Done);
    assert_invariants(&job);
}

#[sqlx::test(migrations = "./migrations")]
async fn fail_on_unknown_id_is_not_found(db: SqlitePool) {
    let mut connection = db.acquire().await.expect("failed to acquire connection");
    let error = engine::fail_job(&mut *connection, "ghost", "nope", T0)
        .await
        .expect_err("unknown id should error");
    assert!(matches!(error, QueueError::NotFound(id) if id == "ghost"));
}

#[sqlx::test(migrations = "./migrations")]
async fn dequeue_order_is_created_at_then_id(db: SqlitePool) {
    // Same created_at for the last two, so the id breaks the tie.
    engine::create_job(&db, &crawl_init("z-oldest", T0 - 10), T0).await.expect("enqueue failed");
    engine::create_job(&db, &crawl_init("b", T0), T0).await.expect("enqueue failed");
    engine::create_job(&db, &crawl_init("a", T0), T0).await.expect("enqueue failed");

    let order: Vec<String> = [
        engine::dequeue_job(&db, T0 + 1, LEASE_MS).await.expect("dequeue failed"),
        engine::dequeue_job(&db, T0 + 1, LEASE_MS).await.expect("dequeue failed"),
        engine::dequeue_job(&db, T0 + 1, LEASE_MS).await.expect("dequeue failed"),
    ]
    .into_iter()
    .map(|leased| leased.expect("expected a job").id)
    .collect();

    assert_eq!(order, ["z-oldest", "a", "b"]);

    // Everything is leased now
    let nothing = engine::dequeue_job(&db, T0 + 1, LEASE_MS).await.expect("dequeue failed");
    assert!(nothing.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_dequeues_never_share_a_job(db: SqlitePool) {
    engine::create_job(&db, &crawl_init("A", T0), T0).await.expect("enqueue failed");
    engine::create_job(&db, &crawl_init("B", T0 + 1), T0 + 1).await.expect("enqueue failed");

    let pool_1 = db.clone();
    let pool_2 = db.clone();
    let fut_1 = async move {
        engine::dequeue_job(&pool_1, T0 + 2, LEASE_MS)
            .await
            .expect("dequeue failed")
    };
    let fut_2 = async move {
        engine::dequeue_job(&pool_2, T0 + 2, LEASE_MS)
            .await
            .expect("dequeue failed")
    };

    let (first, second) = tokio::join!(fut_1, fut_2);
    let ids: Vec<String> = [first, second]
        .into_iter()
        .flatten()
        .map(|leased| leased.id)
        .collect();

    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

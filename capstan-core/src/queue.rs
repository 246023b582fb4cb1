use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::SqlitePool;
use tracing::info;

use crate::config::StoreConfig;
use crate::cursor::Cursor;
use crate::error::QueueError;
use crate::metrics_consts::{
    COMPLETED_COUNT, DEQUEUED_COUNT, ENQUEUED_COUNT, FAILED_COUNT, PURGED_COUNT, RETRIED_COUNT,
};
use crate::ops;
use crate::types::{
    FailOutcome, Job, JobDetail, JobInit, JobPage, JobStatus, LeasedJob, StatusCount,
};
use crate::{DEFAULT_PAGE_LIMIT, LEASE_MS, MAX_PAGE_LIMIT, MIN_PAGE_LIMIT, MIGRATIONS};

/// Handle to the single logical queue instance. Owns the store pool, stamps
/// wall-clock time onto the engine ops, and shapes Inspector responses.
#[derive(Clone)]
pub struct Queue {
    pool: SqlitePool,
}

impl Queue {
    /// Open (or create) the store and bring its schema up to date.
    pub async fn new(config: &StoreConfig) -> Result<Self, QueueError> {
        let pool = config.connect().await?;
        MIGRATIONS.run(&pool).await?;
        info!("job store at {} is migrated and ready", config.db_url);
        Ok(Self { pool })
    }

    /// Wrap an already-migrated pool. Used by tests, which get per-test
    /// databases with migrations applied.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    pub async fn enqueue(&self, init: &JobInit) -> Result<Job, QueueError> {
        let job = ops::engine::create_job(&self.pool, init, Self::now_ms()).await?;
        metrics::counter!(ENQUEUED_COUNT).increment(1);
        Ok(job)
    }

    pub async fn dequeue(&self) -> Result<Option<LeasedJob>, QueueError> {
        let job = ops::engine::dequeue_job(&self.pool, Self::now_ms(), LEASE_MS).await?;
        if job.is_some() {
            metrics::counter!(DEQUEUED_COUNT).increment(1);
        }
        Ok(job)
    }

    pub async fn complete(&self, id: &str, result: &Value) -> Result<(), QueueError> {
        ops::engine::complete_job(&self.pool, id, result, Self::now_ms()).await?;
        metrics::counter!(COMPLETED_COUNT).increment(1);
        Ok(())
    }

    pub async fn fail(&self, id: &str, message: &str) -> Result<FailOutcome, QueueError> {
        let mut connection = self.pool.acquire().await?;
        let outcome =
            ops::engine::fail_job(&mut *connection, id, message, Self::now_ms()).await?;
        if outcome.retried {
            metrics::counter!(RETRIED_COUNT).increment(1);
        } else {
            metrics::counter!(FAILED_COUNT).increment(1);
        }
        Ok(outcome)
    }

    pub async fn get(&self, id: &str) -> Result<Option<JobDetail>, QueueError> {
        let job = ops::inspect::get_job(&self.pool, id).await?;
        Ok(job.map(JobDetail::from))
    }

    pub async fn stats(&self) -> Result<Vec<StatusCount>, QueueError> {
        ops::inspect::count_by_status(&self.pool).await
    }

    /// Paginated listing. The raw cursor string is decoded leniently (an
    /// invalid cursor means "from the top"), and a next cursor is handed out
    /// only when the page filled, since a short page proves exhaustion.
    pub async fn list(
        &self,
        status: Option<JobStatus>,
        limit: Option<i64>,
        cursor: Option<&str>,
    ) -> Result<JobPage, QueueError> {
        let limit = limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(MIN_PAGE_LIMIT, MAX_PAGE_LIMIT);
        let cursor = cursor.and_then(Cursor::decode);

        let jobs = ops::inspect::list_jobs(&self.pool, status, limit, cursor.as_ref()).await?;

        let next_cursor = if jobs.len() as i64 == limit {
            jobs.last().map(|job| {
                Cursor {
                    sort_at: job.sort_at,
                    id: job.id.clone(),
                }
                .encode()
            })
        } else {
            None
        };

        Ok(JobPage {
            items: jobs.into_iter().map(JobDetail::from).collect(),
            next_cursor,
        })
    }

    pub async fn purge(&self, before_ms: i64) -> Result<u64, QueueError> {
        let deleted = ops::purge::purge_jobs(&self.pool, before_ms).await?;
        metrics::counter!(PURGED_COUNT).increment(deleted);
        Ok(deleted)
    }
}

//! Read-only views over the jobs table. No state transitions happen here.

use sqlx::QueryBuilder;

use crate::cursor::Cursor;
use crate::error::QueueError;
use crate::types::{Job, JobStatus, StatusCount};
use crate::{MAX_PAGE_LIMIT, MIN_PAGE_LIMIT};

pub async fn get_job<'c, E>(executor: E, id: &str) -> Result<Option<Job>, QueueError>
where
    E: sqlx::Executor<'c, Database = sqlx::Sqlite>,
{
    let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(job)
}

pub async fn count_by_status<'c, E>(executor: E) -> Result<Vec<StatusCount>, QueueError>
where
    E: sqlx::Executor<'c, Database = sqlx::Sqlite>,
{
    let counts = sqlx::query_as::<_, StatusCount>(
        "SELECT status, COUNT(*) AS count FROM jobs GROUP BY status ORDER BY status ASC",
    )
    .fetch_all(executor)
    .await?;

    Ok(counts)
}

/// One page of jobs in (`sort_at` DESC, `id` DESC) order, optionally filtered
/// by status. The cursor is a strict keyset bound: rows at or after it are
/// excluded, so walking pages until exhaustion visits every matching row
/// exactly once even while rows keep transitioning.
pub async fn list_jobs<'c, E>(
    executor: E,
    status: Option<JobStatus>,
    limit: i64,
    cursor: Option<&Cursor>,
) -> Result<Vec<Job>, QueueError>
where
    E: sqlx::Executor<'c, Database = sqlx::Sqlite>,
{
    let limit = limit.clamp(MIN_PAGE_LIMIT, MAX_PAGE_LIMIT);

    let mut query = QueryBuilder::<sqlx::Sqlite>::new("SELECT * FROM jobs");
    let mut prefix = " WHERE ";

    if let Some(status) = status {
        query.push(prefix).push("status = ").push_bind(status);
        prefix = " AND ";
    }

    if let Some(cursor) = cursor {
        query
            .push(prefix)
            .push("(sort_at < ")
            .push_bind(cursor.sort_at)
            .push(" OR (sort_at = ")
            .push_bind(cursor.sort_at)
            .push(" AND id < ")
            .push_bind(cursor.id.clone())
            .push("))");
    }

    query
        .push(" ORDER BY sort_at DESC, id DESC LIMIT ")
        .push_bind(limit);

    let jobs = query
        .build_query_as::<Job>()
        .fetch_all(executor)
        .await?;

    Ok(jobs)
}

use crate::error::QueueError;

/// Delete terminal jobs whose last transition predates `before_ms`. Queued
/// and processing rows always survive - purge is for reclaiming space from
/// history, not for cancelling work.
pub async fn purge_jobs<'c, E>(executor: E, before_ms: i64) -> Result<u64, QueueError>
where
    E: sqlx::Executor<'c, Database = sqlx::Sqlite>,
{
    let result = sqlx::query("DELETE FROM jobs WHERE status IN ('done', 'failed') AND sort_at < ?")
        .bind(before_ms)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

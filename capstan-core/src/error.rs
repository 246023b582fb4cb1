use thiserror::Error;

/// Errors surfaced by queue operations. Validation and conflict variants are
/// distinguished so the HTTP layer can map them to stable response codes;
/// everything else is a store failure that leaves the row unchanged.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("could not serialize job result: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid job payload: {0}")]
    InvalidPayload(&'static str),
    #[error("a job with id {0} already exists")]
    Conflict(String),
    #[error("unknown job id {0}")]
    NotFound(String),
}

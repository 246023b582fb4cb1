pub const ENQUEUED_COUNT: &str = "capstan_jobs_enqueued";
pub const DEQUEUED_COUNT: &str = "capstan_jobs_dequeued";
pub const COMPLETED_COUNT: &str = "capstan_jobs_completed";
pub const FAILED_COUNT: &str = "capstan_jobs_failed";
pub const RETRIED_COUNT: &str = "capstan_jobs_retried";
pub const PURGED_COUNT: &str = "capstan_jobs_purged";

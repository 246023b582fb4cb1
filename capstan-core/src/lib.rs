pub mod ops;

// We do this pattern (privately use a module, then re-export parts of it) so
// we can refactor the internals without breaking the public API

// Types
mod types;
pub use types::FailOutcome;
pub use types::Job;
pub use types::JobDetail;
pub use types::JobInit;
pub use types::JobKind;
pub use types::JobPage;
pub use types::JobStatus;
pub use types::LeasedJob;
pub use types::StatusCount;

// Errors
mod error;
pub use error::QueueError;

// Pagination cursor
mod cursor;
pub use cursor::Cursor;

// Config
mod config;
pub use config::StoreConfig;

// Queue facade
mod queue;
pub use queue::Queue;

// Backoff schedule
pub mod retry;

pub mod metrics_consts;

/// How long a dequeued job stays exclusively leased before an unacked lease
/// becomes eligible for reclaim.
pub const LEASE_MS: i64 = 120_000;

pub const DEFAULT_MAX_ATTEMPTS: i64 = 3;
pub const MIN_MAX_ATTEMPTS: i64 = 1;
pub const MAX_MAX_ATTEMPTS: i64 = 10;

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MIN_PAGE_LIMIT: i64 = 1;
pub const MAX_PAGE_LIMIT: i64 = 200;

pub static MIGRATIONS: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

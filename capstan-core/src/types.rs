use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// What a job does. Execution behavior is opaque to the queue; the kind is
/// stored and surfaced unchanged so consumers can route on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum JobKind {
    Crawl,
    Rank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(()),
        }
    }
}

// The chunk of data needed to enqueue a job. The producer assigns the id and
// the creation timestamp; everything else starts at the queue's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInit {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub target: String,
    pub created_at: i64,
    pub max_attempts: Option<i64>,
}

/// A full queue row. All timestamps are epoch milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub target: String,
    pub created_at: i64,

    // Queue bookkeeping
    pub status: JobStatus,
    pub updated_at: Option<i64>,
    // Non-null exactly while the job is processing
    pub lease_until: Option<i64>,
    pub attempts: i64,
    pub max_attempts: i64,
    // Earliest time a queued job may be leased again after a retry
    pub next_run_at: Option<i64>,

    // Outcome data
    pub result: Option<String>,
    pub error: Option<String>,

    // Mirror of updated_at (created_at until the first transition), kept for
    // stable list ordering
    pub sort_at: i64,
}

/// The slice of a job handed to a consumer by `dequeue`.
#[derive(Debug, Clone, Deserialize, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeasedJob {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub target: String,
    pub created_at: i64,
    pub lease_until: i64,
}

/// What `fail` decided: either the job went back to `queued` with a backoff,
/// or it exhausted its attempts and is terminally `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailOutcome {
    pub retried: bool,
    pub attempts: i64,
    pub max_attempts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: JobStatus,
    pub count: i64,
}

/// Inspector view of a job: every epoch-ms field gains an ISO-8601 companion
/// and the stored result is deserialized back into JSON (falling back to the
/// raw string if it was never valid JSON).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub target: String,
    pub status: JobStatus,
    pub created_at: i64,
    pub created_at_iso: Option<String>,
    pub updated_at: Option<i64>,
    pub updated_at_iso: Option<String>,
    pub lease_until: Option<i64>,
    pub lease_until_iso: Option<String>,
    pub next_run_at: Option<i64>,
    pub next_run_at_iso: Option<String>,
    pub attempts: i64,
    pub max_attempts: i64,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub sort_at: i64,
}

fn iso(ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl From<Job> for JobDetail {
    fn from(job: Job) -> Self {
        let result = job.result.map(|raw| match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(_) => Value::String(raw),
        });

        JobDetail {
            id: job.id,
            kind: job.kind,
            target: job.target,
            status: job.status,
            created_at: job.created_at,
            created_at_iso: iso(job.created_at),
            updated_at: job.updated_at,
            updated_at_iso: job.updated_at.and_then(iso),
            lease_until: job.lease_until,
            lease_until_iso: job.lease_until.and_then(iso),
            next_run_at: job.next_run_at,
            next_run_at_iso: job.next_run_at.and_then(iso),
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            result,
            error: job.error,
            sort_at: job.sort_at,
        }
    }
}

/// One page of the job listing, ordered by (`sort_at` DESC, `id` DESC).
/// `next_cursor` is present only when the page filled up, i.e. there may be
/// more rows past it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPage {
    pub items: Vec<JobDetail>,
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_deserializes_stored_result() {
        let job = Job {
            id: "j1".to_string(),
            kind: JobKind::Crawl,
            target: "https://example.com".to_string(),
            created_at: 1_700_000_000_000,
            status: JobStatus::Done,
            updated_at: Some(1_700_000_000_500),
            lease_until: None,
            attempts: 0,
            max_attempts: 3,
            next_run_at: None,
            result: Some(r#"{"status":200}"#.to_string()),
            error: None,
            sort_at: 1_700_000_000_500,
        };

        let detail = JobDetail::from(job);
        assert_eq!(detail.result, Some(serde_json::json!({"status": 200})));
        assert_eq!(
            detail.created_at_iso.as_deref(),
            Some("2023-11-14T22:13:20.000Z")
        );
        assert!(detail.lease_until_iso.is_none());
    }

    #[test]
    fn detail_falls_back_to_raw_string_result() {
        let job = Job {
            id: "j2".to_string(),
            kind: JobKind::Crawl,
            target: "https://example.com".to_string(),
            created_at: 1_700_000_000_000,
            status: JobStatus::Done,
            updated_at: None,
            lease_until: None,
            attempts: 0,
            max_attempts: 3,
            next_run_at: None,
            result: Some("not json {".to_string()),
            error: None,
            sort_at: 1_700_000_000_000,
        };

        let detail = JobDetail::from(job);
        assert_eq!(detail.result, Some(Value::String("not json {".to_string())));
    }

    #[test]
    fn status_parses_known_values_only() {
        assert_eq!("queued".parse::<JobStatus>(), Ok(JobStatus::Queued));
        assert_eq!("processing".parse::<JobStatus>(), Ok(JobStatus::Processing));
        assert!("paused".parse::<JobStatus>().is_err());
        assert!("".parse::<JobStatus>().is_err());
    }
}

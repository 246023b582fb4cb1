use capstan_core::{Job, JobInit, JobKind, JobStatus};

/// Frozen clock base used across the scenario tests.
pub const T0: i64 = 1_700_000_000_000;

pub fn crawl_init(id: &str, created_at: i64) -> JobInit {
    JobInit {
        id: id.to_string(),
        kind: JobKind::Crawl,
        target: format!("https://example.com/{id}"),
        created_at,
        max_attempts: None,
    }
}

/// The row-level invariants that must hold after every transition.
pub fn assert_invariants(job: &Job) {
    match job.status {
        JobStatus::Processing => assert!(
            job.lease_until.is_some(),
            "processing job {} must hold a lease",
            job.id
        ),
        JobStatus::Queued => assert!(
            job.lease_until.is_none(),
            "queued job {} must not hold a lease",
            job.id
        ),
        JobStatus::Done | JobStatus::Failed => {
            assert!(job.lease_until.is_none(), "terminal job {} holds a lease", job.id);
            assert!(
                job.next_run_at.is_none(),
                "terminal job {} has a next run",
                job.id
            );
        }
    }

    assert!(
        job.attempts <= job.max_attempts,
        "job {} attempts {} exceed max {}",
        job.id,
        job.attempts,
        job.max_attempts
    );
    if job.status == JobStatus::Failed {
        assert!(job.attempts >= job.max_attempts);
    }

    assert!(job.sort_at >= job.created_at);

    if job.result.is_some() {
        assert_eq!(job.status, JobStatus::Done);
    }
    if job.error.is_some() {
        assert!(
            job.status == JobStatus::Failed
                || (job.status == JobStatus::Queued && job.attempts > 0),
            "job {} carries an error in state {:?}",
            job.id,
            job.status
        );
    }
}

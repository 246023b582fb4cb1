/// The retry schedule. A job's first failure backs off briefly, the second
/// backs off a minute, and everything after that waits five minutes. The
/// schedule is a total function of the attempt count so the engine never has
/// to special-case out-of-range values.
const FIRST_BACKOFF_MS: i64 = 10_000;
const SECOND_BACKOFF_MS: i64 = 60_000;
const LATER_BACKOFF_MS: i64 = 300_000;

/// Backoff to apply after a failure that brought the job to `attempt`
/// dispatches ending in `fail`.
pub fn backoff_ms(attempt: i64) -> i64 {
    match attempt {
        i64::MIN..=1 => FIRST_BACKOFF_MS,
        2 => SECOND_BACKOFF_MS,
        _ => LATER_BACKOFF_MS,
    }
}

/// Where a finished execution sends its job next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Completed,
    Retry { next_run: i64 },
    Dead,
}

/// Map one finished execution onto the job state machine.
///
/// `attempts` is the post-increment count written by the claim, so the first
/// execution arrives here as `attempts = 1` and a job with `max_retries = r`
/// runs r + 1 times before it is dead.
pub fn decide(
    exit_code: i64,
    attempts: i64,
    max_retries: i64,
    backoff_base: i64,
    now: i64,
) -> Decision {
    if exit_code == 0 {
        return Decision::Completed;
    }

    if attempts > max_retries {
        return Decision::Dead;
    }

    Decision::Retry {
        next_run: now.saturating_add(backoff_delay_seconds(backoff_base, attempts)),
    }
}

/// `backoff_base ^ attempts`, using the post-increment attempt count so
/// successive delays grow as base^1, base^2, base^3. Saturates instead of
/// overflowing for large attempt counts.
pub fn backoff_delay_seconds(backoff_base: i64, attempts: i64) -> i64 {
    let base = backoff_base.max(1);
    let exp = attempts.clamp(1, u32::MAX as i64) as u32;

    base.checked_pow(exp).unwrap_or(i64::MAX)
}

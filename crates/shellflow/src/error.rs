use thiserror::Error;

/// Error kinds surfaced by queue operations.
///
/// `Transient` marks storage contention a caller is expected to retry
/// locally; everything under `Fatal` is an unexpected fault. Execution
/// failures (non-zero exit codes) are not errors at all: they are normal
/// input to the retry decision engine.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("job {0} already exists")]
    Conflict(String),

    #[error("job {0} not found")]
    NotFound(String),

    #[error("storage busy: {0}")]
    Transient(#[source] sqlx::Error),

    #[error("fatal: {0}")]
    Fatal(#[from] anyhow::Error),
}

impl QueueError {
    pub fn is_transient(&self) -> bool {
        matches!(self, QueueError::Transient(_))
    }
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        if is_busy(&err) {
            QueueError::Transient(err)
        } else {
            QueueError::Fatal(err.into())
        }
    }
}

/// SQLITE_BUSY = 5, SQLITE_LOCKED = 6. Extended result codes keep the
/// primary code in the low byte.
fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<u32>().ok())
            .map(|code| matches!(code & 0xff, 5 | 6))
            .unwrap_or(false),
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

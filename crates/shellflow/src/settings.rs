use sqlx::SqlitePool;
use std::time::Duration;

use crate::error::QueueError;

pub const BACKOFF_BASE_KEY: &str = "backoff_base";
pub const JOB_TIMEOUT_KEY: &str = "job_timeout";

pub const DEFAULT_BACKOFF_BASE: i64 = 2;
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 30;

/// Durable key/value store. The queue core interprets exactly two keys,
/// `backoff_base` and `job_timeout`; everything else is stored untouched.
#[derive(Clone)]
pub struct SettingsRepo {
    pool: SqlitePool,
}

impl SettingsRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, QueueError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    pub async fn get_or(&self, key: &str, default: &str) -> Result<String, QueueError> {
        Ok(self.get(key).await?.unwrap_or_else(|| default.to_string()))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), QueueError> {
        if key.trim().is_empty() {
            return Err(QueueError::InvalidInput(
                "settings key must not be empty".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO settings (key, value)
            VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Base of the exponential retry delay. Unparsable or sub-1 values fall
    /// back to the default.
    pub async fn backoff_base(&self) -> Result<i64, QueueError> {
        let raw = self.get(BACKOFF_BASE_KEY).await?;
        Ok(raw
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|base| *base >= 1)
            .unwrap_or(DEFAULT_BACKOFF_BASE))
    }

    /// Wall-clock deadline for a single execution.
    pub async fn job_timeout(&self) -> Result<Duration, QueueError> {
        let raw = self.get(JOB_TIMEOUT_KEY).await?;
        let secs = raw
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs >= 1)
            .unwrap_or(DEFAULT_JOB_TIMEOUT_SECS);

        Ok(Duration::from_secs(secs))
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::jobs::model::Job;

#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: String,
    pub command: String,
    pub state: String,
    pub attempts: i64,
    pub max_retries: i64,
    pub priority: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub next_run: i64,
    pub last_exit_code: Option<i64>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            command: job.command,
            state: job.state,
            attempts: job.attempts,
            max_retries: job.max_retries,
            priority: job.priority,
            created_at: job.created_at,
            updated_at: job.updated_at,
            next_run: job.next_run,
            last_exit_code: job.last_exit_code,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueMetrics {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub dead: i64,
}

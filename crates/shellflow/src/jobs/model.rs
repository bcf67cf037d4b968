use chrono::{DateTime, Utc};

use serde::Deserialize;

use crate::error::QueueError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub state: String,
    pub attempts: i64,
    pub max_retries: i64,
    pub priority: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Earliest claimable time, epoch seconds. Only meaningful while the
    /// job is pending.
    pub next_run: i64,
    pub last_exit_code: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Dead,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Dead => "dead",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "dead" => Some(Self::Dead),
            _ => None,
        }
    }
}

fn default_max_retries() -> i64 {
    3
}

/// Submission payload accepted by enqueue:
/// `{"id":"job1","command":"echo hello","max_retries":3,"priority":0,"run_at":0}`
#[derive(Debug, Clone, Deserialize)]
pub struct JobSubmission {
    pub id: String,
    pub command: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,
    #[serde(default)]
    pub priority: i64,
    /// Epoch seconds; defaults to now.
    #[serde(default)]
    pub run_at: Option<i64>,
}

impl JobSubmission {
    pub fn from_json(raw: &str) -> Result<Self, QueueError> {
        let submission: JobSubmission =
            serde_json::from_str(raw).map_err(|e| QueueError::InvalidInput(e.to_string()))?;
        submission.validate()?;
        Ok(submission)
    }

    pub fn validate(&self) -> Result<(), QueueError> {
        if self.id.trim().is_empty() {
            return Err(QueueError::InvalidInput(
                "job id must not be empty".to_string(),
            ));
        }
        if self.command.trim().is_empty() {
            return Err(QueueError::InvalidInput(
                "command must not be empty".to_string(),
            ));
        }
        if self.max_retries < 0 {
            return Err(QueueError::InvalidInput(
                "max_retries must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

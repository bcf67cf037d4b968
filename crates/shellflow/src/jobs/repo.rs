use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{is_unique_violation, QueueError};
use crate::jobs::model::{Job, JobState, JobSubmission};
use crate::jobs::retry::Decision;

#[derive(Clone)]
pub struct JobsRepo {
    pool: SqlitePool,
}

impl JobsRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ----------------------------
    // Enqueue
    // ----------------------------

    /// Insert a new pending job. A duplicate id is a conflict, never an
    /// overwrite.
    pub async fn enqueue(&self, submission: &JobSubmission) -> Result<String, QueueError> {
        submission.validate()?;

        let now = Utc::now();
        let next_run = submission.run_at.unwrap_or_else(|| now.timestamp());

        let res = sqlx::query(
            r#"
            INSERT INTO jobs (id, command, state, attempts, max_retries, priority, created_at, updated_at, next_run)
            VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&submission.id)
        .bind(&submission.command)
        .bind(JobState::Pending.as_str())
        .bind(submission.max_retries)
        .bind(submission.priority)
        .bind(now)
        .bind(now)
        .bind(next_run)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(submission.id.clone()),
            Err(err) if is_unique_violation(&err) => {
                Err(QueueError::Conflict(submission.id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    // ----------------------------
    // Claim protocol
    // ----------------------------

    /// Claim exactly one eligible pending job for the calling worker.
    ///
    /// Eligible means `state = pending` and `next_run <= now`; the winner is
    /// the highest-priority job, ties broken by earliest `created_at`.
    /// Selection, mutation and row retrieval are a single SQL statement: the
    /// conditional UPDATE picks the winner and RETURNING hands back the row
    /// that was actually mutated, so two concurrent claimants can never walk
    /// away with the same job or with each other's job. Returns `None`
    /// without blocking when nothing is eligible.
    ///
    /// A worker killed before persisting an outcome leaves its claimed job
    /// in `processing` indefinitely; there is no lease expiry to reclaim it.
    pub async fn claim_one(&self, now: i64) -> Result<Option<Job>, QueueError> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET state = ?1,
                attempts = attempts + 1,
                updated_at = ?2
            WHERE id = (
                SELECT id FROM jobs
                WHERE state = ?3 AND next_run <= ?4
                ORDER BY priority DESC, created_at ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(JobState::Processing.as_str())
        .bind(Utc::now())
        .bind(JobState::Pending.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    // ----------------------------
    // State transitions
    // ----------------------------

    /// Persist the outcome of an executed attempt as one atomic update.
    /// Only a `processing` row may be finished.
    pub async fn finish(
        &self,
        job_id: &str,
        decision: Decision,
        exit_code: i64,
    ) -> Result<(), QueueError> {
        let (state, next_run) = match decision {
            Decision::Completed => (JobState::Completed, None),
            Decision::Retry { next_run } => (JobState::Pending, Some(next_run)),
            Decision::Dead => (JobState::Dead, None),
        };

        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?2,
                next_run = COALESCE(?3, next_run),
                last_exit_code = ?4,
                updated_at = ?5
            WHERE id = ?1 AND state = ?6
            "#,
        )
        .bind(job_id)
        .bind(state.as_str())
        .bind(next_run)
        .bind(exit_code)
        .bind(Utc::now())
        .bind(JobState::Processing.as_str())
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(QueueError::Fatal(anyhow::anyhow!(
                "job {job_id} is no longer processing; refusing to record outcome"
            )));
        }

        Ok(())
    }

    /// Move a dead job back to pending with its attempt budget restored.
    /// Fails with NotFound unless the job exists and is dead.
    pub async fn dlq_retry(&self, job_id: &str, now: i64) -> Result<(), QueueError> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?2,
                attempts = 0,
                next_run = ?3,
                updated_at = ?4
            WHERE id = ?1 AND state = ?5
            "#,
        )
        .bind(job_id)
        .bind(JobState::Pending.as_str())
        .bind(now)
        .bind(Utc::now())
        .bind(JobState::Dead.as_str())
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(QueueError::NotFound(job_id.to_string()));
        }

        Ok(())
    }

    // ----------------------------
    // Reads / projections
    // ----------------------------

    pub async fn get_job(&self, job_id: &str) -> Result<Option<Job>, QueueError> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    pub async fn list_jobs(&self, state: Option<JobState>) -> Result<Vec<Job>, QueueError> {
        let rows = match state {
            Some(state) => {
                sqlx::query_as::<_, Job>(
                    r#"
                    SELECT * FROM jobs
                    WHERE state = ?1
                    ORDER BY created_at ASC
                    "#,
                )
                .bind(state.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Job>("SELECT * FROM jobs ORDER BY created_at ASC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows)
    }

    pub async fn list_dlq(&self) -> Result<Vec<Job>, QueueError> {
        let rows = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE state = ?1
            ORDER BY updated_at ASC
            "#,
        )
        .bind(JobState::Dead.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Returns (pending, processing, completed, dead).
    pub async fn counts_by_state(&self) -> Result<(i64, i64, i64, i64), QueueError> {
        let mut counts = (0_i64, 0_i64, 0_i64, 0_i64);

        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT state, COUNT(*) FROM jobs GROUP BY state",
        )
        .fetch_all(&self.pool)
        .await?;

        for (state, count) in rows {
            match JobState::parse(&state) {
                Some(JobState::Pending) => counts.0 = count,
                Some(JobState::Processing) => counts.1 = count,
                Some(JobState::Completed) => counts.2 = count,
                Some(JobState::Dead) => counts.3 = count,
                None => {}
            }
        }

        Ok(counts)
    }
}

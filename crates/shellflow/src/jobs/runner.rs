use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::error::QueueError;
use crate::jobs::executor::CommandExecutor;
use crate::jobs::repo::JobsRepo;
use crate::jobs::retry::{decide, Decision};
use crate::settings::SettingsRepo;

const TRANSIENT_RETRY_SLEEP: Duration = Duration::from_millis(500);
const FAULT_PAUSE: Duration = Duration::from_secs(1);

/// What a single loop iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Idle,
    Ran {
        job_id: String,
        decision: Decision,
        exit_code: i64,
    },
}

/// Drives one job at a time: claim, execute, decide, persist.
pub struct Worker {
    jobs: JobsRepo,
    settings: SettingsRepo,
    executor: CommandExecutor,
    worker_id: String,
    idle_interval: Duration,
}

impl Worker {
    pub fn new(
        jobs: JobsRepo,
        settings: SettingsRepo,
        executor: CommandExecutor,
        worker_id: impl Into<String>,
        idle_interval: Duration,
    ) -> Self {
        Self {
            jobs,
            settings,
            executor,
            worker_id: worker_id.into(),
            idle_interval,
        }
    }

    /// Claim and drive at most one job to a persisted outcome.
    pub async fn run_once(&self) -> Result<Tick, QueueError> {
        // read config before claiming: a settings hiccup here leaves the
        // queue untouched instead of stranding a claimed job. Slightly stale
        // values are fine.
        let backoff_base = self.settings.backoff_base().await?;
        let timeout = self.settings.job_timeout().await?;

        let now = Utc::now().timestamp();
        let Some(job) = self.jobs.claim_one(now).await? else {
            return Ok(Tick::Idle);
        };

        println!(
            "[{}] running job id={} attempt={}/{} command={:?}",
            self.worker_id,
            job.id,
            job.attempts,
            job.max_retries + 1,
            job.command
        );

        let outcome = self
            .executor
            .run(&job.id, &job.command, timeout)
            .await
            .map_err(QueueError::Fatal)?;

        let decision = decide(
            outcome.exit_code,
            job.attempts,
            job.max_retries,
            backoff_base,
            Utc::now().timestamp(),
        );

        // the claim is ours alone; ride out brief contention so the outcome
        // is not lost
        loop {
            match self.jobs.finish(&job.id, decision, outcome.exit_code).await {
                Ok(()) => break,
                Err(err) if err.is_transient() => {
                    println!(
                        "[{}] storage busy persisting job id={}, retrying: {err}",
                        self.worker_id, job.id
                    );
                    tokio::time::sleep(TRANSIENT_RETRY_SLEEP).await;
                }
                Err(err) => return Err(err),
            }
        }

        match decision {
            Decision::Completed => println!(
                "[{}] job id={} completed latency_ms={}",
                self.worker_id,
                job.id,
                outcome.duration.as_millis()
            ),
            Decision::Retry { next_run } => println!(
                "[{}] job id={} failed exit_code={}{} attempt={}/{} retry_at={}",
                self.worker_id,
                job.id,
                outcome.exit_code,
                if outcome.timed_out { " (timeout)" } else { "" },
                job.attempts,
                job.max_retries + 1,
                next_run
            ),
            Decision::Dead => println!(
                "[{}] job id={} moved to dlq exit_code={}{}",
                self.worker_id,
                job.id,
                outcome.exit_code,
                if outcome.timed_out { " (timeout)" } else { "" }
            ),
        }

        Ok(Tick::Ran {
            job_id: job.id,
            decision,
            exit_code: outcome.exit_code,
        })
    }

    /// Loop until the stop flag flips to true.
    ///
    /// The flag is consulted only between iterations: a command that is
    /// already executing always finishes and has its outcome persisted
    /// before the worker exits. An idle worker wakes from its sleep as soon
    /// as the flag flips, so it exits promptly.
    ///
    /// Transient storage contention is retried after a short sleep and never
    /// surfaced; any other fault is logged and followed by a pause, and the
    /// loop continues so one bad iteration cannot take the worker down.
    pub async fn run_forever(&self, mut stop: watch::Receiver<bool>) -> anyhow::Result<()> {
        loop {
            if *stop.borrow() {
                break;
            }

            match self.run_once().await {
                Ok(Tick::Ran { .. }) => {}
                Ok(Tick::Idle) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.idle_interval) => {}
                        _ = stop.changed() => {}
                    }
                }
                Err(err) if err.is_transient() => {
                    println!("[{}] storage busy, retrying: {err}", self.worker_id);
                    tokio::time::sleep(TRANSIENT_RETRY_SLEEP).await;
                }
                Err(err) => {
                    eprintln!("[{}] worker error: {err}", self.worker_id);
                    tokio::time::sleep(FAULT_PAUSE).await;
                }
            }
        }

        println!("[{}] worker exiting", self.worker_id);
        Ok(())
    }
}

mod common;

use chrono::Utc;
use common::setup_db;
use shellflow::jobs::model::JobSubmission;
use shellflow::jobs::retry::{backoff_delay_seconds, decide, Decision};
use shellflow::jobs::{JobState, JobsRepo};

#[test]
fn zero_exit_always_completes() {
    assert_eq!(decide(0, 1, 3, 2, 100), Decision::Completed);
    // even an exhausted attempt budget cannot stop a success
    assert_eq!(decide(0, 9, 3, 2, 100), Decision::Completed);
}

#[test]
fn failure_within_budget_schedules_backoff() {
    assert_eq!(decide(1, 1, 2, 2, 100), Decision::Retry { next_run: 102 });
    assert_eq!(decide(1, 2, 2, 2, 100), Decision::Retry { next_run: 104 });
    assert_eq!(decide(70, 1, 1, 3, 100), Decision::Retry { next_run: 103 });
}

#[test]
fn failure_past_budget_is_dead() {
    // post-increment attempts: max_retries=2 allows exactly 3 executions
    assert_eq!(decide(1, 3, 2, 2, 100), Decision::Dead);
    assert_eq!(decide(1, 1, 0, 2, 100), Decision::Dead);
}

#[test]
fn delays_grow_exponentially() {
    assert_eq!(backoff_delay_seconds(2, 1), 2);
    assert_eq!(backoff_delay_seconds(2, 2), 4);
    assert_eq!(backoff_delay_seconds(2, 3), 8);
    assert_eq!(backoff_delay_seconds(3, 3), 27);
}

#[test]
fn huge_attempt_counts_saturate() {
    assert_eq!(backoff_delay_seconds(2, 80), i64::MAX);
    assert_eq!(decide(1, 80, 100, 2, 100), Decision::Retry { next_run: i64::MAX });
}

#[test]
fn sub_one_base_is_clamped() {
    assert_eq!(backoff_delay_seconds(0, 3), 1);
    assert_eq!(backoff_delay_seconds(-2, 3), 1);
}

#[tokio::test]
async fn failing_job_walks_backoff_then_dlq() {
    let db = setup_db().await;
    let jobs = JobsRepo::new(db.pool.clone());

    let submission =
        JobSubmission::from_json(r#"{"id":"f1","command":"false","max_retries":2}"#).unwrap();
    jobs.enqueue(&submission).await.unwrap();

    // attempt 1 fails: retry in base^1 = 2s
    let now = Utc::now().timestamp();
    let job = jobs.claim_one(now).await.unwrap().unwrap();
    assert_eq!(job.attempts, 1);

    let decision = decide(1, job.attempts, job.max_retries, 2, now);
    assert_eq!(decision, Decision::Retry { next_run: now + 2 });
    jobs.finish(&job.id, decision, 1).await.unwrap();

    let row = jobs.get_job("f1").await.unwrap().unwrap();
    assert_eq!(row.state, JobState::Pending.as_str());
    assert_eq!(row.next_run, now + 2);
    assert_eq!(row.last_exit_code, Some(1));

    // backoff holds the job back until its next_run passes
    assert!(jobs.claim_one(now).await.unwrap().is_none());

    // attempt 2 fails: retry in base^2 = 4s
    let job = jobs.claim_one(now + 2).await.unwrap().unwrap();
    assert_eq!(job.attempts, 2);

    let decision = decide(1, job.attempts, job.max_retries, 2, now);
    assert_eq!(decision, Decision::Retry { next_run: now + 4 });
    jobs.finish(&job.id, decision, 1).await.unwrap();

    // attempt 3 exhausts the budget: attempts=3 > max_retries=2
    let job = jobs.claim_one(now + 4).await.unwrap().unwrap();
    assert_eq!(job.attempts, 3);

    let decision = decide(1, job.attempts, job.max_retries, 2, now);
    assert_eq!(decision, Decision::Dead);
    jobs.finish(&job.id, decision, 1).await.unwrap();

    let row = jobs.get_job("f1").await.unwrap().unwrap();
    assert_eq!(row.state, JobState::Dead.as_str());
    assert_eq!(row.attempts, 3);
}

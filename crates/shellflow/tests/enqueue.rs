mod common;

use chrono::Utc;
use common::setup_db;
use shellflow::error::QueueError;
use shellflow::jobs::model::{JobState, JobSubmission};
use shellflow::jobs::JobsRepo;

#[tokio::test]
async fn enqueue_inserts_a_pending_job() {
    let db = setup_db().await;
    let jobs = JobsRepo::new(db.pool.clone());

    let submission = JobSubmission::from_json(
        r#"{"id":"job1","command":"echo hello","max_retries":2,"priority":5}"#,
    )
    .unwrap();

    let id = jobs.enqueue(&submission).await.unwrap();
    assert_eq!(id, "job1");

    let job = jobs.get_job("job1").await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Pending.as_str());
    assert_eq!(job.command, "echo hello");
    assert_eq!(job.attempts, 0);
    assert_eq!(job.max_retries, 2);
    assert_eq!(job.priority, 5);
    assert!(job.next_run <= Utc::now().timestamp());
    assert_eq!(job.last_exit_code, None);
}

#[tokio::test]
async fn duplicate_id_is_a_conflict_not_an_overwrite() {
    let db = setup_db().await;
    let jobs = JobsRepo::new(db.pool.clone());

    let first =
        JobSubmission::from_json(r#"{"id":"dup","command":"echo one"}"#).unwrap();
    jobs.enqueue(&first).await.unwrap();

    let second =
        JobSubmission::from_json(r#"{"id":"dup","command":"echo two"}"#).unwrap();
    let err = jobs.enqueue(&second).await.unwrap_err();
    assert!(matches!(err, QueueError::Conflict(ref id) if id == "dup"));

    // the original row is untouched
    let job = jobs.get_job("dup").await.unwrap().unwrap();
    assert_eq!(job.command, "echo one");
}

#[tokio::test]
async fn future_run_at_is_stored_as_next_run() {
    let db = setup_db().await;
    let jobs = JobsRepo::new(db.pool.clone());

    let run_at = Utc::now().timestamp() + 3600;
    let submission = JobSubmission::from_json(&format!(
        r#"{{"id":"later","command":"true","run_at":{run_at}}}"#
    ))
    .unwrap();

    jobs.enqueue(&submission).await.unwrap();

    let job = jobs.get_job("later").await.unwrap().unwrap();
    assert_eq!(job.next_run, run_at);
}

#[test]
fn defaults_are_applied() {
    let submission =
        JobSubmission::from_json(r#"{"id":"j","command":"true"}"#).unwrap();
    assert_eq!(submission.max_retries, 3);
    assert_eq!(submission.priority, 0);
    assert_eq!(submission.run_at, None);
}

#[test]
fn malformed_json_is_invalid_input() {
    let err = JobSubmission::from_json("not json at all").unwrap_err();
    assert!(matches!(err, QueueError::InvalidInput(_)));
}

#[test]
fn missing_required_fields_are_invalid_input() {
    let err = JobSubmission::from_json(r#"{"id":"j"}"#).unwrap_err();
    assert!(matches!(err, QueueError::InvalidInput(_)));

    let err = JobSubmission::from_json(r#"{"command":"true"}"#).unwrap_err();
    assert!(matches!(err, QueueError::InvalidInput(_)));
}

#[test]
fn empty_fields_are_invalid_input() {
    let err = JobSubmission::from_json(r#"{"id":"  ","command":"true"}"#).unwrap_err();
    assert!(matches!(err, QueueError::InvalidInput(_)));

    let err = JobSubmission::from_json(r#"{"id":"j","command":""}"#).unwrap_err();
    assert!(matches!(err, QueueError::InvalidInput(_)));
}

#[test]
fn negative_max_retries_is_invalid_input() {
    let err =
        JobSubmission::from_json(r#"{"id":"j","command":"true","max_retries":-1}"#).unwrap_err();
    assert!(matches!(err, QueueError::InvalidInput(_)));
}

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Fresh SQLite database in a temp directory, migrated and ready. The temp
/// directory lives as long as the handle.
pub struct TestDb {
    pub pool: SqlitePool,
    dir: tempfile::TempDir,
}

impl TestDb {
    #[allow(dead_code)]
    pub fn logs_dir(&self) -> PathBuf {
        self.dir.path().join("logs")
    }
}

pub async fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("queue.db");

    let opts = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(opts)
        .await
        .expect("failed to connect to temp sqlite db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    TestDb { pool, dir }
}

/// Insert a pending job directly, bypassing submission validation.
#[allow(dead_code)]
pub async fn insert_job(
    pool: &SqlitePool,
    id: &str,
    command: &str,
    max_retries: i64,
    priority: i64,
    next_run: i64,
) {
    let now = Utc::now();
    insert_job_created_at(pool, id, command, max_retries, priority, next_run, now).await;
}

#[allow(dead_code)]
pub async fn insert_job_created_at(
    pool: &SqlitePool,
    id: &str,
    command: &str,
    max_retries: i64,
    priority: i64,
    next_run: i64,
    created_at: DateTime<Utc>,
) {
    sqlx::query(
        r#"
        INSERT INTO jobs (id, command, state, attempts, max_retries, priority, created_at, updated_at, next_run)
        VALUES (?1, ?2, 'pending', 0, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(id)
    .bind(command)
    .bind(max_retries)
    .bind(priority)
    .bind(created_at)
    .bind(created_at)
    .bind(next_run)
    .execute(pool)
    .await
    .expect("failed to insert job");
}

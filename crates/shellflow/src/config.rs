use std::path::PathBuf;

use uuid::Uuid;

/// Process-level configuration, loaded once from the environment and passed
/// explicitly into the components that need it.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_path: PathBuf,
    pub logs_dir: PathBuf,
    pub pid_file: PathBuf,
    pub worker_id: String,
    pub idle_interval_ms: u64,
    pub admin_addr: Option<String>,
    pub migrate_on_startup: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let data_dir = env_or_fallback("SHELLFLOW_DATA_DIR", "DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let database_path = env_or_fallback("SHELLFLOW_DB_PATH", "DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("queue.db"));

        let logs_dir = env_or_fallback("SHELLFLOW_LOGS_DIR", "LOGS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("logs"));

        let pid_file = env_or_fallback("SHELLFLOW_PID_FILE", "PID_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("worker_pids.txt"));

        let worker_id = env_or_fallback("SHELLFLOW_WORKER_ID", "WORKER_ID")
            .unwrap_or_else(|| format!("worker-{}", Uuid::new_v4().simple()));

        let idle_interval_ms = env_or_fallback("SHELLFLOW_IDLE_INTERVAL_MS", "IDLE_INTERVAL_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(800);

        let admin_addr = env_or_fallback("SHELLFLOW_ADMIN_ADDR", "ADMIN_ADDR")
            .and_then(|s| normalize_optional_addr(&s));

        let migrate_on_startup = env_bool("SHELLFLOW_MIGRATE_ON_STARTUP").unwrap_or(true);

        Ok(Self {
            database_path,
            logs_dir,
            pid_file,
            worker_id,
            idle_interval_ms,
            admin_addr,
            migrate_on_startup,
        })
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".shellflow")
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn normalize_optional_addr(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if matches!(v.to_lowercase().as_str(), "0" | "off" | "false" | "none") {
        return None;
    }
    Some(v.to_string())
}

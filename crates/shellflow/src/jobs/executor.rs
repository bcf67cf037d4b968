use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;

/// Exit code recorded when a command is killed at the deadline. Real
/// processes cannot return it, so it is unambiguous downstream.
pub const TIMEOUT_EXIT_CODE: i64 = -1;

#[derive(Debug, Clone, Copy)]
pub struct ExecOutcome {
    pub exit_code: i64,
    pub timed_out: bool,
    pub duration: Duration,
}

/// Runs a job's shell command as a child process under a hard wall-clock
/// deadline, appending stdout/stderr to a per-job log file.
#[derive(Clone)]
pub struct CommandExecutor {
    logs_dir: PathBuf,
}

impl CommandExecutor {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
        }
    }

    /// Run `command` under `sh -c`. Finishing within `timeout` yields the
    /// real exit code; past the deadline the child is killed and the
    /// sentinel exit code is reported instead. The deadline is an awaited
    /// timeout over `child.wait()`, not a poll loop.
    pub async fn run(
        &self,
        job_id: &str,
        command: &str,
        timeout: Duration,
    ) -> anyhow::Result<ExecOutcome> {
        let log = self.open_log(job_id)?;
        let started = Instant::now();

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log))
            .spawn()?;

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                Ok(ExecOutcome {
                    exit_code: exit_code_of(status),
                    timed_out: false,
                    duration: started.elapsed(),
                })
            }
            Err(_) => {
                // start_kill is best-effort: the child may exit right at the
                // deadline. wait() reaps it either way.
                child.start_kill().ok();
                let _ = child.wait().await;

                Ok(ExecOutcome {
                    exit_code: TIMEOUT_EXIT_CODE,
                    timed_out: true,
                    duration: started.elapsed(),
                })
            }
        }
    }

    pub fn log_path(&self, job_id: &str) -> PathBuf {
        // job ids are caller-supplied strings; keep them from escaping the
        // logs directory.
        self.logs_dir
            .join(format!("{}.log", job_id.replace(['/', '\\'], "_")))
    }

    fn open_log(&self, job_id: &str) -> std::io::Result<std::fs::File> {
        std::fs::create_dir_all(&self.logs_dir)?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(job_id))
    }
}

fn exit_code_of(status: std::process::ExitStatus) -> i64 {
    use std::os::unix::process::ExitStatusExt;

    match status.code() {
        Some(code) => code as i64,
        // killed by a signal: report 128 + signo the way shells do
        None => status
            .signal()
            .map(|sig| 128 + sig as i64)
            .unwrap_or(TIMEOUT_EXIT_CODE),
    }
}

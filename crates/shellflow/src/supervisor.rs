//! PID-file registry for worker processes. Process supervision plumbing
//! only; the queue core never consults it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

#[derive(Clone)]
pub struct WorkerRegistry {
    pid_file: PathBuf,
}

impl WorkerRegistry {
    pub fn new(pid_file: impl Into<PathBuf>) -> Self {
        Self {
            pid_file: pid_file.into(),
        }
    }

    /// Start `count` detached worker processes and record their pids.
    pub fn spawn_workers(&self, worker_bin: &Path, count: usize) -> anyhow::Result<Vec<u32>> {
        let mut pids = Vec::with_capacity(count);

        for _ in 0..count {
            let child = Command::new(worker_bin)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()?;
            pids.push(child.id());
        }

        self.append(&pids)?;
        Ok(pids)
    }

    /// All recorded pids, whether or not the processes still run.
    pub fn list(&self) -> anyhow::Result<Vec<i32>> {
        if !self.pid_file.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.pid_file)?;
        Ok(raw
            .lines()
            .filter_map(|line| line.trim().parse::<i32>().ok())
            .collect())
    }

    /// Recorded pids that still answer a signal-0 probe.
    pub fn alive(&self) -> anyhow::Result<Vec<i32>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|pid| kill(Pid::from_raw(*pid), None).is_ok())
            .collect())
    }

    /// SIGTERM every recorded worker and clear the registry. Workers finish
    /// their in-flight job before exiting; this call does not wait for them.
    /// Returns the pids that were actually signalled.
    pub fn signal_stop(&self) -> anyhow::Result<Vec<i32>> {
        let mut signalled = Vec::new();

        for pid in self.list()? {
            match kill(Pid::from_raw(pid), Signal::SIGTERM) {
                Ok(()) => signalled.push(pid),
                Err(nix::errno::Errno::ESRCH) => {}
                Err(err) => eprintln!("failed to signal pid {pid}: {err}"),
            }
        }

        let _ = fs::remove_file(&self.pid_file);
        Ok(signalled)
    }

    fn append(&self, pids: &[u32]) -> anyhow::Result<()> {
        if let Some(parent) = self.pid_file.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.pid_file)?;

        for pid in pids {
            writeln!(file, "{pid}")?;
        }

        Ok(())
    }
}

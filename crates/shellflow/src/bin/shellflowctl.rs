use std::env;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use shellflow::config::Config;
use shellflow::db;
use shellflow::error::QueueError;
use shellflow::jobs::model::{JobState, JobSubmission};
use shellflow::jobs::JobsRepo;
use shellflow::settings::SettingsRepo;
use shellflow::supervisor::WorkerRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        usage();
        std::process::exit(2);
    }

    let cfg = Config::from_env()?;
    let pool = db::make_pool(&cfg.database_path).await?;
    db::run_migrations(&pool).await?;

    let jobs = JobsRepo::new(pool.clone());
    let settings = SettingsRepo::new(pool.clone());
    let registry = WorkerRegistry::new(cfg.pid_file.clone());

    let result = match args[1].as_str() {
        "enqueue" => {
            let raw = args.get(2).map(String::as_str).unwrap_or_else(|| {
                eprintln!("usage: shellflowctl enqueue '<job json>'");
                std::process::exit(2);
            });
            enqueue(&jobs, raw).await
        }
        "status" => status(&jobs, &registry).await,
        "list" => {
            let state = flag_value(&args[2..], "--state");
            list(&jobs, state.as_deref()).await
        }
        "dlq" => match args.get(2).map(String::as_str) {
            Some("list") => dlq_list(&jobs).await,
            Some("retry") => {
                let id = args.get(3).map(String::as_str).unwrap_or_else(|| {
                    eprintln!("usage: shellflowctl dlq retry <job_id>");
                    std::process::exit(2);
                });
                dlq_retry(&jobs, id).await
            }
            _ => {
                eprintln!("usage: shellflowctl dlq <list|retry>");
                std::process::exit(2);
            }
        },
        "config" => match args.get(2).map(String::as_str) {
            Some("get") => {
                let key = args.get(3).map(String::as_str).unwrap_or_else(|| {
                    eprintln!("usage: shellflowctl config get <key>");
                    std::process::exit(2);
                });
                config_get(&settings, key).await
            }
            Some("set") => match (args.get(3), args.get(4)) {
                (Some(key), Some(value)) => config_set(&settings, key, value).await,
                _ => {
                    eprintln!("usage: shellflowctl config set <key> <value>");
                    std::process::exit(2);
                }
            },
            _ => {
                eprintln!("usage: shellflowctl config <get|set>");
                std::process::exit(2);
            }
        },
        "worker" => match args.get(2).map(String::as_str) {
            Some("start") => {
                let count = flag_value(&args[3..], "--count")
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(1);
                worker_start(&registry, count)
            }
            Some("stop") => worker_stop(&registry),
            _ => {
                eprintln!("usage: shellflowctl worker <start|stop>");
                std::process::exit(2);
            }
        },
        other => {
            eprintln!("Unknown command: {other}");
            usage();
            std::process::exit(2);
        }
    };

    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }

    Ok(())
}

fn usage() {
    eprintln!(
        "shellflowctl <command>\n\
         Commands:\n\
         - enqueue '<job json>'\n\
         - status\n\
         - list [--state <pending|processing|completed|dead>]\n\
         - dlq list\n\
         - dlq retry <job_id>\n\
         - config get <key>\n\
         - config set <key> <value>\n\
         - worker start [--count <n>]\n\
         - worker stop\n\
         \n\
         Uses SHELLFLOW_DATA_DIR (default ~/.shellflow).\n"
    );
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == flag {
            return iter.next().cloned();
        }
        if let Some(value) = arg.strip_prefix(&format!("{flag}=")) {
            return Some(value.to_string());
        }
    }
    None
}

async fn enqueue(jobs: &JobsRepo, raw: &str) -> anyhow::Result<()> {
    let submission = JobSubmission::from_json(raw)?;
    let job_id = jobs.enqueue(&submission).await?;
    println!("enqueued job {job_id}");
    Ok(())
}

async fn status(jobs: &JobsRepo, registry: &WorkerRegistry) -> anyhow::Result<()> {
    let (pending, processing, completed, dead) = jobs.counts_by_state().await?;

    println!("Job states:");
    println!("  {:10} : {}", "pending", pending);
    println!("  {:10} : {}", "processing", processing);
    println!("  {:10} : {}", "completed", completed);
    println!("  {:10} : {}", "dead", dead);

    let alive = registry.alive()?;
    println!("Active worker pids: {alive:?}");
    Ok(())
}

async fn list(jobs: &JobsRepo, state: Option<&str>) -> anyhow::Result<()> {
    let filter = match state {
        Some(raw) => Some(
            JobState::parse(raw)
                .ok_or_else(|| QueueError::InvalidInput(format!("unknown job state: {raw}")))?,
        ),
        None => None,
    };

    for job in jobs.list_jobs(filter).await? {
        println!(
            "{:20} {:10} attempts={}/{} priority={} next_run={} cmd={:?}",
            job.id,
            job.state,
            job.attempts,
            job.max_retries,
            job.priority,
            fmt_epoch(job.next_run),
            job.command
        );
    }
    Ok(())
}

async fn dlq_list(jobs: &JobsRepo) -> anyhow::Result<()> {
    let rows = jobs.list_dlq().await?;
    if rows.is_empty() {
        println!("DLQ is empty.");
        return Ok(());
    }

    for job in rows {
        println!(
            "{:20} last_exit={:?} attempts={}/{} cmd={:?}",
            job.id, job.last_exit_code, job.attempts, job.max_retries, job.command
        );
    }
    Ok(())
}

async fn dlq_retry(jobs: &JobsRepo, job_id: &str) -> anyhow::Result<()> {
    jobs.dlq_retry(job_id, Utc::now().timestamp()).await?;
    println!("moved {job_id} back to pending");
    Ok(())
}

async fn config_get(settings: &SettingsRepo, key: &str) -> anyhow::Result<()> {
    let value = settings.get_or(key, "").await?;
    println!("{key} = {value}");
    Ok(())
}

async fn config_set(settings: &SettingsRepo, key: &str, value: &str) -> anyhow::Result<()> {
    settings.set(key, value).await?;
    println!("config {key} set to {value}");
    Ok(())
}

fn worker_start(registry: &WorkerRegistry, count: usize) -> anyhow::Result<()> {
    let worker_bin = worker_bin_path()?;
    let pids = registry.spawn_workers(&worker_bin, count)?;
    for pid in pids {
        println!("started worker pid={pid}");
    }
    Ok(())
}

fn worker_stop(registry: &WorkerRegistry) -> anyhow::Result<()> {
    let signalled = registry.signal_stop()?;
    if signalled.is_empty() {
        println!("no running workers found");
        return Ok(());
    }
    for pid in signalled {
        println!("signalled pid {pid} for termination");
    }
    Ok(())
}

fn worker_bin_path() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::var_os("SHELLFLOW_WORKER_BIN") {
        return Ok(PathBuf::from(path));
    }

    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| anyhow::anyhow!("cannot locate directory of {}", exe.display()))?;
    Ok(dir.join("shellflow-worker"))
}

fn fmt_epoch(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| "-".to_string())
}

use std::time::Duration;

use shellflow::api;
use shellflow::config::Config;
use shellflow::db;
use shellflow::jobs::{CommandExecutor, JobsRepo, Worker};
use shellflow::settings::SettingsRepo;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env()?;

    println!(
        "shellflow worker starting... worker_id={} db={} logs_dir={} idle_interval_ms={} api={} migrate_on_startup={}",
        cfg.worker_id,
        cfg.database_path.display(),
        cfg.logs_dir.display(),
        cfg.idle_interval_ms,
        cfg.admin_addr.clone().unwrap_or_else(|| "disabled".to_string()),
        cfg.migrate_on_startup,
    );

    let pool = db::make_pool(&cfg.database_path).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let jobs_repo = JobsRepo::new(pool.clone());
    let settings_repo = SettingsRepo::new(pool.clone());
    let executor = CommandExecutor::new(cfg.logs_dir.clone());

    let worker = Worker::new(
        jobs_repo.clone(),
        settings_repo.clone(),
        executor,
        cfg.worker_id.clone(),
        Duration::from_millis(cfg.idle_interval_ms),
    );

    // ---- Shutdown signal task ----
    // SIGTERM/SIGINT flip the stop flag; the worker finishes its in-flight
    // job, persists the outcome, and exits without claiming further work.
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let signal_worker_id = cfg.worker_id.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
        println!("[{signal_worker_id}] graceful shutdown requested, finishing current job before exit");
        let _ = stop_tx.send(true);
    });

    // ---- API task ----
    let api_addr = cfg.admin_addr.clone();
    let api_state = api::ApiState {
        jobs: jobs_repo,
        settings: settings_repo,
    };
    let app = api::router(api_state);

    let api_handle = tokio::spawn(async move {
        if let Some(addr) = api_addr {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            println!("admin api listening on http://{addr}");
            axum::serve(listener, app).await?;
        } else {
            std::future::pending::<()>().await;
        }
        Ok::<(), anyhow::Error>(())
    });

    tokio::select! {
        res = worker.run_forever(stop_rx) => res?,
        res = api_handle => res??,
    }

    Ok(())
}

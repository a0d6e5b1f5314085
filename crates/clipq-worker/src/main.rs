//! Clip job worker binary.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use clipq_media::ProcessPipeline;
use clipq_storage::StorageConfig;
use clipq_store::RestJobStore;
use clipq_worker::{init_tracing, metrics, EnvCheck, JobRunner, StaleJobSweeper, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting clipq-worker");

    let env = EnvCheck::from_env();
    info!(
        supabase_url = env.store_url_status(),
        service_key = %env.service_key,
        bucket = %env.bucket,
        "Environment check"
    );

    let default_delay = WorkerConfig::default().fatal_exit_delay;
    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => fatal(default_delay, format!("Invalid worker configuration: {}", e)),
    };
    info!("Worker config: {:?}", config);
    let delay = config.fatal_exit_delay;

    if let Some(addr) = config.metrics_addr {
        match metrics::init_metrics(addr) {
            Ok(()) => info!("Metrics listening on {}", addr),
            Err(e) => fatal(delay, e.to_string()),
        }
    }

    let store = match RestJobStore::from_env() {
        Ok(store) => Arc::new(store),
        Err(e) => fatal(delay, format!("Failed to create job store client: {}", e)),
    };

    let storage_config = match StorageConfig::from_env() {
        Ok(config) => config,
        Err(e) => fatal(delay, format!("Failed to configure storage: {}", e)),
    };
    let backend = storage_config.backend_name();
    let publisher = match storage_config.build() {
        Ok(publisher) => publisher,
        Err(e) => fatal(delay, format!("Failed to create storage client: {}", e)),
    };
    if let Err(e) = publisher.check_bucket().await {
        fatal(delay, format!("Storage bucket check failed: {}", e));
    }
    info!(backend, bucket = %publisher.bucket(), "Storage bucket reachable");

    let pipeline = Arc::new(ProcessPipeline::new().with_stage_timeout(config.stage_timeout));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal, finishing current job");
        let _ = shutdown_tx.send(true);
    });

    let sweeper_handle = config.stale_job_timeout.map(|timeout| {
        let sweeper = StaleJobSweeper::new(store.clone(), timeout, config.stale_sweep_interval);
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { sweeper.run(rx).await })
    });
    if sweeper_handle.is_none() {
        info!("Stale job sweep disabled (STALE_JOB_TIMEOUT_SECS unset)");
    }

    let runner = JobRunner::new(config, store, pipeline, publisher);
    runner.run(shutdown_rx).await;

    if let Some(handle) = sweeper_handle {
        if let Err(e) = handle.await {
            warn!("Stale job sweeper task ended abnormally: {}", e);
        }
    }

    info!("Worker shutdown complete");
}

/// Log a fatal setup error, wait out the grace delay, and exit non-zero.
fn fatal(delay: Duration, message: String) -> ! {
    error!("{}", message);
    error!("Exiting in {} seconds", delay.as_secs());
    std::thread::sleep(delay);
    std::process::exit(1)
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}

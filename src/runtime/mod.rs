//! # Runtime
//!
//! Process wiring for the controller binary.
//!
//! - `initialization`: logging, metrics, probes, Kubernetes client
//! - `watch_loop`: `ImmutableImages`, `Pod` and `Secret` watchers feeding the queue
//! - `workers`: worker pool draining the queue
//! - `error_policy`: retry and backoff on failures

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
pub mod workers;

use crate::controller::backoff::{BackoffTracker, ExponentialBackoff};
use crate::controller::queue::WorkQueue;
use crate::crd::ImmutableImages;
use crate::observability;
use crate::webhook::start_webhook_server;
use anyhow::Result;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::Api;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

/// Run controller and webhook until SIGINT/SIGTERM
///
/// # Errors
///
/// Returns an error if initialization fails.
pub async fn run() -> Result<()> {
    let init = initialization::initialize().await?;
    let config = &init.controller_config;

    let queue = Arc::new(WorkQueue::new());
    let tracker = BackoffTracker::new(
        ExponentialBackoff::new(config.backoff_start_duration(), config.backoff_max_duration()),
        config.retry_budget(),
    );
    let pool = workers::WorkerPool::new(init.ctx.clone(), Arc::clone(&queue), tracker);
    let worker_handles = pool.spawn(config.worker_count);
    info!("Started {} reconcile workers", config.worker_count);

    let webhook_config = init.webhook_config.clone();
    let gate = Arc::clone(&init.gate);
    tokio::spawn(async move {
        if let Err(e) = start_webhook_server(&webhook_config, gate).await {
            error!("Admission webhook server error: {:#}", e);
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let restart_delay = config.watch_restart_delay_after_end_duration();
    let record_watch = tokio::spawn(watch_loop::run_record_watch(
        Api::<ImmutableImages>::all(init.client.clone()),
        Arc::clone(&queue),
        restart_delay,
        shutdown_rx.clone(),
    ));
    let workload_watch = tokio::spawn(watch_loop::run_workload_watch(
        Api::<Pod>::all(init.client.clone()),
        init.ctx.clone(),
        Arc::clone(&queue),
        restart_delay,
        shutdown_rx.clone(),
    ));
    let secret_watch = tokio::spawn(watch_loop::run_secret_watch(
        Api::<Secret>::all(init.client.clone()),
        init.ctx.clone(),
        Arc::clone(&queue),
        restart_delay,
        shutdown_rx,
    ));

    wait_for_shutdown_signal().await;
    info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
    init.server_state.is_ready.store(false, Ordering::Relaxed);

    // In-flight reconciliations stop after their current step
    init.ctx.request_shutdown();
    let _ = shutdown_tx.send(true);
    queue.shutdown();

    let _ = record_watch.await;
    let _ = workload_watch.await;
    let _ = secret_watch.await;
    for handle in worker_handles {
        let _ = handle.await;
    }

    info!("Controller stopped gracefully");
    observability::otel::shutdown_otel(init.otel_tracer_provider);
    Ok(())
}

/// Resolve on SIGTERM (pod termination) or SIGINT
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM, waiting for SIGINT only: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

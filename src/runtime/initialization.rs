//! # Initialization
//!
//! Controller initialization logic including rustls setup, OpenTelemetry,
//! tracing, metrics, server startup, and Kubernetes client setup.

use crate::config::{load_config, ControllerConfig, ServerConfig, WebhookConfig};
use crate::constants::DEFAULT_LOG_FILTER;
use crate::controller::scope::ScopeFilter;
use crate::controller::server::{start_server, ServerState};
use crate::controller::reconciler::ReconcileContext;
use crate::observability;
use crate::store::{ClusterStore, KubeStore};
use crate::webhook::AdmissionGate;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Reconciler context shared by workers and the pod watcher
    pub ctx: ReconcileContext,
    /// Admission gate served by the webhook
    pub gate: Arc<AdmissionGate>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// OpenTelemetry tracer provider (if initialized)
    pub otel_tracer_provider: Option<observability::otel::TracerProviderHandle>,
    pub controller_config: ControllerConfig,
    pub webhook_config: WebhookConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready.load(Ordering::Relaxed))
            .field("controller_config", &self.controller_config)
            .field("webhook_config", &self.webhook_config)
            .finish_non_exhaustive()
    }
}

/// Set up the `tracing` subscriber honoring `RUST_LOG` and `LOG_FORMAT`
fn init_tracing(log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let result = if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    if let Err(e) = result {
        // datadog-opentelemetry may already have installed a subscriber
        warn!("Tracing subscriber init returned error (may already be initialized by Datadog): {}", e);
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - OpenTelemetry initialization
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler context and admission gate setup
///
/// # Errors
///
/// Returns an error if any of the steps above fails.
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before anything opens a TLS connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    let (controller_config, server_config, webhook_config) = load_config();

    let otel_tracer_provider =
        observability::otel::init_otel().context("Failed to initialize OpenTelemetry")?;
    init_tracing(&controller_config.log_format);

    info!("Starting Secret Immutability Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        "Configuration: workers={}, excluded_namespaces={:?}, admission_scope={:?}, enforce_on_delete={}",
        controller_config.worker_count,
        controller_config.excluded_namespaces,
        webhook_config.admission_scope,
        webhook_config.enforce_on_delete
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let server_state_clone = Arc::clone(&server_state);
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let store: Arc<dyn ClusterStore> = Arc::new(KubeStore::new(client.clone()));

    let ctx = ReconcileContext::new(
        Arc::clone(&store),
        ScopeFilter::new(controller_config.excluded_namespaces.iter().cloned()),
    );
    let gate = Arc::new(AdmissionGate::new(
        store,
        webhook_config.admission_scope,
        webhook_config.enforce_on_delete,
    ));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        ctx,
        gate,
        server_state,
        otel_tracer_provider,
        controller_config,
        webhook_config,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = std::time::Duration::from_secs(server_config.startup_timeout_secs);
    let poll_interval = std::time::Duration::from_millis(server_config.poll_interval_ms);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

//! # OpenTelemetry Support
//!
//! Optional trace export to Datadog via `datadog-opentelemetry`.
//!
//! Export is enabled only when `DD_API_KEY` is present in the environment.
//! The remaining `DD_*` variables are read by `datadog-opentelemetry` itself;
//! this module fills in defaults for the ones that are unset:
//!
//! - `DD_SERVICE` - `secret-immutability-controller`
//! - `DD_VERSION` - crate version plus `BUILD_GIT_HASH`
//! - `DD_SITE` - `datadoghq.com`
//! - `DD_TRACE_AGENT_URL` - `http://localhost:8126`

use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

/// Tracer provider handle for graceful shutdown
#[derive(Debug)]
pub enum TracerProviderHandle {
    /// Datadog tracer provider
    Datadog(opentelemetry_sdk::trace::SdkTracerProvider),
}

/// Initialize trace export from environment variables
///
/// Returns `Ok(None)` when `DD_API_KEY` is not set.
///
/// # Errors
///
/// Returns an error if initialization fails.
pub fn init_otel() -> Result<Option<TracerProviderHandle>> {
    if std::env::var("DD_API_KEY").is_err() {
        info!("No OpenTelemetry configuration provided, skipping Otel initialization");
        return Ok(None);
    }
    info!("DD_API_KEY found in environment, initializing Datadog tracing...");
    init_datadog()
}

fn set_default_env(key: &str, value: &str) {
    if std::env::var(key).is_err() {
        std::env::set_var(key, value);
    }
}

fn init_datadog() -> Result<Option<TracerProviderHandle>> {
    set_default_env("DD_SERVICE", "secret-immutability-controller");
    set_default_env(
        "DD_VERSION",
        &format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("BUILD_GIT_HASH")),
    );
    set_default_env("DD_SITE", "datadoghq.com");
    set_default_env("DD_TRACE_AGENT_URL", "http://localhost:8126");

    info!(
        "Initializing Datadog OpenTelemetry tracing: service={}, version={}, env={:?}, site={}",
        std::env::var("DD_SERVICE").unwrap_or_default(),
        std::env::var("DD_VERSION").unwrap_or_default(),
        std::env::var("DD_ENV").ok(),
        std::env::var("DD_SITE").unwrap_or_default()
    );

    let tracer_provider = datadog_opentelemetry::tracing().init();

    info!("✅ Datadog OpenTelemetry tracing initialized successfully");
    info!(
        "   Traces will be sent to: {}",
        std::env::var("DD_TRACE_AGENT_URL").unwrap_or_default()
    );

    Ok(Some(TracerProviderHandle::Datadog(tracer_provider)))
}

/// Flush pending spans and shut the tracer provider down
pub fn shutdown_otel(tracer_provider: Option<TracerProviderHandle>) {
    if let Some(TracerProviderHandle::Datadog(provider)) = tracer_provider {
        info!("Shutting down Datadog tracer provider...");
        if let Err(e) = provider.shutdown_with_timeout(Duration::from_secs(5)) {
            warn!("Error shutting down Datadog tracer provider: {}", e);
        } else {
            info!("✅ Datadog tracer provider shut down successfully");
        }
    }
}

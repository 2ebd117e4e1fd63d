//! # Webhook Server
//!
//! HTTPS listener the API server calls for Secret validation.
//!
//! TLS is served with `axum-server` + `rustls` when both
//! `WEBHOOK_TLS_CERT_PATH` and `WEBHOOK_TLS_KEY_PATH` are set. Without them
//! the webhook falls back to plain HTTP, which is only useful locally since
//! the API server refuses to call webhooks over HTTP.

use super::gate::AdmissionGate;
use super::handler::validate_secret;
use crate::config::WebhookConfig;
use crate::constants::WEBHOOK_VALIDATE_SECRET_PATH;
use anyhow::Context;
use axum::{http::StatusCode, routing::get, routing::post, Router};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub fn router(gate: Arc<AdmissionGate>) -> Router {
    Router::new()
        .route(WEBHOOK_VALIDATE_SECRET_PATH, post(validate_secret))
        .route("/healthz", get(|| async { StatusCode::OK }))
        .layer(TraceLayer::new_for_http())
        .with_state(gate)
}

/// Serve the admission webhook until the process exits
///
/// # Errors
///
/// Returns an error if the certificate cannot be loaded, the port cannot be
/// bound, or the server fails.
pub async fn start_webhook_server(
    config: &WebhookConfig,
    gate: Arc<AdmissionGate>,
) -> Result<(), anyhow::Error> {
    let app = router(gate);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    if let Some((cert, key)) = config.tls_paths() {
        let tls = RustlsConfig::from_pem_file(cert, key)
            .await
            .with_context(|| format!("Failed to load webhook TLS certificate {cert} / key {key}"))?;
        info!("Admission webhook listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls)
            .serve(app.into_make_service())
            .await?;
    } else {
        warn!("WEBHOOK_TLS_CERT_PATH/WEBHOOK_TLS_KEY_PATH not set, serving admission webhook over plain HTTP");
        let listener = TcpListener::bind(addr).await?;
        info!("Admission webhook listening on http://{}", addr);
        axum::serve(listener, app).await?;
    }

    Ok(())
}

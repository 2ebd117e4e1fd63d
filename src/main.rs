//! # Secret Immutability Controller
//!
//! A Kubernetes controller that makes the secrets consumed by protected
//! container images immutable, and keeps them that way.
//!
//! ## Overview
//!
//! 1. **Watching `ImmutableImages`** - each record names the protected images
//! 2. **Watching pods** - any pod change re-triggers the records of its namespace
//! 3. **Discovering secrets** - volumes, `env`, `envFrom` and optionally `imagePullSecrets`
//! 4. **Tagging** - protected secrets get `immutable: true`
//! 5. **Admission** - `/validate-v1-secret` rejects updates to protected secrets
//!
//! Metrics and probes are served on the metrics port, the webhook on its own
//! (TLS) port.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    secret_immutability_controller::runtime::run().await
}

//! # IICTL CLI
//!
//! Command-line interface for the Secret Immutability Controller.
//!
//! ## Usage
//!
//! ```bash
//! # List ImmutableImages resources and the secrets they protect
//! iictl list
//! iictl list -n payments
//!
//! # Ask the admission gate whether a secret may still be changed
//! iictl check cred-a -n payments
//! iictl check cred-a -n payments --operation delete --scope namespace
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ListParams, ObjectMeta};
use kube::Client;
use secret_immutability_controller::config::AdmissionScope;
use secret_immutability_controller::crd::ImmutableImages;
use secret_immutability_controller::store::KubeStore;
use secret_immutability_controller::webhook::{AdmissionDecision, AdmissionGate};
use std::sync::Arc;

/// Secret Immutability Controller CLI
#[derive(Parser)]
#[command(name = "iictl")]
#[command(about = "Inspect ImmutableImages resources and protected secrets", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (defaults to all namespaces for `list`, `default` for `check`)
    #[arg(short, long, global = true)]
    namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List ImmutableImages resources
    List,
    /// Evaluate the admission gate for a secret against the live cluster
    Check {
        /// Secret name
        #[arg(value_name = "SECRET")]
        secret: String,

        /// Operation to evaluate
        #[arg(long, value_enum, default_value = "update")]
        operation: CheckOperation,

        /// Which records are consulted: cluster or namespace
        #[arg(long, default_value = "cluster")]
        scope: AdmissionScope,

        /// Evaluate deletes the way the webhook does with ENFORCE_ON_DELETE=true
        #[arg(long)]
        enforce_on_delete: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CheckOperation {
    Create,
    Update,
    Delete,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Required for rustls 0.23+ when no default provider is set via features
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| panic!("Failed to install rustls crypto provider"));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iictl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

    match cli.command {
        Commands::List => list_command(client, cli.namespace).await,
        Commands::Check {
            secret,
            operation,
            scope,
            enforce_on_delete,
        } => {
            let namespace = cli.namespace.unwrap_or_else(|| "default".to_string());
            check_command(client, &namespace, &secret, operation, scope, enforce_on_delete).await
        }
    }
}

/// List all ImmutableImages resources
async fn list_command(client: Client, namespace: Option<String>) -> Result<()> {
    let api: Api<ImmutableImages> = if let Some(ns) = &namespace {
        println!("Listing ImmutableImages resources in namespace '{ns}'...");
        Api::namespaced(client, ns)
    } else {
        println!("Listing ImmutableImages resources in all namespaces...");
        Api::all(client)
    };

    let records = api
        .list(&ListParams::default())
        .await
        .context("Failed to list ImmutableImages resources")?;

    if records.items.is_empty() {
        println!("No ImmutableImages resources found.");
        return Ok(());
    }

    println!(
        "\n{:<30} {:<20} {:<10} {:<8} {}",
        "NAME", "NAMESPACE", "PHASE", "IMAGES", "PROTECTED SECRETS"
    );
    println!("{}", "-".repeat(100));

    for record in records.items {
        let name = record.metadata.name.as_deref().unwrap_or("<unknown>");
        let ns = record.metadata.namespace.as_deref().unwrap_or("<unknown>");
        let phase = record
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("Unknown");
        let images = record.spec.protected_images.len();
        let secrets = if record.spec.all_protected_secrets.is_empty() {
            "-".to_string()
        } else {
            record.spec.all_protected_secrets.join(",")
        };

        println!("{name:<30} {ns:<20} {phase:<10} {images:<8} {secrets}");
    }

    Ok(())
}

/// Run the admission gate for one secret and print the decision
async fn check_command(
    client: Client,
    namespace: &str,
    secret: &str,
    operation: CheckOperation,
    scope: AdmissionScope,
    enforce_on_delete: bool,
) -> Result<()> {
    let gate = AdmissionGate::new(Arc::new(KubeStore::new(client)), scope, enforce_on_delete);
    let target = Secret {
        metadata: ObjectMeta {
            name: Some(secret.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        ..Secret::default()
    };

    let decision = match operation {
        CheckOperation::Create => gate.validate_create(&target).await,
        CheckOperation::Update => gate.validate_update(None, &target).await,
        CheckOperation::Delete => gate.validate_delete(&target).await,
    };

    match decision {
        AdmissionDecision::Accept => {
            println!("✅ {namespace}/{secret}: allowed");
            Ok(())
        }
        AdmissionDecision::Reject(reason) => {
            println!("⛔ {namespace}/{secret}: denied");
            println!("   {reason}");
            std::process::exit(1);
        }
    }
}

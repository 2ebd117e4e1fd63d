//! # ImmutableImages Spec
//!
//! The association record: which container images are protected, which secrets
//! each of them has been seen consuming, and the flattened list of secrets the
//! admission webhook refuses to modify.

use super::status::ImmutableImagesStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ImmutableImages Custom Resource Definition
///
/// One record per namespace is the common layout, but any number is allowed.
///
/// # Example
///
/// ```yaml
/// apiVersion: secret-immutability.microscaler.io/v1
/// kind: ImmutableImages
/// metadata:
///   name: payment-images
///   namespace: payments
/// spec:
///   protectedImages:
///     - registry.example.com/payments/api:1.4.2
///     - alpine:latest
/// ```
///
/// After reconciliation the controller fills in `imageToSecrets` and
/// `allProtectedSecrets`. Both only ever grow.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "ImmutableImages",
    group = "secret-immutability.microscaler.io",
    version = "v1",
    namespaced,
    status = "ImmutableImagesStatus",
    shortname = "iimg",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Protected", "type":"integer", "jsonPath":".status.protectedSecretCount"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ImmutableImagesSpec {
    /// Container images whose consumed secrets must become immutable
    /// Matched verbatim against `containers[].image`, so tags and digests must agree
    #[serde(default)]
    pub protected_images: Vec<String>,
    /// Protected image -> secrets observed being consumed by containers running it
    /// Keys may also be seeded by hand; a seeded key counts as a protected image
    #[serde(default)]
    pub image_to_secrets: BTreeMap<String, Vec<String>>,
    /// Every protected secret, in discovery order
    /// Maintained by the controller and read by the admission webhook
    #[serde(default)]
    pub all_protected_secrets: Vec<String>,
    /// Treat `imagePullSecrets` of a pod as consumed by its protected containers
    /// Default: false
    #[serde(default)]
    pub include_image_pull_secrets: bool,
}

impl ImmutableImages {
    /// `namespace/name` key used for logging and backoff tracking
    pub fn key(&self) -> String {
        format!(
            "{}/{}",
            self.metadata.namespace.as_deref().unwrap_or("default"),
            self.metadata.name.as_deref().unwrap_or("unknown")
        )
    }

    /// Whether `secret` is listed as protected by this record
    pub fn protects_secret(&self, secret: &str) -> bool {
        self.spec.all_protected_secrets.iter().any(|s| s == secret)
    }
}

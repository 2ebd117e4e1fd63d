//! # Admission Handler
//!
//! Translates `admission.k8s.io/v1` reviews for Secrets into gate calls.

use super::gate::{AdmissionDecision, AdmissionGate};
use crate::observability;
use axum::{extract::State, Json};
use k8s_openapi::api::core::v1::Secret;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use std::sync::Arc;
use tracing::{info, warn};

fn operation_label(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    }
}

/// Fill in name/namespace from the request when the object omits them
fn with_request_identity(secret: &Secret, request: &AdmissionRequest<Secret>) -> Secret {
    let mut secret = secret.clone();
    if secret.metadata.name.is_none() && !request.name.is_empty() {
        secret.metadata.name = Some(request.name.clone());
    }
    if secret.metadata.namespace.is_none() {
        secret.metadata.namespace.clone_from(&request.namespace);
    }
    secret
}

/// Decide one admission request
pub async fn admit(gate: &AdmissionGate, request: &AdmissionRequest<Secret>) -> AdmissionResponse {
    let operation = operation_label(&request.operation);
    let decision = match request.operation {
        Operation::Update => {
            let Some(new) = request.object.as_ref() else {
                return AdmissionResponse::invalid("UPDATE review carries no object");
            };
            let new = with_request_identity(new, request);
            gate.validate_update(request.old_object.as_ref(), &new).await
        }
        Operation::Create => {
            let Some(new) = request.object.as_ref() else {
                return AdmissionResponse::invalid("CREATE review carries no object");
            };
            gate.validate_create(&with_request_identity(new, request)).await
        }
        Operation::Delete => {
            let old = request
                .old_object
                .as_ref()
                .map_or_else(Secret::default, Clone::clone);
            gate.validate_delete(&with_request_identity(&old, request)).await
        }
        Operation::Connect => AdmissionDecision::Accept,
    };

    observability::metrics::record_admission_decision(operation, decision.is_accepted());
    let response = AdmissionResponse::from(request);
    match decision {
        AdmissionDecision::Accept => response,
        AdmissionDecision::Reject(reason) => {
            info!(
                operation = operation,
                secret.namespace = request.namespace.as_deref().unwrap_or_default(),
                secret.name = request.name.as_str(),
                dry_run = request.dry_run,
                "⛔ Denied: {reason}"
            );
            response.deny(reason)
        }
    }
}

/// `POST /validate-v1-secret`
pub async fn validate_secret(
    State(gate): State<Arc<AdmissionGate>>,
    Json(review): Json<AdmissionReview<Secret>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<Secret> = match review.try_into() {
        Ok(request) => request,
        Err(e) => {
            warn!("Malformed AdmissionReview: {e}");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };
    Json(admit(&gate, &request).await.into_review())
}

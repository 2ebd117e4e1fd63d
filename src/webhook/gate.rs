//! # Admission Gate
//!
//! Synchronous check run by the API server before a Secret change commits.
//!
//! The gate reads committed `ImmutableImages` records only and keeps no
//! state of its own. A protected secret is one listed in any visible
//! record's `allProtectedSecrets`:
//!
//! - UPDATE of a protected secret is rejected, except the tagging write that
//!   only turns `immutable` on and leaves the contents untouched
//! - CREATE is accepted
//! - DELETE is accepted unless delete enforcement is enabled
//!
//! When the records cannot be read the request is rejected
//! ("validation unavailable").

use crate::config::AdmissionScope;
use crate::constants::VALIDATION_UNAVAILABLE_REASON;
use crate::store::ClusterStore;
use k8s_openapi::api::core::v1::Secret;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Accept,
    Reject(String),
}

impl AdmissionDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AdmissionDecision::Accept)
    }
}

/// Admission gate over the association records in the store
#[derive(Clone)]
pub struct AdmissionGate {
    store: Arc<dyn ClusterStore>,
    scope: AdmissionScope,
    enforce_on_delete: bool,
}

impl fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("scope", &self.scope)
            .field("enforce_on_delete", &self.enforce_on_delete)
            .finish_non_exhaustive()
    }
}

impl AdmissionGate {
    pub fn new(store: Arc<dyn ClusterStore>, scope: AdmissionScope, enforce_on_delete: bool) -> Self {
        Self {
            store,
            scope,
            enforce_on_delete,
        }
    }

    /// Reject updates to protected secrets
    pub async fn validate_update(&self, old: Option<&Secret>, new: &Secret) -> AdmissionDecision {
        if old.is_some_and(|old| is_tagging_transition(old, new)) {
            debug!(
                secret.namespace = new.metadata.namespace.as_deref().unwrap_or("default"),
                secret.name = new.metadata.name.as_deref().unwrap_or("unknown"),
                "Accepting transition to immutable"
            );
            return AdmissionDecision::Accept;
        }
        self.check(new, "update").await
    }

    /// Creates are always accepted
    pub async fn validate_create(&self, _new: &Secret) -> AdmissionDecision {
        AdmissionDecision::Accept
    }

    /// Accepted unless delete enforcement is enabled
    pub async fn validate_delete(&self, old: &Secret) -> AdmissionDecision {
        if !self.enforce_on_delete {
            return AdmissionDecision::Accept;
        }
        self.check(old, "delete").await
    }

    async fn check(&self, secret: &Secret, action: &str) -> AdmissionDecision {
        let Some(name) = secret.metadata.name.as_deref() else {
            return AdmissionDecision::Accept;
        };
        let namespace = secret.metadata.namespace.as_deref().unwrap_or("default");

        let visible = match self.scope {
            AdmissionScope::Cluster => None,
            AdmissionScope::Namespace => Some(namespace),
        };
        let records = match self.store.list_records(visible).await {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    secret.namespace = namespace,
                    secret.name = name,
                    "Cannot read ImmutableImages, rejecting {action}: {e}"
                );
                return AdmissionDecision::Reject(VALIDATION_UNAVAILABLE_REASON.to_string());
            }
        };

        match records.iter().find(|record| record.protects_secret(name)) {
            Some(record) => {
                debug!(
                    secret.namespace = namespace,
                    secret.name = name,
                    record = %record.key(),
                    "Secret is protected, rejecting {action}"
                );
                AdmissionDecision::Reject(format!(
                    "attempting to {action} immutable secret {name}: target is immutable (protected by ImmutableImages {})",
                    record.key()
                ))
            }
            None => AdmissionDecision::Accept,
        }
    }
}

/// `new` turns `immutable` on and changes no data, stringData or type
fn is_tagging_transition(old: &Secret, new: &Secret) -> bool {
    old.immutable != Some(true)
        && new.immutable == Some(true)
        && old.data == new.data
        && old.string_data == new.string_data
        && old.type_ == new.type_
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ImmutableImages, ImmutableImagesSpec};
    use crate::store::InMemoryStore;
    use k8s_openapi::ByteString;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn secret(namespace: &str, name: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        }
    }

    fn store_with_protected(namespace: &str, secrets: &[&str]) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        let mut record = ImmutableImages::new("images", ImmutableImagesSpec::default());
        record.metadata.namespace = Some(namespace.to_string());
        record.spec.all_protected_secrets = secrets.iter().map(|s| (*s).to_string()).collect();
        store.insert_record(record);
        store
    }

    #[tokio::test]
    async fn test_update_of_protected_secret_is_rejected() {
        let gate = AdmissionGate::new(
            store_with_protected("payments", &["cred-a"]),
            AdmissionScope::Cluster,
            false,
        );
        let decision = gate.validate_update(None, &secret("payments", "cred-a")).await;

        match decision {
            AdmissionDecision::Reject(reason) => {
                assert!(reason.contains("cred-a"));
                assert!(reason.contains("immutable"));
            }
            AdmissionDecision::Accept => panic!("protected secret update was accepted"),
        }
    }

    #[tokio::test]
    async fn test_update_of_other_secret_is_accepted() {
        let gate = AdmissionGate::new(
            store_with_protected("payments", &["cred-a"]),
            AdmissionScope::Cluster,
            false,
        );
        let decision = gate.validate_update(None, &secret("payments", "cred-b")).await;
        assert_eq!(decision, AdmissionDecision::Accept);
    }

    #[tokio::test]
    async fn test_namespace_scope_only_sees_own_namespace() {
        let store = store_with_protected("payments", &["cred-a"]);
        let cluster = AdmissionGate::new(Arc::clone(&store) as _, AdmissionScope::Cluster, false);
        let namespaced = AdmissionGate::new(store, AdmissionScope::Namespace, false);
        let elsewhere = secret("billing", "cred-a");

        assert!(!cluster.validate_update(None, &elsewhere).await.is_accepted());
        assert!(namespaced.validate_update(None, &elsewhere).await.is_accepted());
    }

    #[tokio::test]
    async fn test_create_and_delete_pass_through_by_default() {
        let gate = AdmissionGate::new(
            store_with_protected("payments", &["cred-a"]),
            AdmissionScope::Cluster,
            false,
        );
        let protected = secret("payments", "cred-a");
        assert!(gate.validate_create(&protected).await.is_accepted());
        assert!(gate.validate_delete(&protected).await.is_accepted());
    }

    #[tokio::test]
    async fn test_delete_enforcement() {
        let gate = AdmissionGate::new(
            store_with_protected("payments", &["cred-a"]),
            AdmissionScope::Cluster,
            true,
        );
        assert!(!gate.validate_delete(&secret("payments", "cred-a")).await.is_accepted());
        assert!(gate.validate_delete(&secret("payments", "cred-b")).await.is_accepted());
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let store = store_with_protected("payments", &[]);
        store.set_unavailable(true);
        let gate = AdmissionGate::new(store, AdmissionScope::Cluster, false);

        let decision = gate.validate_update(None, &secret("payments", "anything")).await;
        assert_eq!(
            decision,
            AdmissionDecision::Reject(VALIDATION_UNAVAILABLE_REASON.to_string())
        );
    }

    fn with_password(namespace: &str, name: &str, password: &[u8]) -> Secret {
        let mut secret = secret(namespace, name);
        secret.data = Some(BTreeMap::from([(
            "password".to_string(),
            ByteString(password.to_vec()),
        )]));
        secret
    }

    #[tokio::test]
    async fn test_tagging_write_of_protected_secret_is_accepted() {
        let gate = AdmissionGate::new(
            store_with_protected("payments", &["cred-a"]),
            AdmissionScope::Cluster,
            false,
        );
        let old = with_password("payments", "cred-a", b"hunter2");
        let mut tagged = old.clone();
        tagged.immutable = Some(true);
        assert_eq!(gate.validate_update(Some(&old), &tagged).await, AdmissionDecision::Accept);

        let mut explicitly_mutable = old.clone();
        explicitly_mutable.immutable = Some(false);
        assert!(gate
            .validate_update(Some(&explicitly_mutable), &tagged)
            .await
            .is_accepted());
    }

    #[tokio::test]
    async fn test_tagging_combined_with_other_changes_is_rejected() {
        let gate = AdmissionGate::new(
            store_with_protected("payments", &["cred-a"]),
            AdmissionScope::Cluster,
            false,
        );
        let old = with_password("payments", "cred-a", b"hunter2");

        let mut new_data = with_password("payments", "cred-a", b"changed");
        new_data.immutable = Some(true);
        assert!(!gate.validate_update(Some(&old), &new_data).await.is_accepted());

        let mut new_type = old.clone();
        new_type.immutable = Some(true);
        new_type.type_ = Some("kubernetes.io/basic-auth".to_string());
        assert!(!gate.validate_update(Some(&old), &new_type).await.is_accepted());

        let mut string_data = old.clone();
        string_data.immutable = Some(true);
        string_data.string_data = Some(BTreeMap::from([("password".to_string(), "x".to_string())]));
        assert!(!gate.validate_update(Some(&old), &string_data).await.is_accepted());

        // Already immutable: nothing left to transition
        let mut locked = old.clone();
        locked.immutable = Some(true);
        assert!(!gate.validate_update(Some(&locked), &locked).await.is_accepted());
    }
}

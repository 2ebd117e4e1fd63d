//! # Fan-out Mapper
//!
//! Turns a workload event into reconcile requests for every association
//! record in the workload's namespace. Deletes map to nothing: a pod going
//! away cannot add associations, and tags are never reverted.
//!
//! A secret that appears after its record was reconciled maps to the
//! records already protecting it, so the pending tag is applied.

use super::reconciler::ReconcileRequest;
use super::scope::ScopeFilter;
use crate::store::ClusterStore;
use k8s_openapi::api::core::v1::{Pod, Secret};
use tracing::warn;

/// Workload change delivered by the pod watcher
#[derive(Debug, Clone, Copy)]
pub enum WorkloadEvent<'a> {
    Applied(&'a Pod),
    Deleted(&'a Pod),
}

/// Reconcile requests for `event`
///
/// Never fails: a store error is logged and yields no requests, the record
/// watcher and later pod events re-trigger the affected records.
pub async fn requests_for_workload(
    store: &dyn ClusterStore,
    scopes: &ScopeFilter,
    event: WorkloadEvent<'_>,
) -> Vec<ReconcileRequest> {
    let pod = match event {
        WorkloadEvent::Applied(pod) => pod,
        WorkloadEvent::Deleted(_) => return Vec::new(),
    };
    let Some(namespace) = pod.metadata.namespace.as_deref() else {
        return Vec::new();
    };
    if scopes.is_excluded_scope(namespace) {
        return Vec::new();
    }

    match store.list_records(Some(namespace)).await {
        Ok(records) => records
            .iter()
            .filter_map(ReconcileRequest::from_record)
            .collect(),
        Err(e) => {
            warn!(
                namespace = namespace,
                pod = pod.metadata.name.as_deref().unwrap_or("unknown"),
                "Failed to list ImmutableImages for workload event: {e}"
            );
            Vec::new()
        }
    }
}

/// Reconcile requests for the records protecting a created or updated secret
///
/// Immutable secrets need no tagging and map to nothing.
pub async fn requests_for_secret(
    store: &dyn ClusterStore,
    scopes: &ScopeFilter,
    secret: &Secret,
) -> Vec<ReconcileRequest> {
    if secret.immutable == Some(true) {
        return Vec::new();
    }
    let (Some(namespace), Some(name)) = (
        secret.metadata.namespace.as_deref(),
        secret.metadata.name.as_deref(),
    ) else {
        return Vec::new();
    };
    if scopes.is_excluded_scope(namespace) {
        return Vec::new();
    }

    match store.list_records(Some(namespace)).await {
        Ok(records) => records
            .iter()
            .filter(|record| record.protects_secret(name))
            .filter_map(ReconcileRequest::from_record)
            .collect(),
        Err(e) => {
            warn!(
                namespace = namespace,
                secret = name,
                "Failed to list ImmutableImages for secret event: {e}"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ImmutableImages, ImmutableImagesSpec};
    use crate::store::InMemoryStore;
    use kube::api::ObjectMeta;

    fn record(namespace: &str, name: &str) -> ImmutableImages {
        let mut record = ImmutableImages::new(name, ImmutableImagesSpec::default());
        record.metadata.namespace = Some(namespace.to_string());
        record
    }

    fn pod(namespace: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        }
    }

    #[tokio::test]
    async fn test_one_request_per_record_in_namespace() {
        let store = InMemoryStore::new();
        store.insert_record(record("payments", "a"));
        store.insert_record(record("payments", "b"));
        store.insert_record(record("billing", "c"));

        let pod = pod("payments");
        let mut requests =
            requests_for_workload(&store, &ScopeFilter::allow_all(), WorkloadEvent::Applied(&pod))
                .await;
        requests.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(
            requests,
            vec![
                ReconcileRequest::new("payments", "a"),
                ReconcileRequest::new("payments", "b"),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_yields_nothing() {
        let store = InMemoryStore::new();
        store.insert_record(record("payments", "a"));

        let pod = pod("payments");
        let requests =
            requests_for_workload(&store, &ScopeFilter::allow_all(), WorkloadEvent::Deleted(&pod))
                .await;
        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn test_excluded_namespace_yields_nothing() {
        let store = InMemoryStore::new();
        store.insert_record(record("kube-system", "a"));

        let pod = pod("kube-system");
        let requests = requests_for_workload(
            &store,
            &ScopeFilter::new(["kube-system"]),
            WorkloadEvent::Applied(&pod),
        )
        .await;
        assert!(requests.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_yields_nothing() {
        let store = InMemoryStore::new();
        store.insert_record(record("payments", "a"));
        store.set_unavailable(true);

        let pod = pod("payments");
        let requests =
            requests_for_workload(&store, &ScopeFilter::allow_all(), WorkloadEvent::Applied(&pod))
                .await;
        assert!(requests.is_empty());
    }

    fn protecting(namespace: &str, name: &str, secret: &str) -> ImmutableImages {
        let mut record = record(namespace, name);
        record.spec.all_protected_secrets = vec![secret.to_string()];
        record
    }

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

    #[tokio::test]
    async fn test_secret_maps_to_records_protecting_it() {
        let store = InMemoryStore::new();
        store.insert_record(protecting("payments", "a", "cred-a"));
        store.insert_record(protecting("payments", "b", "cred-b"));
        store.insert_record(protecting("billing", "c", "cred-a"));

        let requests =
            requests_for_secret(&store, &ScopeFilter::allow_all(), &secret("payments", "cred-a"))
                .await;
        assert_eq!(requests, vec![ReconcileRequest::new("payments", "a")]);

        let unprotected =
            requests_for_secret(&store, &ScopeFilter::allow_all(), &secret("payments", "other"))
                .await;
        assert!(unprotected.is_empty());
    }

    #[tokio::test]
    async fn test_immutable_secret_maps_to_nothing() {
        let store = InMemoryStore::new();
        store.insert_record(protecting("payments", "a", "cred-a"));
        let mut tagged = secret("payments", "cred-a");
        tagged.immutable = Some(true);

        let requests = requests_for_secret(&store, &ScopeFilter::allow_all(), &tagged).await;
        assert!(requests.is_empty());
    }
}

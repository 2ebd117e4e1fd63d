//! # Status
//!
//! Status reporting for `ImmutableImages` records.
//!
//! Status lives in the status subresource, so patching it never bumps
//! `metadata.generation` and never re-triggers the record watcher.

use super::types::{ReconcileRequest, ReconcilerError};
use crate::crd::{Condition, ImmutableImages, ImmutableImagesStatus, Phase};
use crate::store::{ClusterStore, StoreError};
use tracing::debug;

const READY_CONDITION: &str = "Ready";

fn ready_condition(
    previous: Option<&ImmutableImagesStatus>,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    // Transition time only moves when the condition status flips
    let last_transition_time = previous
        .and_then(|s| s.conditions.iter().find(|c| c.r#type == READY_CONDITION))
        .filter(|c| c.status == status)
        .and_then(|c| c.last_transition_time.clone())
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

    Condition {
        r#type: READY_CONDITION.to_string(),
        status: status.to_string(),
        last_transition_time: Some(last_transition_time),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
    }
}

fn protected_count(record: &ImmutableImages) -> i32 {
    i32::try_from(record.spec.all_protected_secrets.len()).unwrap_or(i32::MAX)
}

/// Report a converged pass, skipping the write when nothing changed
pub(crate) async fn update_ready_status(
    store: &dyn ClusterStore,
    record: &ImmutableImages,
    missing: usize,
) -> Result<(), StoreError> {
    let previous = record.status.as_ref();
    let generation = record.metadata.generation;
    let count = protected_count(record);
    let description = if missing == 0 {
        format!("{count} protected secret(s)")
    } else {
        format!("{count} protected secret(s), {missing} not found yet")
    };

    if previous.is_some_and(|s| {
        s.is_current(Phase::Ready, generation, count)
            && s.description.as_deref() == Some(description.as_str())
    }) {
        return Ok(());
    }

    let status = ImmutableImagesStatus {
        phase: Some(Phase::Ready.as_str().to_string()),
        description: Some(description.clone()),
        conditions: vec![ready_condition(
            previous,
            "True",
            "Reconciled",
            &description,
        )],
        observed_generation: generation,
        protected_secret_count: Some(count),
        last_reconcile_time: Some(chrono::Utc::now().to_rfc3339()),
    };

    let (namespace, name) = record_identity(record);
    store.patch_record_status(namespace, name, &status).await
}

/// Report a failed pass; errors here are only logged
pub(crate) async fn update_failed_status(
    store: &dyn ClusterStore,
    request: &ReconcileRequest,
    error: &ReconcilerError,
) {
    let record = match store.get_record(&request.namespace, &request.name).await {
        Ok(Some(record)) => record,
        Ok(None) => return,
        Err(e) => {
            debug!("Skipping Failed status for {request}, record unreadable: {e}");
            return;
        }
    };

    let message = error.to_string();
    let previous = record.status.as_ref();
    if previous.is_some_and(|s| {
        s.phase.as_deref() == Some(Phase::Failed.as_str())
            && s.description.as_deref() == Some(message.as_str())
    }) {
        return;
    }

    let status = ImmutableImagesStatus {
        phase: Some(Phase::Failed.as_str().to_string()),
        description: Some(message.clone()),
        conditions: vec![ready_condition(previous, "False", error.reason(), &message)],
        observed_generation: previous.and_then(|s| s.observed_generation),
        protected_secret_count: Some(protected_count(&record)),
        last_reconcile_time: Some(chrono::Utc::now().to_rfc3339()),
    };

    if let Err(e) = store
        .patch_record_status(&request.namespace, &request.name, &status)
        .await
    {
        debug!("Failed to patch Failed status for {request}: {e}");
    }
}

fn record_identity(record: &ImmutableImages) -> (&str, &str) {
    (
        record.metadata.namespace.as_deref().unwrap_or("default"),
        record.metadata.name.as_deref().unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ImmutableImagesSpec;
    use crate::store::InMemoryStore;

    fn stored_record(store: &InMemoryStore) -> ImmutableImages {
        let mut record = ImmutableImages::new("images", ImmutableImagesSpec::default());
        record.metadata.namespace = Some("payments".to_string());
        record.spec.all_protected_secrets = vec!["cred-a".to_string()];
        store.insert_record(record)
    }

    #[tokio::test]
    async fn test_ready_status_is_written_once() {
        let store = InMemoryStore::new();
        let record = stored_record(&store);

        update_ready_status(&store, &record, 0).await.unwrap();
        let first = store.record("payments", "images").unwrap();
        let status = first.status.clone().unwrap();
        assert_eq!(status.phase.as_deref(), Some("Ready"));
        assert_eq!(status.protected_secret_count, Some(1));
        assert_eq!(status.observed_generation, first.metadata.generation);

        // Same state again: no write, resourceVersion unchanged
        update_ready_status(&store, &first, 0).await.unwrap();
        let second = store.record("payments", "images").unwrap();
        assert_eq!(first.metadata.resource_version, second.metadata.resource_version);
    }

    #[tokio::test]
    async fn test_failed_status_keeps_counts() {
        let store = InMemoryStore::new();
        stored_record(&store);
        let request = ReconcileRequest::new("payments", "images");
        let error = ReconcilerError::Conflict("stale".to_string());

        update_failed_status(&store, &request, &error).await;
        let status = store.record("payments", "images").unwrap().status.unwrap();
        assert_eq!(status.phase.as_deref(), Some("Failed"));
        assert_eq!(status.protected_secret_count, Some(1));
        assert_eq!(status.conditions[0].status, "False");
        assert_eq!(status.conditions[0].reason.as_deref(), Some("conflict"));
    }
}

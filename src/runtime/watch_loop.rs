//! # Watch Loop
//!
//! Event sources feeding the reconcile queue:
//!
//! - `ImmutableImages` watcher: enqueues a record when its generation changes,
//!   so status-only updates do not re-trigger it
//! - `Pod` watcher: runs the fan-out mapper for every live pod create/update
//! - `Secret` watcher: re-enqueues the records protecting a secret that is
//!   created or updated while still mutable
//!
//! All streams use the watcher's default backoff and are restarted after a
//! short delay if they ever end.

use crate::controller::fanout::{requests_for_secret, requests_for_workload, WorkloadEvent};
use crate::controller::queue::WorkQueue;
use crate::controller::reconciler::{ReconcileContext, ReconcileRequest};
use crate::crd::ImmutableImages;
use crate::runtime::error_policy::handle_watch_stream_error;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::Api;
use kube_runtime::{watcher, WatchStreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Turns record watch events into reconcile requests
#[derive(Debug, Default)]
pub struct RecordEventHandler {
    generations: HashMap<ReconcileRequest, Option<i64>>,
    /// Generations seen by a listing in progress, replaces `generations` on `InitDone`
    relisted: Option<HashMap<ReconcileRequest, Option<i64>>>,
}

impl RecordEventHandler {
    /// Number of records whose generation is remembered
    pub fn tracked(&self) -> usize {
        self.generations.len()
    }

    /// Request to enqueue for `event`, if any
    pub fn handle(&mut self, event: watcher::Event<ImmutableImages>) -> Option<ReconcileRequest> {
        match event {
            watcher::Event::Init => {
                self.relisted = Some(HashMap::new());
                None
            }
            // Initial listing re-derives every record
            watcher::Event::InitApply(record) => {
                let request = ReconcileRequest::from_record(&record)?;
                self.relisted
                    .get_or_insert_with(HashMap::new)
                    .insert(request.clone(), record.metadata.generation);
                Some(request)
            }
            watcher::Event::InitDone => {
                if let Some(generations) = self.relisted.take() {
                    self.generations = generations;
                }
                None
            }
            watcher::Event::Apply(record) => {
                let request = ReconcileRequest::from_record(&record)?;
                let generation = record.metadata.generation;
                let previous = self.generations.insert(request.clone(), generation);
                if previous == Some(generation) {
                    debug!("Ignoring status-only update of {request}");
                    return None;
                }
                Some(request)
            }
            watcher::Event::Delete(record) => {
                if let Some(request) = ReconcileRequest::from_record(&record) {
                    self.generations.remove(&request);
                }
                None
            }
        }
    }
}

/// Fan-out for one pod watch event
pub async fn handle_workload_event(
    ctx: &ReconcileContext,
    event: &watcher::Event<Pod>,
) -> Vec<ReconcileRequest> {
    let workload_event = match event {
        watcher::Event::Apply(pod) if pod.metadata.deletion_timestamp.is_some() => {
            WorkloadEvent::Deleted(pod)
        }
        watcher::Event::Apply(pod) => WorkloadEvent::Applied(pod),
        watcher::Event::Delete(pod) => WorkloadEvent::Deleted(pod),
        // The record watcher's initial listing already enqueues every record
        watcher::Event::InitApply(_) | watcher::Event::Init | watcher::Event::InitDone => {
            return Vec::new();
        }
    };
    requests_for_workload(ctx.store.as_ref(), &ctx.scopes, workload_event).await
}

/// Records to revisit for one secret watch event
pub async fn handle_secret_event(
    ctx: &ReconcileContext,
    event: &watcher::Event<Secret>,
) -> Vec<ReconcileRequest> {
    match event {
        watcher::Event::Apply(secret) => {
            requests_for_secret(ctx.store.as_ref(), &ctx.scopes, secret).await
        }
        // Listing is covered by the record watcher; deletes cannot need a tag
        watcher::Event::InitApply(_)
        | watcher::Event::Delete(_)
        | watcher::Event::Init
        | watcher::Event::InitDone => Vec::new(),
    }
}

/// Watch `ImmutableImages` in all namespaces until shutdown
pub async fn run_record_watch(
    api: Api<ImmutableImages>,
    queue: Arc<WorkQueue<ReconcileRequest>>,
    restart_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut handler = RecordEventHandler::default();
    loop {
        info!("Starting ImmutableImages watch...");
        let stream = watcher(api.clone(), watcher::Config::default()).default_backoff();
        tokio::pin!(stream);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Shutdown requested, exiting ImmutableImages watch");
                    return;
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => {
                        if let Some(request) = handler.handle(event) {
                            debug!("Enqueueing {request} (record event)");
                            queue.add(request);
                        }
                    }
                    Some(Err(e)) => handle_watch_stream_error("ImmutableImages", &e),
                    None => break,
                }
            }
        }

        warn!(
            "ImmutableImages watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }
}

/// Watch pods in all namespaces until shutdown
pub async fn run_workload_watch(
    api: Api<Pod>,
    ctx: ReconcileContext,
    queue: Arc<WorkQueue<ReconcileRequest>>,
    restart_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        info!("Starting Pod watch...");
        let stream = watcher(api.clone(), watcher::Config::default()).default_backoff();
        tokio::pin!(stream);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Shutdown requested, exiting Pod watch");
                    return;
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => {
                        for request in handle_workload_event(&ctx, &event).await {
                            debug!("Enqueueing {request} (pod event)");
                            queue.add(request);
                        }
                    }
                    Some(Err(e)) => handle_watch_stream_error("Pod", &e),
                    None => break,
                }
            }
        }

        warn!(
            "Pod watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }
}

/// Watch secrets in all namespaces until shutdown
pub async fn run_secret_watch(
    api: Api<Secret>,
    ctx: ReconcileContext,
    queue: Arc<WorkQueue<ReconcileRequest>>,
    restart_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        info!("Starting Secret watch...");
        let stream = watcher(api.clone(), watcher::Config::default()).default_backoff();
        tokio::pin!(stream);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Shutdown requested, exiting Secret watch");
                    return;
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => {
                        for request in handle_secret_event(&ctx, &event).await {
                            debug!("Enqueueing {request} (secret event)");
                            queue.add(request);
                        }
                    }
                    Some(Err(e)) => handle_watch_stream_error("Secret", &e),
                    None => break,
                }
            }
        }

        warn!(
            "Secret watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::scope::ScopeFilter;
    use crate::crd::ImmutableImagesSpec;
    use crate::store::InMemoryStore;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::api::ObjectMeta;

    fn record(generation: i64) -> ImmutableImages {
        let mut record = ImmutableImages::new("images", ImmutableImagesSpec::default());
        record.metadata.namespace = Some("payments".to_string());
        record.metadata.generation = Some(generation);
        record
    }

    fn pod() -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("payments".to_string()),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        }
    }

    #[test]
    fn test_status_only_updates_are_ignored() {
        let mut handler = RecordEventHandler::default();
        let expected = Some(ReconcileRequest::new("payments", "images"));

        assert_eq!(handler.handle(watcher::Event::Apply(record(1))), expected);
        assert_eq!(handler.handle(watcher::Event::Apply(record(1))), None);
        assert_eq!(handler.handle(watcher::Event::Apply(record(2))), expected);
    }

    #[test]
    fn test_delete_forgets_generation() {
        let mut handler = RecordEventHandler::default();
        handler.handle(watcher::Event::Apply(record(1)));
        assert_eq!(handler.handle(watcher::Event::Delete(record(1))), None);
        // Recreated with the same generation still reconciles
        assert!(handler.handle(watcher::Event::Apply(record(1))).is_some());
    }

    #[test]
    fn test_initial_listing_always_enqueues() {
        let mut handler = RecordEventHandler::default();
        handler.handle(watcher::Event::Apply(record(1)));
        assert!(handler.handle(watcher::Event::InitApply(record(1))).is_some());
        assert!(handler.handle(watcher::Event::InitDone).is_none());
    }

    #[test]
    fn test_relist_forgets_records_deleted_while_disconnected() {
        let mut handler = RecordEventHandler::default();
        let mut gone = record(1);
        gone.metadata.name = Some("gone".to_string());
        handler.handle(watcher::Event::Apply(record(1)));
        handler.handle(watcher::Event::Apply(gone.clone()));
        assert_eq!(handler.tracked(), 2);

        // `gone` was deleted while the watch was down, so the relist omits it
        assert!(handler.handle(watcher::Event::Init).is_none());
        assert!(handler.handle(watcher::Event::InitApply(record(1))).is_some());
        assert!(handler.handle(watcher::Event::InitDone).is_none());
        assert_eq!(handler.tracked(), 1);

        // Still known after the relist
        assert_eq!(handler.handle(watcher::Event::Apply(record(1))), None);
        // Recreated with the old generation reconciles again
        assert!(handler.handle(watcher::Event::Apply(gone)).is_some());
    }

    #[tokio::test]
    async fn test_secret_events() {
        let store = Arc::new(InMemoryStore::new());
        let mut protecting = record(1);
        protecting.spec.all_protected_secrets = vec!["cred-a".to_string()];
        store.insert_record(protecting);
        let ctx = ReconcileContext::new(store, ScopeFilter::allow_all());

        let created = Secret {
            metadata: ObjectMeta {
                name: Some("cred-a".to_string()),
                namespace: Some("payments".to_string()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        };
        let applied = handle_secret_event(&ctx, &watcher::Event::Apply(created.clone())).await;
        assert_eq!(applied, vec![ReconcileRequest::new("payments", "images")]);

        let listed = handle_secret_event(&ctx, &watcher::Event::InitApply(created.clone())).await;
        assert!(listed.is_empty());
        let deleted = handle_secret_event(&ctx, &watcher::Event::Delete(created)).await;
        assert!(deleted.is_empty());
    }

    #[tokio::test]
    async fn test_workload_events() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_record(record(1));
        let ctx = ReconcileContext::new(store, ScopeFilter::allow_all());

        let applied = handle_workload_event(&ctx, &watcher::Event::Apply(pod())).await;
        assert_eq!(applied, vec![ReconcileRequest::new("payments", "images")]);

        let initial = handle_workload_event(&ctx, &watcher::Event::InitApply(pod())).await;
        assert!(initial.is_empty());

        let mut terminating = pod();
        terminating.metadata.deletion_timestamp =
            Some(serde_json::from_value::<Time>(serde_json::json!("2026-01-01T00:00:00Z")).unwrap());
        let deleted = handle_workload_event(&ctx, &watcher::Event::Apply(terminating)).await;
        assert!(deleted.is_empty());
    }
}

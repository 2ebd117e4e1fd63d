//! # Error Policy
//!
//! Error handling and backoff logic for reconcile workers and watch streams.

use crate::controller::backoff::{BackoffTracker, RetryDecision};
use crate::controller::queue::WorkQueue;
use crate::controller::reconciler::{ReconcileRequest, ReconcilerError};
use crate::observability;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{error, info, warn};

/// Requeue a failed request with per-request exponential backoff
///
/// Non-retryable errors and exhausted retry budgets drop the request; the
/// next watch event for the record or a pod in its namespace brings it back.
/// Returns the delay used, if the request was requeued.
pub fn handle_reconciliation_error(
    request: &ReconcileRequest,
    error: &ReconcilerError,
    tracker: &Mutex<BackoffTracker<ReconcileRequest>>,
    queue: &Arc<WorkQueue<ReconcileRequest>>,
) -> Option<Duration> {
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.worker.reconciliation_error",
        resource.name = request.name.as_str(),
        resource.namespace = request.namespace.as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", request, error);

    let mut tracker = tracker.lock().unwrap_or_else(PoisonError::into_inner);
    if !error.is_retryable() {
        tracker.forget(request);
        warn!(
            "Not retrying {} ({}), waiting for the next change",
            request,
            error.reason()
        );
        return None;
    }

    match tracker.next_delay(request) {
        RetryDecision::RetryAfter(delay) => {
            let failures = tracker.failures(request);
            drop(tracker);
            info!(
                "🔄 Retrying with exponential backoff: {}ms (error count: {}, reason: {})",
                delay.as_millis(),
                failures,
                error.reason()
            );
            observability::metrics::increment_requeues(error.reason());
            queue.add_after(request.clone(), delay);
            Some(delay)
        }
        RetryDecision::GiveUp { failures } => {
            warn!(
                "Giving up on {} after {} failures, waiting for the next change",
                request, failures
            );
            None
        }
    }
}

/// Log a watch stream error; the stream itself retries with its own backoff
pub fn handle_watch_stream_error(kind: &str, error: &kube_runtime::watcher::Error) {
    let error_string = error.to_string();
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        watch.kind = kind,
        error = %error_string
    );
    let _error_guard = error_span.enter();

    let is_forbidden = error_string.contains("403") || error_string.contains("forbidden");
    let is_not_found = error_string.contains("404") || error_string.contains("not found");

    if is_forbidden {
        error!(
            "{} watch forbidden - check RBAC for list/watch on {}: {}",
            kind, kind, error_string
        );
    } else if is_not_found {
        error!(
            "{} watch target not found - is the CRD installed? {}",
            kind, error_string
        );
    } else {
        warn!("{} watch error, retrying with backoff: {}", kind, error_string);
    }
}

//! # Workers
//!
//! Fixed pool of tokio tasks draining the reconcile queue.
//!
//! Each worker owns the request it took from the queue until it calls
//! `done`, so one record is never reconciled by two workers at once while
//! different records run in parallel.

use crate::controller::backoff::BackoffTracker;
use crate::controller::queue::WorkQueue;
use crate::controller::reconciler::{reconcile, ReconcileContext, ReconcileOutcome, ReconcileRequest};
use crate::observability;
use crate::runtime::error_policy::handle_reconciliation_error;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Everything a worker needs, shared by the whole pool
#[derive(Debug, Clone)]
pub struct WorkerPool {
    pub ctx: ReconcileContext,
    pub queue: Arc<WorkQueue<ReconcileRequest>>,
    pub tracker: Arc<Mutex<BackoffTracker<ReconcileRequest>>>,
}

impl WorkerPool {
    pub fn new(
        ctx: ReconcileContext,
        queue: Arc<WorkQueue<ReconcileRequest>>,
        tracker: BackoffTracker<ReconcileRequest>,
    ) -> Self {
        Self {
            ctx,
            queue,
            tracker: Arc::new(Mutex::new(tracker)),
        }
    }

    /// Spawn `count` workers; they exit once the queue shuts down and drains
    pub fn spawn(&self, count: usize) -> Vec<JoinHandle<()>> {
        (0..count)
            .map(|id| {
                let pool = self.clone();
                tokio::spawn(async move { pool.run_worker(id).await })
            })
            .collect()
    }

    async fn run_worker(&self, id: usize) {
        debug!(worker = id, "Worker started");
        while let Some(request) = self.queue.get().await {
            observability::metrics::set_queue_depth(self.queue.len());
            self.process(&request).await;
            self.queue.done(&request);
        }
        debug!(worker = id, "Worker stopped");
    }

    /// Reconcile one request and apply the retry policy to its result
    pub async fn process(&self, request: &ReconcileRequest) -> Option<ReconcileOutcome> {
        match reconcile(&self.ctx, request).await {
            Ok(outcome) => {
                self.tracker
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .forget(request);
                if outcome == ReconcileOutcome::Abandoned {
                    info!("Reconciliation of {} abandoned for shutdown", request);
                }
                Some(outcome)
            }
            Err(e) => {
                handle_reconciliation_error(request, &e, &self.tracker, &self.queue);
                None
            }
        }
    }
}

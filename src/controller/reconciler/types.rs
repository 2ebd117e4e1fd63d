//! # Types
//!
//! Core types for the reconciler.

use crate::controller::scope::ScopeFilter;
use crate::crd::ImmutableImages;
use crate::store::{ClusterStore, StoreError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Identity of an `ImmutableImages` record to re-derive
///
/// Requests carry no delta: reconciling the same identity twice is the same
/// as reconciling it once, which is what lets the work queue collapse them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReconcileRequest {
    pub namespace: String,
    pub name: String,
}

impl ReconcileRequest {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Request for a record, `None` if it has no name or namespace
    pub fn from_record(record: &ImmutableImages) -> Option<Self> {
        Some(Self::new(
            record.metadata.namespace.as_deref()?,
            record.metadata.name.as_deref()?,
        ))
    }
}

impl fmt::Display for ReconcileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// Record write lost the optimistic-concurrency race twice
    #[error("conflict persisting ImmutableImages: {0}")]
    Conflict(String),
    /// Store was transiently unavailable
    #[error("store unavailable: {0}")]
    RetryableIo(String),
    /// Store refused a write; retrying the same write cannot succeed
    #[error("write rejected: {0}")]
    Rejected(String),
    /// Record vanished between read and write
    #[error("ImmutableImages disappeared during reconciliation: {0}")]
    RecordGone(String),
    /// One or more secrets could not be marked immutable
    #[error("failed to tag {failed} secret(s), first failure on {secret}: {source}")]
    TaggingFailed {
        secret: String,
        failed: usize,
        #[source]
        source: StoreError,
    },
}

impl ReconcilerError {
    /// Whether the request should be requeued with backoff
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcilerError::Conflict(_)
            | ReconcilerError::RetryableIo(_)
            | ReconcilerError::RecordGone(_) => true,
            ReconcilerError::Rejected(_) => false,
            ReconcilerError::TaggingFailed { source, .. } => source.is_retryable(),
        }
    }

    /// Short label used for the requeue metric and logs
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcilerError::Conflict(_) => "conflict",
            ReconcilerError::RetryableIo(_) => "store-unavailable",
            ReconcilerError::Rejected(_) => "rejected",
            ReconcilerError::RecordGone(_) => "record-gone",
            ReconcilerError::TaggingFailed { .. } => "tagging-failed",
        }
    }
}

impl From<StoreError> for ReconcilerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => ReconcilerError::Conflict(message),
            StoreError::Unavailable(message) => ReconcilerError::RetryableIo(message),
            StoreError::Rejected(message) => ReconcilerError::Rejected(message),
            StoreError::NotFound(message) => ReconcilerError::RecordGone(message),
        }
    }
}

/// Result of one successful reconcile pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Record matches the workloads in its namespace
    Converged {
        /// Secrets added to `allProtectedSecrets` by this pass
        newly_protected: Vec<String>,
        /// Secrets whose immutable flag this pass set
        tagged: Vec<String>,
        /// Protected secrets referenced by workloads but not present
        missing: Vec<String>,
    },
    /// Record is in an excluded namespace
    Skipped,
    /// Shutdown requested between steps; resuming later is safe
    Abandoned,
}

impl ReconcileOutcome {
    pub(crate) fn converged_empty() -> Self {
        ReconcileOutcome::Converged {
            newly_protected: Vec::new(),
            tagged: Vec::new(),
            missing: Vec::new(),
        }
    }
}

/// Shared state handed to every reconcile call
#[derive(Clone)]
pub struct ReconcileContext {
    pub store: Arc<dyn ClusterStore>,
    pub scopes: ScopeFilter,
    shutdown: Arc<AtomicBool>,
}

impl fmt::Debug for ReconcileContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcileContext")
            .field("scopes", &self.scopes)
            .field("shutdown", &self.is_shutting_down())
            .finish_non_exhaustive()
    }
}

impl ReconcileContext {
    pub fn new(store: Arc<dyn ClusterStore>, scopes: ScopeFilter) -> Self {
        Self {
            store,
            scopes,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Ask in-flight reconciliations to stop after their current step
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

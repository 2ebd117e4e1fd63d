//! # Cluster Store
//!
//! The object store is the only shared mutable resource. Every write goes
//! through an optimistic-concurrency update: the caller sends the object it
//! read (with its `resourceVersion`) and gets `Conflict` if someone else wrote
//! in between.
//!
//! - `kubernetes.rs` - Kubernetes API server implementation
//! - `memory.rs` - versioned in-memory implementation with fault injection

mod kubernetes;
mod memory;

pub use kubernetes::KubeStore;
pub use memory::InMemoryStore;

use crate::crd::{ImmutableImages, ImmutableImagesStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Secret};
use thiserror::Error;

/// Errors returned by store operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Referenced object does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// Optimistic-concurrency version mismatch
    #[error("conflict: {0}")]
    Conflict(String),
    /// Store rejected the write (validation, immutable field)
    #[error("rejected: {0}")]
    Rejected(String),
    /// Transient store unavailability
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether retrying the operation later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_) | StoreError::Unavailable(_))
    }
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(api_err) if api_err.code == 404 => {
                StoreError::NotFound(api_err.message.clone())
            }
            kube::Error::Api(api_err) if api_err.code == 409 => {
                StoreError::Conflict(api_err.message.clone())
            }
            kube::Error::Api(api_err) if api_err.code == 422 || api_err.code == 403 => {
                StoreError::Rejected(api_err.message.clone())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

/// Operations the controller and webhook need from the object store
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Fetch one association record
    async fn get_record(&self, namespace: &str, name: &str)
        -> Result<Option<ImmutableImages>, StoreError>;

    /// List association records in `namespace`, or in every namespace when `None`
    async fn list_records(&self, namespace: Option<&str>)
        -> Result<Vec<ImmutableImages>, StoreError>;

    /// Replace a record, failing with `Conflict` if its version is stale
    async fn replace_record(&self, record: &ImmutableImages) -> Result<ImmutableImages, StoreError>;

    /// Overwrite the status subresource of a record
    async fn patch_record_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ImmutableImagesStatus,
    ) -> Result<(), StoreError>;

    /// List workloads in a namespace
    async fn list_workloads(&self, namespace: &str) -> Result<Vec<Pod>, StoreError>;

    /// Fetch one secret
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError>;

    /// Replace a secret, failing with `Conflict` if its version is stale
    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;
}

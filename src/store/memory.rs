//! # In-Memory Store
//!
//! A `ClusterStore` that keeps objects in process memory and enforces the same
//! rules the API server does for the operations the controller uses:
//!
//! - every write bumps `resourceVersion`; writing a stale version is a `Conflict`
//! - spec changes on a record bump `metadata.generation`
//! - an immutable secret cannot be changed or made mutable again
//!
//! Faults can be injected to exercise retry paths: a number of forced
//! conflicts per object kind, failing status patches, and a global
//! "unavailable" switch.

use super::{ClusterStore, StoreError};
use crate::crd::{ImmutableImages, ImmutableImagesStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::ObjectMeta;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

type ObjectKey = (String, String);

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<ObjectKey, ImmutableImages>,
    pods: BTreeMap<ObjectKey, Pod>,
    secrets: BTreeMap<ObjectKey, Secret>,
    next_version: u64,
    forced_record_conflicts: u32,
    forced_secret_conflicts: u32,
    forced_status_failures: u32,
    unavailable: bool,
    secret_writes: HashMap<ObjectKey, u32>,
}

impl MemoryState {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("in-memory store marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Versioned in-memory object store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

fn key_of(meta: &ObjectMeta) -> ObjectKey {
    (
        meta.namespace.clone().unwrap_or_else(|| "default".to_string()),
        meta.name.clone().unwrap_or_default(),
    )
}

fn key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

fn check_version(stored: &ObjectMeta, incoming: &ObjectMeta) -> Result<(), StoreError> {
    if stored.resource_version == incoming.resource_version {
        Ok(())
    } else {
        Err(StoreError::Conflict(format!(
            "the object {} has been modified; please apply your changes to the latest version",
            stored.name.as_deref().unwrap_or("unknown")
        )))
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or overwrite a record, returning the stored copy
    pub fn insert_record(&self, mut record: ImmutableImages) -> ImmutableImages {
        let mut state = self.lock();
        record.metadata.resource_version = Some(state.bump_version());
        record.metadata.generation = Some(record.metadata.generation.unwrap_or(0) + 1);
        if record.metadata.namespace.is_none() {
            record.metadata.namespace = Some("default".to_string());
        }
        state.records.insert(key_of(&record.metadata), record.clone());
        record
    }

    /// Remove a record, as its owner deleting the declaration would
    pub fn delete_record(&self, namespace: &str, name: &str) -> Option<ImmutableImages> {
        self.lock().records.remove(&key(namespace, name))
    }

    /// Current stored copy of a record
    pub fn record(&self, namespace: &str, name: &str) -> Option<ImmutableImages> {
        self.lock().records.get(&key(namespace, name)).cloned()
    }

    /// Create or overwrite a workload
    pub fn insert_pod(&self, mut pod: Pod) {
        let mut state = self.lock();
        pod.metadata.resource_version = Some(state.bump_version());
        if pod.metadata.namespace.is_none() {
            pod.metadata.namespace = Some("default".to_string());
        }
        state.pods.insert(key_of(&pod.metadata), pod);
    }

    /// Create or overwrite a secret
    pub fn insert_secret(&self, mut secret: Secret) {
        let mut state = self.lock();
        secret.metadata.resource_version = Some(state.bump_version());
        if secret.metadata.namespace.is_none() {
            secret.metadata.namespace = Some("default".to_string());
        }
        state.secrets.insert(key_of(&secret.metadata), secret);
    }

    /// Current stored copy of a secret
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.lock().secrets.get(&key(namespace, name)).cloned()
    }

    /// Number of successful `replace_secret` calls for one secret
    pub fn secret_write_count(&self, namespace: &str, name: &str) -> u32 {
        self.lock()
            .secret_writes
            .get(&key(namespace, name))
            .copied()
            .unwrap_or(0)
    }

    /// Make the next `count` record replacements fail with `Conflict`
    pub fn fail_next_record_writes(&self, count: u32) {
        self.lock().forced_record_conflicts = count;
    }

    /// Make the next `count` secret replacements fail with `Conflict`
    pub fn fail_next_secret_writes(&self, count: u32) {
        self.lock().forced_secret_conflicts = count;
    }

    /// Make the next `count` status patches fail as unavailable
    pub fn fail_next_status_patches(&self, count: u32) {
        self.lock().forced_status_failures = count;
    }

    /// Toggle transient unavailability for every operation
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }
}

#[async_trait]
impl ClusterStore for InMemoryStore {
    async fn get_record(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ImmutableImages>, StoreError> {
        let state = self.lock();
        state.check_available()?;
        Ok(state.records.get(&key(namespace, name)).cloned())
    }

    async fn list_records(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ImmutableImages>, StoreError> {
        let state = self.lock();
        state.check_available()?;
        Ok(state
            .records
            .iter()
            .filter(|((ns, _), _)| namespace.is_none_or(|wanted| wanted == ns))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn replace_record(&self, record: &ImmutableImages) -> Result<ImmutableImages, StoreError> {
        let mut state = self.lock();
        state.check_available()?;
        let object_key = key_of(&record.metadata);
        let stored = state
            .records
            .get(&object_key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", object_key.0, object_key.1)))?;
        if state.forced_record_conflicts > 0 {
            state.forced_record_conflicts -= 1;
            return Err(StoreError::Conflict("forced record conflict".to_string()));
        }
        check_version(&stored.metadata, &record.metadata)?;

        let mut updated = record.clone();
        updated.metadata.resource_version = Some(state.bump_version());
        let generation = stored.metadata.generation.unwrap_or(1);
        updated.metadata.generation = Some(if stored.spec == record.spec {
            generation
        } else {
            generation + 1
        });
        // Replacing the main resource never touches the status subresource
        updated.status = stored.status;
        state.records.insert(object_key, updated.clone());
        Ok(updated)
    }

    async fn patch_record_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ImmutableImagesStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.check_available()?;
        if state.forced_status_failures > 0 {
            state.forced_status_failures -= 1;
            return Err(StoreError::Unavailable("forced status failure".to_string()));
        }
        let version = state.bump_version();
        let record = state
            .records
            .get_mut(&key(namespace, name))
            .ok_or_else(|| StoreError::NotFound(format!("{namespace}/{name}")))?;
        record.status = Some(status.clone());
        record.metadata.resource_version = Some(version);
        Ok(())
    }

    async fn list_workloads(&self, namespace: &str) -> Result<Vec<Pod>, StoreError> {
        let state = self.lock();
        state.check_available()?;
        Ok(state
            .pods
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, pod)| pod.clone())
            .collect())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        let state = self.lock();
        state.check_available()?;
        Ok(state.secrets.get(&key(namespace, name)).cloned())
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let mut state = self.lock();
        state.check_available()?;
        let object_key = key_of(&secret.metadata);
        let stored = state
            .secrets
            .get(&object_key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", object_key.0, object_key.1)))?;
        if state.forced_secret_conflicts > 0 {
            state.forced_secret_conflicts -= 1;
            return Err(StoreError::Conflict("forced secret conflict".to_string()));
        }
        check_version(&stored.metadata, &secret.metadata)?;
        if stored.immutable == Some(true)
            && (secret.immutable != Some(true)
                || secret.data != stored.data
                || secret.string_data.is_some())
        {
            return Err(StoreError::Rejected(format!(
                "Secret \"{}\" is invalid: field is immutable when `immutable` is set",
                object_key.1
            )));
        }

        let mut updated = secret.clone();
        updated.metadata.resource_version = Some(state.bump_version());
        *state.secret_writes.entry(object_key.clone()).or_insert(0) += 1;
        state.secrets.insert(object_key, updated.clone());
        Ok(updated)
    }
}

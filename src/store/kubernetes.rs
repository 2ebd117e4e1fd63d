//! # Kubernetes Store
//!
//! `ClusterStore` backed by the Kubernetes API server.

use super::{ClusterStore, StoreError};
use crate::crd::{ImmutableImages, ImmutableImagesStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::{
    api::{Api, ListParams, Patch, PatchParams, PostParams},
    Client,
};

/// Store that talks to the API server through `kube::Api`
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn records(&self, namespace: Option<&str>) -> Api<ImmutableImages> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

fn object_name(meta: &kube::api::ObjectMeta) -> Result<(&str, &str), StoreError> {
    let name = meta
        .name
        .as_deref()
        .ok_or_else(|| StoreError::Rejected("object has no name".to_string()))?;
    let namespace = meta
        .namespace
        .as_deref()
        .ok_or_else(|| StoreError::Rejected(format!("object {name} has no namespace")))?;
    Ok((namespace, name))
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_record(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ImmutableImages>, StoreError> {
        Ok(self.records(Some(namespace)).get_opt(name).await?)
    }

    async fn list_records(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ImmutableImages>, StoreError> {
        let list = self.records(namespace).list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn replace_record(&self, record: &ImmutableImages) -> Result<ImmutableImages, StoreError> {
        let (namespace, name) = object_name(&record.metadata)?;
        Ok(self
            .records(Some(namespace))
            .replace(name, &PostParams::default(), record)
            .await?)
    }

    async fn patch_record_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ImmutableImagesStatus,
    ) -> Result<(), StoreError> {
        let patch = serde_json::json!({ "status": status });
        self.records(Some(namespace))
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn list_workloads(&self, namespace: &str) -> Result<Vec<Pod>, StoreError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(pods.list(&ListParams::default()).await?.items)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(secrets.get_opt(name).await?)
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let (namespace, name) = object_name(&secret.metadata)?;
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(secrets.replace(name, &PostParams::default(), secret).await?)
    }
}

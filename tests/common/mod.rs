//! Common test utilities
//!
//! Pod, secret and `ImmutableImages` fixtures plus a reconcile context
//! backed by `InMemoryStore`.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use k8s_openapi::api::core::v1::{
    Container, EnvFromSource, EnvVar, EnvVarSource, LocalObjectReference, Pod, PodSpec, Secret,
    SecretEnvSource, SecretKeySelector, SecretVolumeSource, Volume, VolumeMount,
};
use kube::api::ObjectMeta;
use secret_immutability_controller::controller::reconciler::ReconcileContext;
use secret_immutability_controller::controller::scope::ScopeFilter;
use secret_immutability_controller::crd::{ImmutableImages, ImmutableImagesSpec};
use secret_immutability_controller::store::InMemoryStore;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const NAMESPACE: &str = "payments";

/// `ImmutableImages` record protecting `images`
pub fn record(namespace: &str, name: &str, images: &[&str]) -> ImmutableImages {
    let mut record = ImmutableImages::new(
        name,
        ImmutableImagesSpec {
            protected_images: images.iter().map(|image| (*image).to_string()).collect(),
            ..ImmutableImagesSpec::default()
        },
    );
    record.metadata.namespace = Some(namespace.to_string());
    record
}

/// Record that already lists `secrets` as protected
pub fn protecting_record(namespace: &str, name: &str, secrets: &[&str]) -> ImmutableImages {
    let mut record = record(namespace, name, &["alpine:latest"]);
    record.spec.image_to_secrets = BTreeMap::from([(
        "alpine:latest".to_string(),
        secrets.iter().map(|s| (*s).to_string()).collect(),
    )]);
    record.spec.all_protected_secrets = secrets.iter().map(|s| (*s).to_string()).collect();
    record
}

pub fn secret(namespace: &str, name: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        data: Some(BTreeMap::new()),
        ..Secret::default()
    }
}

fn pod(namespace: &str, name: &str, spec: PodSpec) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        spec: Some(spec),
        ..Pod::default()
    }
}

fn container(image: &str) -> Container {
    Container {
        name: "app".to_string(),
        image: Some(image.to_string()),
        ..Container::default()
    }
}

/// Pod declaring a secret volume `volume` and mounting `mount` into a container
pub fn pod_with_secret_volume(
    namespace: &str,
    name: &str,
    image: &str,
    secret: &str,
    volume: &str,
    mount: &str,
) -> Pod {
    let mut app = container(image);
    app.volume_mounts = Some(vec![VolumeMount {
        name: mount.to_string(),
        mount_path: "/etc/creds".to_string(),
        ..VolumeMount::default()
    }]);
    pod(
        namespace,
        name,
        PodSpec {
            containers: vec![app],
            volumes: Some(vec![Volume {
                name: volume.to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(secret.to_string()),
                    ..SecretVolumeSource::default()
                }),
                ..Volume::default()
            }]),
            ..PodSpec::default()
        },
    )
}

/// Pod whose container reads one key of `secret` into an env var
pub fn pod_with_env_secret(namespace: &str, name: &str, image: &str, secret: &str) -> Pod {
    let mut app = container(image);
    app.env = Some(vec![EnvVar {
        name: "PASSWORD".to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: "password".to_string(),
                ..SecretKeySelector::default()
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    }]);
    pod(
        namespace,
        name,
        PodSpec {
            containers: vec![app],
            ..PodSpec::default()
        },
    )
}

/// Pod whose container imports every key of `secret`
pub fn pod_with_env_from(namespace: &str, name: &str, image: &str, secret: &str) -> Pod {
    let mut app = container(image);
    app.env_from = Some(vec![EnvFromSource {
        secret_ref: Some(SecretEnvSource {
            name: secret.to_string(),
            ..SecretEnvSource::default()
        }),
        ..EnvFromSource::default()
    }]);
    pod(
        namespace,
        name,
        PodSpec {
            containers: vec![app],
            ..PodSpec::default()
        },
    )
}

/// Pod pulling `image` with `pull_secret` and consuming nothing else
pub fn pod_with_pull_secret(namespace: &str, name: &str, image: &str, pull_secret: &str) -> Pod {
    pod(
        namespace,
        name,
        PodSpec {
            containers: vec![container(image)],
            image_pull_secrets: Some(vec![LocalObjectReference {
                name: pull_secret.to_string(),
            }]),
            ..PodSpec::default()
        },
    )
}

/// Store plus a reconcile context over it, nothing excluded
pub fn context() -> (Arc<InMemoryStore>, ReconcileContext) {
    let store = Arc::new(InMemoryStore::new());
    let ctx = ReconcileContext::new(Arc::<InMemoryStore>::clone(&store), ScopeFilter::allow_all());
    (store, ctx)
}

pub fn is_immutable(store: &InMemoryStore, namespace: &str, name: &str) -> bool {
    store
        .secret(namespace, name)
        .is_some_and(|secret| secret.immutable == Some(true))
}

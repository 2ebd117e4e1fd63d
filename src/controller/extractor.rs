//! # Reference Extractor
//!
//! Finds the `(image, secret)` pairs a pod introduces for protected images.
//!
//! Passes, results unioned:
//! 1. secret-backed volumes mounted (by volume name) into a protected container
//! 2. `env[].valueFrom.secretKeyRef` of protected containers
//! 3. `envFrom[].secretRef` of protected containers
//! 4. optionally, `imagePullSecrets` of the pod for each protected container
//!
//! Only `spec.containers` are scanned. Missing fields are treated as empty,
//! so extraction never fails.

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use std::collections::{BTreeSet, HashMap};

/// One protected image consuming one secret
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageSecretPair {
    pub image: String,
    pub secret: String,
}

impl ImageSecretPair {
    pub fn new(image: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            secret: secret.into(),
        }
    }
}

/// Extraction options carried by the association record
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Count `imagePullSecrets` as consumed by protected containers
    pub include_image_pull_secrets: bool,
}

/// Extract every pair `pod` introduces for images in `protected_images`
pub fn extract_pairs(
    pod: &Pod,
    protected_images: &BTreeSet<String>,
    options: ExtractOptions,
) -> BTreeSet<ImageSecretPair> {
    let mut pairs = BTreeSet::new();
    let Some(spec) = pod.spec.as_ref() else {
        return pairs;
    };

    let protected: Vec<(&Container, &str)> = spec
        .containers
        .iter()
        .filter_map(|container| {
            let image = container.image.as_deref()?;
            protected_images.contains(image).then_some((container, image))
        })
        .collect();
    if protected.is_empty() {
        return pairs;
    }

    volume_mount_pairs(spec, &protected, &mut pairs);
    for (container, image) in &protected {
        env_pairs(container, image, &mut pairs);
        env_from_pairs(container, image, &mut pairs);
    }
    if options.include_image_pull_secrets {
        image_pull_secret_pairs(spec, &protected, &mut pairs);
    }
    pairs
}

fn volume_mount_pairs(
    spec: &PodSpec,
    protected: &[(&Container, &str)],
    pairs: &mut BTreeSet<ImageSecretPair>,
) {
    // volume name -> secret name
    let secret_volumes: HashMap<&str, &str> = spec
        .volumes
        .iter()
        .flatten()
        .filter_map(|volume| {
            let secret = volume.secret.as_ref()?.secret_name.as_deref()?;
            Some((volume.name.as_str(), secret))
        })
        .collect();
    if secret_volumes.is_empty() {
        return;
    }

    for (container, image) in protected {
        for mount in container.volume_mounts.iter().flatten() {
            if let Some(secret) = secret_volumes.get(mount.name.as_str()) {
                pairs.insert(ImageSecretPair::new(*image, *secret));
            }
        }
    }
}

fn env_pairs(container: &Container, image: &str, pairs: &mut BTreeSet<ImageSecretPair>) {
    let secrets = container
        .env
        .iter()
        .flatten()
        .filter_map(|var| var.value_from.as_ref()?.secret_key_ref.as_ref())
        .map(|selector| selector.name.as_str())
        .filter(|name| !name.is_empty());
    for secret in secrets {
        pairs.insert(ImageSecretPair::new(image, secret));
    }
}

fn env_from_pairs(container: &Container, image: &str, pairs: &mut BTreeSet<ImageSecretPair>) {
    let secrets = container
        .env_from
        .iter()
        .flatten()
        .filter_map(|source| source.secret_ref.as_ref())
        .map(|source| source.name.as_str())
        .filter(|name| !name.is_empty());
    for secret in secrets {
        pairs.insert(ImageSecretPair::new(image, secret));
    }
}

fn image_pull_secret_pairs(
    spec: &PodSpec,
    protected: &[(&Container, &str)],
    pairs: &mut BTreeSet<ImageSecretPair>,
) {
    for reference in spec.image_pull_secrets.iter().flatten() {
        if reference.name.is_empty() {
            continue;
        }
        for (_, image) in protected {
            pairs.insert(ImageSecretPair::new(*image, reference.name.as_str()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        EnvFromSource, EnvVar, EnvVarSource, LocalObjectReference, SecretEnvSource,
        SecretKeySelector, SecretVolumeSource, Volume, VolumeMount,
    };

    fn protected(images: &[&str]) -> BTreeSet<String> {
        images.iter().map(|image| (*image).to_string()).collect()
    }

    fn container(name: &str, image: &str) -> Container {
        Container {
            name: name.to_string(),
            image: Some(image.to_string()),
            ..Container::default()
        }
    }

    fn pod(containers: Vec<Container>, volumes: Vec<Volume>) -> Pod {
        Pod {
            spec: Some(PodSpec {
                containers,
                volumes: Some(volumes),
                ..PodSpec::default()
            }),
            ..Pod::default()
        }
    }

    fn secret_volume(name: &str, secret: &str) -> Volume {
        Volume {
            name: name.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret.to_string()),
                ..SecretVolumeSource::default()
            }),
            ..Volume::default()
        }
    }

    fn mount(name: &str) -> VolumeMount {
        VolumeMount {
            name: name.to_string(),
            mount_path: format!("/etc/{name}"),
            ..VolumeMount::default()
        }
    }

    fn env_secret(secret: &str) -> EnvVar {
        EnvVar {
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
        }
    }

    #[test]
    fn test_volume_mount_linkage() {
        let mut app = container("app", "alpine:latest");
        app.volume_mounts = Some(vec![mount("creds")]);
        let pod = pod(vec![app], vec![secret_volume("creds", "cred-a")]);

        let pairs = extract_pairs(&pod, &protected(&["alpine:latest"]), ExtractOptions::default());
        assert_eq!(
            pairs,
            BTreeSet::from([ImageSecretPair::new("alpine:latest", "cred-a")])
        );
    }

    #[test]
    fn test_unmatched_mount_name_yields_nothing() {
        let mut app = container("app", "alpine:latest");
        app.volume_mounts = Some(vec![mount("other")]);
        let pod = pod(vec![app], vec![secret_volume("creds", "cred-a")]);

        let pairs = extract_pairs(&pod, &protected(&["alpine:latest"]), ExtractOptions::default());
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_volume_mounted_only_by_unprotected_container() {
        let mut sidecar = container("sidecar", "busybox:1.36");
        sidecar.volume_mounts = Some(vec![mount("creds")]);
        let pod = pod(
            vec![container("app", "alpine:latest"), sidecar],
            vec![secret_volume("creds", "cred-a")],
        );

        let pairs = extract_pairs(&pod, &protected(&["alpine:latest"]), ExtractOptions::default());
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_env_and_env_from_linkage() {
        let mut app = container("app", "nginx:0.3");
        app.env = Some(vec![env_secret("cred-env")]);
        app.env_from = Some(vec![EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: "cred-block".to_string(),
                ..SecretEnvSource::default()
            }),
            ..EnvFromSource::default()
        }]);
        let pod = pod(vec![app], vec![]);

        let pairs = extract_pairs(&pod, &protected(&["nginx:0.3"]), ExtractOptions::default());
        assert_eq!(
            pairs,
            BTreeSet::from([
                ImageSecretPair::new("nginx:0.3", "cred-block"),
                ImageSecretPair::new("nginx:0.3", "cred-env"),
            ])
        );
    }

    #[test]
    fn test_unprotected_image_is_ignored() {
        let mut app = container("app", "alpine:edge");
        app.env = Some(vec![env_secret("cred-b")]);
        let pod = pod(vec![app], vec![]);

        let pairs = extract_pairs(&pod, &protected(&["alpine:latest"]), ExtractOptions::default());
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_same_secret_under_two_images() {
        let mut first = container("first", "alpine:latest");
        first.env = Some(vec![env_secret("cred-c")]);
        let mut second = container("second", "nginx:0.3");
        second.env = Some(vec![env_secret("cred-c")]);
        let pod = pod(vec![first, second], vec![]);

        let pairs = extract_pairs(
            &pod,
            &protected(&["alpine:latest", "nginx:0.3"]),
            ExtractOptions::default(),
        );
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|pair| pair.secret == "cred-c"));
    }

    #[test]
    fn test_image_pull_secrets_are_opt_in() {
        let mut pod = pod(vec![container("app", "alpine:latest")], vec![]);
        if let Some(spec) = pod.spec.as_mut() {
            spec.image_pull_secrets = Some(vec![LocalObjectReference {
                name: "registry-cred".to_string(),
            }]);
        }
        let images = protected(&["alpine:latest"]);

        assert!(extract_pairs(&pod, &images, ExtractOptions::default()).is_empty());
        let pairs = extract_pairs(
            &pod,
            &images,
            ExtractOptions {
                include_image_pull_secrets: true,
            },
        );
        assert_eq!(
            pairs,
            BTreeSet::from([ImageSecretPair::new("alpine:latest", "registry-cred")])
        );
    }

    #[test]
    fn test_pod_without_spec_is_empty() {
        let pairs = extract_pairs(
            &Pod::default(),
            &protected(&["alpine:latest"]),
            ExtractOptions::default(),
        );
        assert!(pairs.is_empty());
    }
}

//! # Association Store
//!
//! In-memory view of an `ImmutableImages` spec used while reconciling.
//!
//! Merging pairs only ever adds: an image key gains secrets, the flattened
//! protected list gains names in discovery order. Nothing is pruned when
//! `protectedImages` shrinks or a workload goes away.

use super::extractor::ImageSecretPair;
use crate::crd::ImmutableImagesSpec;
use std::collections::{BTreeMap, BTreeSet};

/// Protected images and the secrets discovered for them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretAssociations {
    protected_images: BTreeSet<String>,
    image_to_secrets: BTreeMap<String, BTreeSet<String>>,
    all_protected_secrets: Vec<String>,
}

impl SecretAssociations {
    /// Build from a record spec
    ///
    /// The protected set is `protectedImages` plus every seeded key of
    /// `imageToSecrets`, and every protected image gets a key.
    pub fn from_spec(spec: &ImmutableImagesSpec) -> Self {
        let protected_images: BTreeSet<String> = spec
            .protected_images
            .iter()
            .chain(spec.image_to_secrets.keys())
            .filter(|image| !image.is_empty())
            .cloned()
            .collect();

        let mut image_to_secrets: BTreeMap<String, BTreeSet<String>> = protected_images
            .iter()
            .map(|image| (image.clone(), BTreeSet::new()))
            .collect();
        for (image, secrets) in &spec.image_to_secrets {
            if let Some(known) = image_to_secrets.get_mut(image) {
                known.extend(secrets.iter().cloned());
            }
        }

        let mut all_protected_secrets: Vec<String> = Vec::new();
        for secret in &spec.all_protected_secrets {
            if !all_protected_secrets.contains(secret) {
                all_protected_secrets.push(secret.clone());
            }
        }

        Self {
            protected_images,
            image_to_secrets,
            all_protected_secrets,
        }
    }

    pub fn protected_images(&self) -> &BTreeSet<String> {
        &self.protected_images
    }

    pub fn all_protected_secrets(&self) -> &[String] {
        &self.all_protected_secrets
    }

    pub fn secrets_for(&self, image: &str) -> Option<&BTreeSet<String>> {
        self.image_to_secrets.get(image)
    }

    pub fn is_protected_secret(&self, secret: &str) -> bool {
        self.all_protected_secrets.iter().any(|s| s == secret)
    }

    /// Merge `pairs`, returning the secrets that were not protected before
    ///
    /// Pairs for images outside the protected set are ignored. Applying the
    /// same pairs again changes nothing and returns an empty list.
    pub fn apply<'a>(&mut self, pairs: impl IntoIterator<Item = &'a ImageSecretPair>) -> Vec<String> {
        let mut newly_inserted = Vec::new();
        for pair in pairs {
            let Some(secrets) = self.image_to_secrets.get_mut(&pair.image) else {
                continue;
            };
            secrets.insert(pair.secret.clone());
            if !self.is_protected_secret(&pair.secret) {
                self.all_protected_secrets.push(pair.secret.clone());
                newly_inserted.push(pair.secret.clone());
            }
        }
        newly_inserted
    }

    /// Write the associations back into `spec`, returning whether it changed
    ///
    /// `protectedImages` is left as declared.
    pub fn write_to(&self, spec: &mut ImmutableImagesSpec) -> bool {
        let image_to_secrets: BTreeMap<String, Vec<String>> = self
            .image_to_secrets
            .iter()
            .map(|(image, secrets)| (image.clone(), secrets.iter().cloned().collect()))
            .collect();

        let changed = spec.image_to_secrets != image_to_secrets
            || spec.all_protected_secrets != self.all_protected_secrets;
        if changed {
            spec.image_to_secrets = image_to_secrets;
            spec.all_protected_secrets.clone_from(&self.all_protected_secrets);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(images: &[&str]) -> ImmutableImagesSpec {
        ImmutableImagesSpec {
            protected_images: images.iter().map(|image| (*image).to_string()).collect(),
            ..ImmutableImagesSpec::default()
        }
    }

    #[test]
    fn test_apply_returns_newly_inserted_secrets() {
        let mut associations = SecretAssociations::from_spec(&spec(&["alpine:latest"]));
        let pairs = [
            ImageSecretPair::new("alpine:latest", "cred-a"),
            ImageSecretPair::new("alpine:latest", "cred-b"),
        ];

        assert_eq!(associations.apply(&pairs), vec!["cred-a", "cred-b"]);
        assert_eq!(associations.all_protected_secrets(), ["cred-a", "cred-b"]);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut associations = SecretAssociations::from_spec(&spec(&["alpine:latest"]));
        let pairs = [ImageSecretPair::new("alpine:latest", "cred-a")];
        associations.apply(&pairs);
        let before = associations.clone();

        assert!(associations.apply(&pairs).is_empty());
        assert_eq!(associations, before);
    }

    #[test]
    fn test_secret_under_two_images_is_listed_once() {
        let mut associations =
            SecretAssociations::from_spec(&spec(&["alpine:latest", "nginx:0.3"]));
        let pairs = [
            ImageSecretPair::new("alpine:latest", "cred-c"),
            ImageSecretPair::new("nginx:0.3", "cred-c"),
        ];

        assert_eq!(associations.apply(&pairs), vec!["cred-c"]);
        assert!(associations.secrets_for("alpine:latest").unwrap().contains("cred-c"));
        assert!(associations.secrets_for("nginx:0.3").unwrap().contains("cred-c"));
        assert_eq!(associations.all_protected_secrets(), ["cred-c"]);
    }

    #[test]
    fn test_pairs_for_unprotected_images_are_ignored() {
        let mut associations = SecretAssociations::from_spec(&spec(&["alpine:latest"]));
        let pairs = [ImageSecretPair::new("alpine:edge", "cred-b")];

        assert!(associations.apply(&pairs).is_empty());
        assert!(associations.secrets_for("alpine:edge").is_none());
    }

    #[test]
    fn test_seeded_keys_count_as_protected() {
        let mut seeded = ImmutableImagesSpec::default();
        seeded
            .image_to_secrets
            .insert("nginx:0.3".to_string(), vec!["cred-old".to_string()]);
        seeded.all_protected_secrets = vec!["cred-old".to_string()];

        let mut associations = SecretAssociations::from_spec(&seeded);
        assert!(associations.protected_images().contains("nginx:0.3"));
        assert_eq!(
            associations.apply(&[ImageSecretPair::new("nginx:0.3", "cred-new")]),
            vec!["cred-new"]
        );
        assert_eq!(associations.all_protected_secrets(), ["cred-old", "cred-new"]);
    }

    #[test]
    fn test_write_to_reports_changes() {
        let mut record_spec = spec(&["alpine:latest"]);
        let mut associations = SecretAssociations::from_spec(&record_spec);

        // Materializing the empty key is itself a change
        assert!(associations.write_to(&mut record_spec));
        assert!(!associations.write_to(&mut record_spec));

        associations.apply(&[ImageSecretPair::new("alpine:latest", "cred-a")]);
        assert!(associations.write_to(&mut record_spec));
        assert_eq!(
            record_spec.image_to_secrets.get("alpine:latest"),
            Some(&vec!["cred-a".to_string()])
        );
        assert_eq!(record_spec.all_protected_secrets, vec!["cred-a".to_string()]);
        assert_eq!(record_spec.protected_images, vec!["alpine:latest".to_string()]);
    }
}

//! # Tagging Operation
//!
//! One-way transition of a secret's `immutable` flag to `true`.
//!
//! A version conflict is retried once from a fresh read before it is
//! returned to the caller.

use crate::store::{ClusterStore, StoreError};
use tracing::{debug, info};

/// What `tag_immutable` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    /// The flag was set by this call
    Tagged,
    /// The flag was already set; nothing written
    AlreadyImmutable,
    /// The secret does not exist (yet)
    NotFound,
}

/// Mark `namespace/name` immutable
pub async fn tag_immutable(
    store: &dyn ClusterStore,
    namespace: &str,
    name: &str,
) -> Result<TagOutcome, StoreError> {
    match try_tag(store, namespace, name).await {
        Err(StoreError::Conflict(message)) => {
            debug!(
                secret.namespace = namespace,
                secret.name = name,
                "Conflict tagging secret, retrying from a fresh read: {message}"
            );
            try_tag(store, namespace, name).await
        }
        other => other,
    }
}

async fn try_tag(
    store: &dyn ClusterStore,
    namespace: &str,
    name: &str,
) -> Result<TagOutcome, StoreError> {
    let Some(mut secret) = store.get_secret(namespace, name).await? else {
        return Ok(TagOutcome::NotFound);
    };
    if secret.immutable == Some(true) {
        return Ok(TagOutcome::AlreadyImmutable);
    }

    secret.immutable = Some(true);
    match store.replace_secret(&secret).await {
        Ok(_) => {
            info!(
                secret.namespace = namespace,
                secret.name = name,
                "🔒 Secret marked immutable"
            );
            Ok(TagOutcome::Tagged)
        }
        // Deleted between read and write
        Err(StoreError::NotFound(_)) => Ok(TagOutcome::NotFound),
        Err(e) => Err(e),
    }
}

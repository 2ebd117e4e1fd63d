//! # Reconcile
//!
//! One level-triggered pass over an `ImmutableImages` record:
//!
//! 1. Read the record (absent means converged)
//! 2. List pods in its namespace
//! 3. Extract `(image, secret)` pairs from every pod
//! 4. Merge them into the record and persist it
//! 5. Tag newly protected secrets, plus protected secrets referenced now
//! 6. Report status
//!
//! Nothing is rolled back on failure. Every step only adds protection, so a
//! failed pass is simply repeated.

use super::status::{update_failed_status, update_ready_status};
use super::types::{ReconcileContext, ReconcileOutcome, ReconcileRequest, ReconcilerError};
use crate::controller::association::SecretAssociations;
use crate::controller::extractor::{extract_pairs, ExtractOptions, ImageSecretPair};
use crate::controller::tagging::{tag_immutable, TagOutcome};
use crate::crd::ImmutableImages;
use crate::observability;
use crate::store::{ClusterStore, StoreError};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Persisted association state after steps 1-4
struct RecordPass {
    record: ImmutableImages,
    pairs: BTreeSet<ImageSecretPair>,
    newly_protected: Vec<String>,
}

/// Reconcile one request
///
/// # Errors
///
/// Returns an error when persisting the record fails (after one immediate
/// retry on conflict) or when any secret could not be tagged. Tagging already
/// done is kept either way.
pub async fn reconcile(
    ctx: &ReconcileContext,
    request: &ReconcileRequest,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let span = info_span!(
        "controller.reconcile",
        resource.namespace = %request.namespace,
        resource.name = %request.name,
    );
    async move {
        let start = Instant::now();
        observability::metrics::increment_reconciliations();

        let result = reconcile_inner(ctx, request).await;

        observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            observability::metrics::increment_reconciliation_errors();
            update_failed_status(ctx.store.as_ref(), request, e).await;
        }
        result
    }
    .instrument(span)
    .await
}

async fn reconcile_inner(
    ctx: &ReconcileContext,
    request: &ReconcileRequest,
) -> Result<ReconcileOutcome, ReconcilerError> {
    if ctx.scopes.is_excluded_scope(&request.namespace) {
        debug!("Namespace {} is excluded, skipping", request.namespace);
        return Ok(ReconcileOutcome::Skipped);
    }

    let pass = match persist_associations(ctx, request).await {
        Ok(Some(pass)) => pass,
        Ok(None) => return Ok(ReconcileOutcome::converged_empty()),
        Err(StoreError::Conflict(first)) => {
            if ctx.is_shutting_down() {
                return Ok(ReconcileOutcome::Abandoned);
            }
            debug!("Conflict persisting {request}, retrying from a fresh read: {first}");
            match persist_associations(ctx, request).await {
                Ok(Some(pass)) => pass,
                Ok(None) => return Ok(ReconcileOutcome::converged_empty()),
                Err(e) => return Err(e.into()),
            }
        }
        Err(e) => return Err(e.into()),
    };
    if ctx.is_shutting_down() {
        return Ok(ReconcileOutcome::Abandoned);
    }

    if !pass.newly_protected.is_empty() {
        observability::metrics::increment_protected_secrets_discovered(pass.newly_protected.len());
        info!(
            "🔐 {} newly protected secret(s): {}",
            pass.newly_protected.len(),
            pass.newly_protected.join(", ")
        );
    }

    let to_tag = secrets_to_tag(&pass);
    let mut tagged = Vec::new();
    let mut missing = Vec::new();
    let mut failures: Vec<(String, StoreError)> = Vec::new();
    for secret in &to_tag {
        if ctx.is_shutting_down() {
            return Ok(ReconcileOutcome::Abandoned);
        }
        match tag_immutable(ctx.store.as_ref(), &request.namespace, secret).await {
            Ok(TagOutcome::Tagged) => tagged.push(secret.clone()),
            Ok(TagOutcome::AlreadyImmutable) => {}
            Ok(TagOutcome::NotFound) => {
                debug!("Protected secret {secret} does not exist yet");
                missing.push(secret.clone());
            }
            Err(e) => {
                warn!("Failed to mark secret {secret} immutable: {e}");
                failures.push((secret.clone(), e));
            }
        }
    }
    observability::metrics::increment_secrets_tagged(tagged.len());

    let failed = failures.len();
    if let Some((secret, source)) = failures.into_iter().next() {
        return Err(ReconcilerError::TaggingFailed {
            secret,
            failed,
            source,
        });
    }

    if ctx.is_shutting_down() {
        return Ok(ReconcileOutcome::Abandoned);
    }
    // Tags are already applied; a stale status is corrected by the next pass
    if let Err(e) = update_ready_status(ctx.store.as_ref(), &pass.record, missing.len()).await {
        warn!("Failed to patch Ready status for {request}: {e}");
    }

    info!(
        "✅ Reconciled: {} protected secret(s), {} newly tagged, {} missing",
        pass.record.spec.all_protected_secrets.len(),
        tagged.len(),
        missing.len()
    );
    Ok(ReconcileOutcome::Converged {
        newly_protected: pass.newly_protected,
        tagged,
        missing,
    })
}

/// Steps 1-4: read, extract, merge, persist
async fn persist_associations(
    ctx: &ReconcileContext,
    request: &ReconcileRequest,
) -> Result<Option<RecordPass>, StoreError> {
    let store: &dyn ClusterStore = ctx.store.as_ref();
    let Some(mut record) = store.get_record(&request.namespace, &request.name).await? else {
        debug!("ImmutableImages {request} no longer exists");
        return Ok(None);
    };

    let mut associations = SecretAssociations::from_spec(&record.spec);
    if associations.protected_images().is_empty() {
        debug!("ImmutableImages {request} declares no protected images");
    }

    let workloads = store.list_workloads(&request.namespace).await?;
    let options = ExtractOptions {
        include_image_pull_secrets: record.spec.include_image_pull_secrets,
    };
    let pairs: BTreeSet<ImageSecretPair> = workloads
        .iter()
        .flat_map(|pod| extract_pairs(pod, associations.protected_images(), options))
        .collect();

    let newly_protected = associations.apply(&pairs);
    if associations.write_to(&mut record.spec) {
        record = store.replace_record(&record).await?;
    }

    Ok(Some(RecordPass {
        record,
        pairs,
        newly_protected,
    }))
}

/// Newly protected secrets first, then every protected secret referenced now
fn secrets_to_tag(pass: &RecordPass) -> Vec<String> {
    let mut secrets = pass.newly_protected.clone();
    for pair in &pass.pairs {
        if !secrets.contains(&pair.secret) {
            secrets.push(pair.secret.clone());
        }
    }
    secrets
}

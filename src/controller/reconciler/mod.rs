//! # Reconciler
//!
//! Core reconciliation logic for `ImmutableImages` resources.
//!
//! The reconciler:
//! - Reads the record and the pods in its namespace
//! - Extracts the secrets protected images consume
//! - Records them in `imageToSecrets` / `allProtectedSecrets`
//! - Marks those secrets immutable
//! - Updates resource status with reconciliation results

pub mod reconcile;
pub mod status;
pub mod types;

// Re-export public API
pub use reconcile::reconcile;
pub use types::{ReconcileContext, ReconcileOutcome, ReconcileRequest, ReconcilerError};

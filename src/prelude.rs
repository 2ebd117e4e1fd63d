//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use secret_immutability_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Object store seam
pub use crate::store::{ClusterStore, InMemoryStore, KubeStore, StoreError};

// Reconciler types
pub use crate::controller::reconciler::{
    reconcile, ReconcileContext, ReconcileOutcome, ReconcileRequest, ReconcilerError,
};
pub use crate::controller::scope::ScopeFilter;

// Admission
pub use crate::webhook::{AdmissionDecision, AdmissionGate};

// Config types
pub use crate::config::{AdmissionScope, ControllerConfig, ServerConfig, WebhookConfig};

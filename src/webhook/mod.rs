//! # Admission Webhook
//!
//! Validating webhook that blocks changes to protected secrets.
//!
//! - `gate`: the accept/reject decision over `ImmutableImages` records
//! - `handler`: `AdmissionReview` handling
//! - `server`: axum listener with optional rustls TLS

pub mod gate;
pub mod handler;
pub mod server;

pub use gate::{AdmissionDecision, AdmissionGate};
pub use server::start_webhook_server;

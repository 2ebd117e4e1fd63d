//! # Custom Resource Definitions
//!
//! CRD types for the Secret Immutability Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `ImmutableImages` spec (the association record)
//! - `status.rs` - Status types for tracking reconciliation state

mod spec;
mod status;

pub use spec::{ImmutableImages, ImmutableImagesSpec};
pub use status::{Condition, ImmutableImagesStatus, Phase};

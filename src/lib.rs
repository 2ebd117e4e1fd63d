//! Secret Immutability Controller Library
//!
//! Discovers which secrets are consumed by protected container images,
//! records them in `ImmutableImages` resources, marks them immutable and
//! serves an admission webhook that refuses changes to them.
//!
//! ## Quick Start
//!
//! ```rust
//! use secret_immutability_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod store;
pub mod webhook;

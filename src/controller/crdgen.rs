//! # CRD Generator
//!
//! Generates the `ImmutableImages` CustomResourceDefinition YAML from the Rust
//! type definitions.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/immutableimages.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use secret_immutability_controller::crd::ImmutableImages;

fn main() -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(&ImmutableImages::crd())?;
    print!("{yaml}");
    Ok(())
}

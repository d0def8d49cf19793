//! # CRD Generator
//!
//! Generates the `DatadogAgent` CustomResourceDefinition YAML from the Rust type
//! definitions. Both served versions are merged into one CRD, with `v2alpha1`
//! as the storage version.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/datadogagent.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use datadog_agent_controller::crd::{v1alpha1, v2alpha1};
use kube::core::crd::merge_crds;
use kube::core::CustomResourceExt;

fn main() {
    let crd = match merge_crds(
        vec![v1alpha1::DatadogAgent::crd(), v2alpha1::DatadogAgent::crd()],
        "v2alpha1",
    ) {
        Ok(crd) => crd,
        Err(e) => {
            eprintln!("Failed to merge CRD versions: {e}");
            std::process::exit(1);
        }
    };

    match serde_yaml::to_string(&crd) {
        Ok(yaml) => {
            print!("{yaml}");
        }
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}

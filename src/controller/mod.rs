//! # Controller
//!
//! Reconciliation machinery for the `DatadogAgent` resource.
//!
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `client`: cluster access traits and the kube-backed implementation
//! - `convergence`: create-or-update of one object with semantic diffing
//! - `error_policy`: per-resource requeue after a failed pass
//! - `reconciler`: the pass itself
//! - `secret`: credentials Secret decisions
//! - `snapshot`: version-independent view of the watched resource

pub mod backoff;
pub mod client;
pub mod convergence;
pub mod error_policy;
pub mod reconciler;
pub mod secret;
pub mod snapshot;

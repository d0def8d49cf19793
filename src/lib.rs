//! Datadog Agent Controller Library
//!
//! Composes the Datadog agent workloads (node agent DaemonSet, cluster agent and
//! cluster checks runner Deployments, credentials Secret) from a single
//! `DatadogAgent` resource and keeps them converged.
//!
//! A pass flows through the modules in this order:
//!
//! - [`crd`] / [`feature::normalize`] - read either schema version into one shape
//! - [`feature`] - optional capabilities mutating a [`template::PodTemplateManager`]
//! - [`overrides`] - global settings, then per-component user overrides
//! - [`controller::convergence`] - create-or-update against the cluster
//!
//! Tests are included in the module files and under `tests/`.

pub mod component;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod error;
pub mod feature;
pub mod observability;
pub mod overrides;
pub mod server;
pub mod template;
pub mod util;

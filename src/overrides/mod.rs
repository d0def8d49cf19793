//! # Override Layer
//!
//! Applied after the features, in a fixed order:
//!
//! 1. [`apply_global`] - settings from `spec.global` that reach every component,
//!    inserted through the [`PodTemplateManager`](crate::template::PodTemplateManager)
//!    so they conflict with feature entries like any other writer
//! 2. [`apply_override`] - the user's per-component patch, which wins over
//!    anything derived before it

mod component;
mod global;

pub use component::{apply_override, resolve_image};
pub use global::apply_global;

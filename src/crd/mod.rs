//! # Custom Resource Definitions
//!
//! CRD types for the `DatadogAgent` resource.
//!
//! ## Module Structure
//!
//! - `v1alpha1.rs` - Legacy flat schema (served, translated on read)
//! - `v2alpha1.rs` - Structured schema (storage version, internal representation)
//! - `common.rs` - Types shared by both versions
//! - `status.rs` - Status types and condition bookkeeping

pub mod common;
mod status;
pub mod v1alpha1;
pub mod v2alpha1;

pub use common::{
    AgentImageConfig, ConfigMapConfig, CustomConfig, HostPortConfig, SecretConfig,
    UnixDomainSocketConfig,
};
pub use status::{update_condition, Condition, ConditionStatus, ConditionType, DatadogAgentStatus};

/// Served versions of the `DatadogAgent` resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    V1Alpha1,
    V2Alpha1,
}

impl ApiVersion {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1Alpha1 => "v1alpha1",
            Self::V2Alpha1 => "v2alpha1",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "v1alpha1" => Some(Self::V1Alpha1),
            "v2alpha1" => Some(Self::V2Alpha1),
            _ => None,
        }
    }
}

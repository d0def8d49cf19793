//! Read-only view of the watched `DatadogAgent`, whichever version is served.

use crate::crd::v2alpha1::DatadogAgentSpec;
use crate::crd::{v1alpha1, v2alpha1, ApiVersion, DatadogAgentStatus};
use crate::error::ConfigTranslationError;
use crate::feature::normalize::{normalize_v1, validate};
use kube::core::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Identity of the `DatadogAgent` a pass works on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentMeta {
    pub name: String,
    pub namespace: String,
    pub uid: Option<String>,
    pub generation: Option<i64>,
    pub api_version: ApiVersion,
}

/// A served version of the `DatadogAgent` resource
pub trait AgentResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + DeserializeOwned
    + Serialize
    + Debug
    + Send
    + Sync
    + 'static
{
    const API_VERSION: ApiVersion;

    fn status(&self) -> Option<&DatadogAgentStatus>;

    /// Spec in the structured representation, validated
    fn normalized_spec(&self) -> Result<DatadogAgentSpec, ConfigTranslationError>;

    /// Identity; `None` when the object has no namespace
    fn agent_meta(&self) -> Option<AgentMeta> {
        Some(AgentMeta {
            name: self.name_any(),
            namespace: self.namespace()?,
            uid: self.uid(),
            generation: self.meta().generation,
            api_version: Self::API_VERSION,
        })
    }
}

impl AgentResource for v2alpha1::DatadogAgent {
    const API_VERSION: ApiVersion = ApiVersion::V2Alpha1;

    fn status(&self) -> Option<&DatadogAgentStatus> {
        self.status.as_ref()
    }

    fn normalized_spec(&self) -> Result<DatadogAgentSpec, ConfigTranslationError> {
        validate(&self.spec)?;
        Ok(self.spec.clone())
    }
}

impl AgentResource for v1alpha1::DatadogAgent {
    const API_VERSION: ApiVersion = ApiVersion::V1Alpha1;

    fn status(&self) -> Option<&DatadogAgentStatus> {
        self.status.as_ref()
    }

    fn normalized_spec(&self) -> Result<DatadogAgentSpec, ConfigTranslationError> {
        normalize_v1(&self.spec)
    }
}

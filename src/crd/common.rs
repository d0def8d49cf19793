//! # Shared CRD Types
//!
//! Types used by both the legacy (`v1alpha1`) and structured (`v2alpha1`) schemas.

use k8s_openapi::api::core::v1::{KeyToPath, LocalObjectReference};
use serde::{Deserialize, Serialize};

/// Reference to a key in an existing Secret
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretConfig {
    /// Name of the Secret
    pub secret_name: String,
    /// Key inside the Secret. Defaults to the controller's key name for the credential.
    #[serde(default)]
    pub key_name: Option<String>,
}

/// Configuration provided either inline or through a ConfigMap
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomConfig {
    /// Inline configuration content
    #[serde(default)]
    pub config_data: Option<String>,
    /// ConfigMap holding the configuration
    #[serde(default)]
    pub config_map: Option<ConfigMapConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapConfig {
    pub name: String,
    #[serde(default)]
    pub items: Option<Vec<KeyToPath>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostPortConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Host port to expose. Defaults to the protocol's standard port.
    #[serde(default)]
    pub port: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnixDomainSocketConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Absolute socket path on the host, also used as the mount path in the container
    #[serde(default)]
    pub path: Option<String>,
}

/// Container image selection
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentImageConfig {
    /// Image name, either short (`agent`) or fully qualified (`registry/agent:tag`)
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub pull_policy: Option<String>,
    #[serde(default)]
    pub pull_secrets: Option<Vec<LocalObjectReference>>,
}

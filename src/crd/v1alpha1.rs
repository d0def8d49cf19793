//! # DatadogAgent v1alpha1
//!
//! Legacy flat schema, organised by component. Still served so existing
//! manifests keep working; every object is translated into the `v2alpha1`
//! representation by [`crate::feature::normalize`] before use.

use crate::crd::common::{AgentImageConfig, CustomConfig, SecretConfig};
use k8s_openapi::api::core::v1::{EnvVar, Toleration};
use serde::{Deserialize, Serialize};

#[derive(
    kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema,
)]
#[kube(
    kind = "DatadogAgent",
    group = "datadoghq.com",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::DatadogAgentStatus",
    shortname = "dd"
)]
#[serde(rename_all = "camelCase")]
pub struct DatadogAgentSpec {
    #[serde(default)]
    pub credentials: Option<AgentCredentials>,
    /// Structured feature settings; take precedence over the per-component legacy fields
    #[serde(default)]
    pub features: Option<DatadogFeatures>,
    #[serde(default)]
    pub agent: Option<DatadogAgentSpecAgentSpec>,
    #[serde(default)]
    pub cluster_agent: Option<DatadogAgentSpecClusterAgentSpec>,
    #[serde(default)]
    pub cluster_checks_runner: Option<DatadogAgentSpecClusterChecksRunnerSpec>,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub registry: Option<String>,
    #[serde(default)]
    pub cluster_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentCredentials {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Name of an existing Secret holding the API key under `api_key` (legacy)
    #[serde(default)]
    pub api_key_existing_secret: Option<String>,
    #[serde(default)]
    pub api_secret: Option<SecretConfig>,
    #[serde(default)]
    pub app_key: Option<String>,
    /// Name of an existing Secret holding the application key under `app_key` (legacy)
    #[serde(default)]
    pub app_key_existing_secret: Option<String>,
    #[serde(default)]
    pub app_secret: Option<SecretConfig>,
    /// Cluster agent token
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatadogFeatures {
    #[serde(default)]
    pub log_collection: Option<LogCollectionConfig>,
    #[serde(default)]
    pub network_monitoring: Option<NetworkMonitoringConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogCollectionConfig {
    #[serde(default)]
    pub logs_enabled: Option<bool>,
    #[serde(default)]
    pub logs_config_container_collect_all: Option<bool>,
    #[serde(default)]
    pub container_collect_using_files: Option<bool>,
    #[serde(default)]
    pub container_logs_path: Option<String>,
    #[serde(default)]
    pub pod_logs_path: Option<String>,
    #[serde(default)]
    pub container_symlinks_path: Option<String>,
    #[serde(default)]
    pub temp_storage_path: Option<String>,
    #[serde(default)]
    pub open_files_limit: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMonitoringConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatadogAgentSpecAgentSpec {
    #[serde(default)]
    pub image: Option<AgentImageConfig>,
    #[serde(default)]
    pub env: Option<Vec<EnvVar>>,
    #[serde(default)]
    pub priority_class_name: Option<String>,
    #[serde(default)]
    pub config: Option<NodeAgentConfig>,
    #[serde(default)]
    pub apm: Option<ApmSpec>,
    /// Legacy log collection settings
    #[serde(default)]
    pub log: Option<LogCollectionConfig>,
    #[serde(default)]
    pub system_probe: Option<SystemProbeSpec>,
    #[serde(default)]
    pub security: Option<SecuritySpec>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeAgentConfig {
    /// DogStatsD UDP host port
    #[serde(default)]
    pub host_port: Option<i32>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub dogstatsd: Option<DogstatsdConfig>,
    #[serde(default)]
    pub tolerations: Option<Vec<Toleration>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DogstatsdConfig {
    #[serde(default)]
    pub dogstatsd_origin_detection: Option<bool>,
    #[serde(default)]
    pub unix_domain_socket: Option<DsdUnixDomainSocketSpec>,
    #[serde(default)]
    pub mapper_profiles: Option<CustomConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DsdUnixDomainSocketSpec {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub host_filepath: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApmSpec {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub host_port: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemProbeSpec {
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySpec {
    #[serde(default)]
    pub compliance: Option<ComplianceSpec>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSpec {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub check_interval: Option<String>,
    #[serde(default)]
    pub config_dir: Option<ConfigDirSpec>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDirSpec {
    pub config_map_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatadogAgentSpecClusterAgentSpec {
    /// The cluster agent is only deployed when explicitly enabled
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub image: Option<AgentImageConfig>,
    #[serde(default)]
    pub replicas: Option<i32>,
    #[serde(default)]
    pub config: Option<ClusterAgentConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAgentConfig {
    #[serde(default)]
    pub cluster_checks_enabled: Option<bool>,
    #[serde(default)]
    pub env: Option<Vec<EnvVar>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatadogAgentSpecClusterChecksRunnerSpec {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub image: Option<AgentImageConfig>,
    #[serde(default)]
    pub replicas: Option<i32>,
}

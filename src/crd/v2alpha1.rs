//! # DatadogAgent v2alpha1
//!
//! Structured schema, organised by feature. This is the storage version and the
//! internal representation every pass works on: legacy `v1alpha1` objects are
//! translated into this shape before any feature sees them.
//!
//! ```yaml
//! apiVersion: datadoghq.com/v2alpha1
//! kind: DatadogAgent
//! metadata:
//!   name: datadog
//! spec:
//!   global:
//!     credentials:
//!       apiSecret:
//!         secretName: datadog-secret
//!         keyName: api-key
//!   features:
//!     dogstatsd:
//!       unixDomainSocketConfig:
//!         enabled: true
//!   override:
//!     nodeAgent:
//!       containers:
//!         agent:
//!           logLevel: debug
//! ```

use crate::crd::common::{
    AgentImageConfig, CustomConfig, HostPortConfig, SecretConfig, UnixDomainSocketConfig,
};
use k8s_openapi::api::core::v1::{
    Affinity, ContainerPort, EnvVar, PodSecurityContext, Probe, ResourceRequirements,
    SecurityContext, Toleration, Volume, VolumeMount,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(
    kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema,
)]
#[kube(
    kind = "DatadogAgent",
    group = "datadoghq.com",
    version = "v2alpha1",
    namespaced,
    status = "crate::crd::DatadogAgentStatus",
    shortname = "dd",
    printcolumn = r#"{"name":"Agent", "type":"string", "jsonPath":".status.conditions[?(@.type==\"AgentReconcile\")].status"}, {"name":"Cluster-Agent", "type":"string", "jsonPath":".status.conditions[?(@.type==\"ClusterAgentReconcile\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DatadogAgentSpec {
    /// Features to enable on the agent fleet
    #[serde(default)]
    pub features: Option<DatadogFeatures>,
    /// Settings applied to every component
    #[serde(default)]
    pub global: Option<GlobalConfig>,
    /// Per-component overrides, applied last
    #[serde(default, rename = "override")]
    pub overrides: Option<DatadogAgentOverrides>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatadogFeatures {
    #[serde(default)]
    pub log_collection: Option<LogCollectionFeatureConfig>,
    #[serde(default)]
    pub dogstatsd: Option<DogstatsdFeatureConfig>,
    #[serde(default)]
    pub apm: Option<ApmFeatureConfig>,
    /// Network Performance Monitoring
    #[serde(default)]
    pub npm: Option<NpmFeatureConfig>,
    /// Cloud Security Posture Management (compliance checks)
    #[serde(default)]
    pub cspm: Option<CspmFeatureConfig>,
    #[serde(default)]
    pub cluster_checks: Option<ClusterChecksFeatureConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogCollectionFeatureConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Collect logs from every container, not only annotated ones
    #[serde(default)]
    pub container_collect_all: Option<bool>,
    /// Tail log files instead of using the container runtime API
    #[serde(default)]
    pub container_collect_using_files: Option<bool>,
    #[serde(default)]
    pub container_logs_path: Option<String>,
    #[serde(default)]
    pub pod_logs_path: Option<String>,
    #[serde(default)]
    pub container_symlinks_path: Option<String>,
    /// Host directory where the agent keeps its file pointers
    #[serde(default)]
    pub temp_storage_path: Option<String>,
    #[serde(default)]
    pub open_files_limit: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DogstatsdFeatureConfig {
    /// Tag metrics with the sending container's identity
    #[serde(default)]
    pub origin_detection_enabled: Option<bool>,
    /// UDP listener exposed on the host
    #[serde(default)]
    pub host_port_config: Option<HostPortConfig>,
    /// Unix domain socket listener shared through a host path
    #[serde(default)]
    pub unix_domain_socket_config: Option<UnixDomainSocketConfig>,
    /// Metric mapper profiles, YAML
    #[serde(default)]
    pub mapper_profiles: Option<CustomConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApmFeatureConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub host_port_config: Option<HostPortConfig>,
    #[serde(default)]
    pub unix_domain_socket_config: Option<UnixDomainSocketConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NpmFeatureConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CspmFeatureConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Interval between compliance runs, as a Go-style duration (`20m`)
    #[serde(default)]
    pub check_interval: Option<String>,
    /// Custom benchmarks, mounted over the default compliance configuration
    #[serde(default)]
    pub custom_benchmarks: Option<CustomConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterChecksFeatureConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Dispatch cluster checks to dedicated runners instead of node agents
    #[serde(default)]
    pub use_cluster_checks_runners: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    #[serde(default)]
    pub credentials: Option<DatadogCredentials>,
    /// Token shared between node agents and the cluster agent.
    /// Generated and persisted in status when unset.
    #[serde(default)]
    pub cluster_agent_token: Option<String>,
    /// Datadog intake site, e.g. `datadoghq.eu`
    #[serde(default)]
    pub site: Option<String>,
    /// Registry prefix applied to every default image
    #[serde(default)]
    pub registry: Option<String>,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub node_selector: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub tolerations: Option<Vec<Toleration>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatadogCredentials {
    /// Inline API key; stored in the controller-managed Secret
    #[serde(default)]
    pub api_key: Option<String>,
    /// Existing Secret holding the API key
    #[serde(default)]
    pub api_secret: Option<SecretConfig>,
    #[serde(default)]
    pub app_key: Option<String>,
    #[serde(default)]
    pub app_secret: Option<SecretConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatadogAgentOverrides {
    #[serde(default)]
    pub node_agent: Option<DatadogAgentComponentOverride>,
    #[serde(default)]
    pub cluster_agent: Option<DatadogAgentComponentOverride>,
    #[serde(default)]
    pub cluster_checks_runner: Option<DatadogAgentComponentOverride>,
}

/// Structural patch over one component's generated object
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatadogAgentComponentOverride {
    /// Name of the generated DaemonSet/Deployment
    #[serde(default)]
    pub name: Option<String>,
    /// Replicas; ignored for the node agent DaemonSet
    #[serde(default)]
    pub replicas: Option<i32>,
    #[serde(default)]
    pub image: Option<AgentImageConfig>,
    /// Env vars added to every container of the component
    #[serde(default)]
    pub env: Option<Vec<EnvVar>>,
    #[serde(default)]
    pub service_account_name: Option<String>,
    #[serde(default)]
    pub priority_class_name: Option<String>,
    #[serde(default)]
    pub node_selector: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub tolerations: Option<Vec<Toleration>>,
    #[serde(default)]
    pub affinity: Option<Affinity>,
    /// Pod labels
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    /// Pod annotations
    #[serde(default)]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub security_context: Option<PodSecurityContext>,
    #[serde(default)]
    pub volumes: Option<Vec<Volume>>,
    /// Container-level overrides keyed by container name
    #[serde(default)]
    pub containers: Option<BTreeMap<String, DatadogAgentGenericContainer>>,
    /// Do not deploy this component
    #[serde(default)]
    pub disabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatadogAgentGenericContainer {
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub env: Option<Vec<EnvVar>>,
    #[serde(default)]
    pub volume_mounts: Option<Vec<VolumeMount>>,
    #[serde(default)]
    pub ports: Option<Vec<ContainerPort>>,
    #[serde(default)]
    pub resources: Option<ResourceRequirements>,
    #[serde(default)]
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub readiness_probe: Option<Probe>,
    #[serde(default)]
    pub liveness_probe: Option<Probe>,
    #[serde(default)]
    pub security_context: Option<SecurityContext>,
}

impl DatadogAgentSpec {
    /// Override for `component`, if any
    #[must_use]
    pub fn component_override(
        &self,
        component: crate::component::ComponentName,
    ) -> Option<&DatadogAgentComponentOverride> {
        use crate::component::ComponentName;
        let overrides = self.overrides.as_ref()?;
        match component {
            ComponentName::NodeAgent => overrides.node_agent.as_ref(),
            ComponentName::ClusterAgent => overrides.cluster_agent.as_ref(),
            ComponentName::ClusterChecksRunner => overrides.cluster_checks_runner.as_ref(),
        }
    }

    /// Whether the cluster agent is deployed. It is unless its override disables it.
    #[must_use]
    pub fn cluster_agent_enabled(&self) -> bool {
        self.component_enabled(crate::component::ComponentName::ClusterAgent)
    }

    #[must_use]
    pub fn component_enabled(&self, component: crate::component::ComponentName) -> bool {
        use crate::component::ComponentName;
        let disabled = self
            .component_override(component)
            .and_then(|o| o.disabled)
            .unwrap_or(false);
        if disabled {
            return false;
        }
        match component {
            ComponentName::NodeAgent | ComponentName::ClusterAgent => true,
            ComponentName::ClusterChecksRunner => {
                self.cluster_agent_enabled()
                    && self
                        .features
                        .as_ref()
                        .and_then(|f| f.cluster_checks.as_ref())
                        .is_some_and(|cc| {
                            cc.enabled.unwrap_or(false)
                                && cc.use_cluster_checks_runners.unwrap_or(false)
                        })
            }
        }
    }
}

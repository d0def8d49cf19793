//! # Components
//!
//! The three workloads derived from a `DatadogAgent`:
//!
//! - node agent - DaemonSet `<name>-agent`
//! - cluster agent - Deployment `<name>-cluster-agent`
//! - cluster checks runner - Deployment `<name>-cluster-checks-runner`
//!
//! Each pass starts a component from a default [`ComponentDraft`]; features,
//! global settings and overrides then mutate the draft before it is turned
//! into the desired workload.

mod agent;
mod checks_runner;
mod cluster_agent;

use crate::constants::{
    DEFAULT_AGENT_IMAGE_NAME, DEFAULT_AGENT_IMAGE_TAG, DEFAULT_REGISTRY, LABEL_COMPONENT,
    LABEL_INSTANCE, LABEL_MANAGED_BY, LABEL_NAME, MANAGED_BY_VALUE,
};
use crate::controller::snapshot::AgentMeta;
use crate::crd::ConditionType;
use crate::template::PodTemplateManager;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentName {
    NodeAgent,
    ClusterAgent,
    ClusterChecksRunner,
}

impl ComponentName {
    /// Convergence order within a pass
    pub const ALL: [Self; 3] = [Self::NodeAgent, Self::ClusterAgent, Self::ClusterChecksRunner];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NodeAgent => "nodeAgent",
            Self::ClusterAgent => "clusterAgent",
            Self::ClusterChecksRunner => "clusterChecksRunner",
        }
    }

    /// Suffix of the generated object name and value of the component label
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::NodeAgent => "agent",
            Self::ClusterAgent => "cluster-agent",
            Self::ClusterChecksRunner => "cluster-checks-runner",
        }
    }

    #[must_use]
    pub fn condition_type(self) -> ConditionType {
        match self {
            Self::NodeAgent => ConditionType::AgentReconcile,
            Self::ClusterAgent => ConditionType::ClusterAgentReconcile,
            Self::ClusterChecksRunner => ConditionType::ClusterChecksRunnerReconcile,
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A component being assembled during a pass
#[derive(Debug, Clone)]
pub struct ComponentDraft {
    pub component: ComponentName,
    /// Name of the generated workload
    pub name: String,
    /// Replica count; only meaningful for Deployments
    pub replicas: Option<i32>,
    pub manager: PodTemplateManager,
}

/// Desired workload produced at the end of a component's pass
#[derive(Debug, Clone, PartialEq)]
pub enum DesiredWorkload {
    DaemonSet(DaemonSet),
    Deployment(Deployment),
}

impl ComponentDraft {
    /// Default draft for `component`, including the sidecar containers the enabled
    /// features require
    #[must_use]
    pub fn new(meta: &AgentMeta, component: ComponentName, extra_containers: &[&str]) -> Self {
        let template = match component {
            ComponentName::NodeAgent => agent::default_pod_template(meta, extra_containers),
            ComponentName::ClusterAgent => cluster_agent::default_pod_template(meta),
            ComponentName::ClusterChecksRunner => checks_runner::default_pod_template(meta),
        };
        let replicas = match component {
            ComponentName::NodeAgent => None,
            ComponentName::ClusterAgent | ComponentName::ClusterChecksRunner => Some(1),
        };
        Self {
            component,
            name: default_name(&meta.name, component),
            replicas,
            manager: PodTemplateManager::new(template),
        }
    }

    #[must_use]
    pub fn into_workload(self, meta: &AgentMeta) -> DesiredWorkload {
        let object_meta = ObjectMeta {
            name: Some(self.name),
            namespace: Some(meta.namespace.clone()),
            labels: Some(base_labels(&meta.name, self.component)),
            owner_references: owner_reference(meta).map(|o| vec![o]),
            ..Default::default()
        };
        let selector = selector_labels(&meta.name, self.component);
        let template = self.manager.into_pod_template();
        match self.component {
            ComponentName::NodeAgent => {
                DesiredWorkload::DaemonSet(agent::daemonset(object_meta, template, selector))
            }
            ComponentName::ClusterAgent | ComponentName::ClusterChecksRunner => {
                DesiredWorkload::Deployment(cluster_agent::deployment(
                    object_meta,
                    template,
                    self.replicas,
                    selector,
                ))
            }
        }
    }
}

#[must_use]
pub fn default_name(instance: &str, component: ComponentName) -> String {
    format!("{instance}-{}", component.suffix())
}

/// Labels stamped on every object and pod of a component
#[must_use]
pub fn base_labels(instance: &str, component: ComponentName) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), "datadog-agent".to_string()),
        (LABEL_INSTANCE.to_string(), instance.to_string()),
        (LABEL_COMPONENT.to_string(), component.suffix().to_string()),
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string()),
    ])
}

/// Labels selecting a component's pods
#[must_use]
pub fn selector_labels(instance: &str, component: ComponentName) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_INSTANCE.to_string(), instance.to_string()),
        (LABEL_COMPONENT.to_string(), component.suffix().to_string()),
    ])
}

/// Owner reference to the `DatadogAgent`; absent until the object has a UID
#[must_use]
pub fn owner_reference(meta: &AgentMeta) -> Option<OwnerReference> {
    let uid = meta.uid.clone()?;
    Some(OwnerReference {
        api_version: format!("datadoghq.com/{}", meta.api_version.as_str()),
        kind: "DatadogAgent".to_string(),
        name: meta.name.clone(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}

pub(crate) fn default_agent_image() -> String {
    format!("{DEFAULT_REGISTRY}/{DEFAULT_AGENT_IMAGE_NAME}:{DEFAULT_AGENT_IMAGE_TAG}")
}

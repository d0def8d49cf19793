//! Cluster agent Deployment defaults. The Deployment builder is shared with the
//! cluster checks runner.

use super::{base_labels, ComponentName};
use crate::constants::{
    CLUSTER_AGENT_CONTAINER, DEFAULT_CLUSTER_AGENT_IMAGE_NAME, DEFAULT_CLUSTER_AGENT_IMAGE_TAG,
    DEFAULT_REGISTRY,
};
use crate::controller::snapshot::AgentMeta;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

/// Port the node agents use to reach the cluster agent
const CLUSTER_AGENT_CMD_PORT: i32 = 5005;

pub(super) fn default_pod_template(meta: &AgentMeta) -> PodTemplateSpec {
    let image = format!(
        "{DEFAULT_REGISTRY}/{DEFAULT_CLUSTER_AGENT_IMAGE_NAME}:{DEFAULT_CLUSTER_AGENT_IMAGE_TAG}"
    );
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(base_labels(&meta.name, ComponentName::ClusterAgent)),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![Container {
                name: CLUSTER_AGENT_CONTAINER.to_string(),
                image: Some(image),
                ports: Some(vec![ContainerPort {
                    name: Some("agentport".to_string()),
                    container_port: CLUSTER_AGENT_CMD_PORT,
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }],
            ..Default::default()
        }),
    }
}

pub(super) fn deployment(
    metadata: ObjectMeta,
    template: PodTemplateSpec,
    replicas: Option<i32>,
    selector: BTreeMap<String, String>,
) -> Deployment {
    Deployment {
        metadata,
        spec: Some(DeploymentSpec {
            replicas,
            selector: LabelSelector {
                match_labels: Some(selector),
                ..Default::default()
            },
            template,
            ..Default::default()
        }),
        status: None,
    }
}

//! Cluster checks runner Deployment defaults.

use super::{base_labels, default_agent_image, ComponentName};
use crate::constants::CLUSTER_CHECKS_RUNNER_CONTAINER;
use crate::controller::snapshot::AgentMeta;
use crate::template::env_var;
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

pub(super) fn default_pod_template(meta: &AgentMeta) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(base_labels(&meta.name, ComponentName::ClusterChecksRunner)),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![Container {
                name: CLUSTER_CHECKS_RUNNER_CONTAINER.to_string(),
                image: Some(default_agent_image()),
                command: Some(vec!["agent".to_string(), "run".to_string()]),
                // Runners only execute dispatched checks
                env: Some(vec![
                    env_var("DD_ENABLE_METADATA_COLLECTION", "false"),
                    env_var("DD_HEALTH_PORT", "5555"),
                ]),
                ..Default::default()
            }],
            ..Default::default()
        }),
    }
}

//! Node agent DaemonSet defaults.

use super::{base_labels, default_agent_image, ComponentName};
use crate::constants::{
    CORE_AGENT_CONTAINER, PROCESS_AGENT_CONTAINER, SECURITY_AGENT_CONTAINER,
    SYSTEM_PROBE_CONTAINER, TRACE_AGENT_CONTAINER,
};
use crate::controller::snapshot::AgentMeta;
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, ObjectFieldSelector, PodSpec, PodTemplateSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

/// Sidecars in the order they appear in the pod, with their entrypoint
const SIDECARS: [(&str, &str); 4] = [
    (TRACE_AGENT_CONTAINER, "trace-agent"),
    (PROCESS_AGENT_CONTAINER, "process-agent"),
    (SYSTEM_PROBE_CONTAINER, "system-probe"),
    (SECURITY_AGENT_CONTAINER, "security-agent"),
];

pub(super) fn default_pod_template(meta: &AgentMeta, extra_containers: &[&str]) -> PodTemplateSpec {
    let image = default_agent_image();
    let mut containers = vec![Container {
        name: CORE_AGENT_CONTAINER.to_string(),
        image: Some(image.clone()),
        command: Some(vec!["agent".to_string(), "run".to_string()]),
        env: Some(vec![EnvVar {
            name: "DD_KUBERNETES_KUBELET_HOST".to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: "status.hostIP".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        ..Default::default()
    }];

    for (name, binary) in SIDECARS {
        if extra_containers.contains(&name) {
            containers.push(Container {
                name: name.to_string(),
                image: Some(image.clone()),
                command: Some(vec![binary.to_string()]),
                ..Default::default()
            });
        }
    }

    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(base_labels(&meta.name, ComponentName::NodeAgent)),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers,
            ..Default::default()
        }),
    }
}

pub(super) fn daemonset(
    metadata: ObjectMeta,
    template: PodTemplateSpec,
    selector: BTreeMap<String, String>,
) -> DaemonSet {
    DaemonSet {
        metadata,
        spec: Some(DaemonSetSpec {
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

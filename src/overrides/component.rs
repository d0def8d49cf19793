//! Per-component override.
//!
//! The override is applied to a copy of the template. The copy replaces the
//! draft's template only once every container reference and volume mount has
//! been validated, so a malformed override never leaves a partial result.

use crate::component::{ComponentDraft, ComponentName};
use crate::constants::{
    DD_LOG_LEVEL, DEFAULT_AGENT_IMAGE_NAME, DEFAULT_AGENT_IMAGE_TAG,
    DEFAULT_CLUSTER_AGENT_IMAGE_NAME, DEFAULT_CLUSTER_AGENT_IMAGE_TAG, DEFAULT_REGISTRY,
};
use crate::crd::common::AgentImageConfig;
use crate::crd::v2alpha1::{DatadogAgentComponentOverride, DatadogAgentGenericContainer};
use crate::error::OverrideError;
use crate::template::env_var;
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Apply `ov` to `draft`. `registry` is the global registry, used when the
/// override names an image without one.
pub fn apply_override(
    draft: &mut ComponentDraft,
    ov: &DatadogAgentComponentOverride,
    registry: Option<&str>,
) -> Result<(), OverrideError> {
    let component = draft.component;
    let mut template = draft.manager.pod_template().clone();

    patch_metadata(&mut template, ov);
    let pod = template.spec.get_or_insert_with(PodSpec::default);
    patch_pod(pod, component, ov, registry);
    if let Some(containers) = &ov.containers {
        for (name, container_ov) in containers {
            let container = pod
                .containers
                .iter_mut()
                .find(|c| &c.name == name)
                .ok_or_else(|| OverrideError::UnknownContainer {
                    component: component.as_str().to_string(),
                    container: name.clone(),
                })?;
            patch_container(container, container_ov);
        }
    }
    validate_mounts(pod)?;

    *draft.manager.template_mut() = template;
    if let Some(name) = ov.name.as_ref().filter(|n| !n.is_empty()) {
        draft.name.clone_from(name);
    }
    if component != ComponentName::NodeAgent && ov.replicas.is_some() {
        draft.replicas = ov.replicas;
    }
    debug!(component = %component, "Applied component override");
    Ok(())
}

fn patch_metadata(template: &mut PodTemplateSpec, ov: &DatadogAgentComponentOverride) {
    let meta = template.metadata.get_or_insert_with(Default::default);
    if let Some(labels) = &ov.labels {
        meta.labels
            .get_or_insert_with(BTreeMap::new)
            .extend(labels.clone());
    }
    if let Some(annotations) = &ov.annotations {
        meta.annotations
            .get_or_insert_with(BTreeMap::new)
            .extend(annotations.clone());
    }
}

fn patch_pod(
    pod: &mut PodSpec,
    component: ComponentName,
    ov: &DatadogAgentComponentOverride,
    registry: Option<&str>,
) {
    if let Some(image) = &ov.image {
        let resolved = resolve_image(component, image, registry);
        for container in &mut pod.containers {
            container.image = Some(resolved.clone());
            if image.pull_policy.is_some() {
                container.image_pull_policy.clone_from(&image.pull_policy);
            }
        }
        if image.pull_secrets.is_some() {
            pod.image_pull_secrets.clone_from(&image.pull_secrets);
        }
    }
    if let Some(env) = &ov.env {
        for container in &mut pod.containers {
            merge_by_name(container.env.get_or_insert_with(Vec::new), env, |e| {
                e.name.clone()
            });
        }
    }
    if let Some(volumes) = &ov.volumes {
        merge_by_name(pod.volumes.get_or_insert_with(Vec::new), volumes, |v| {
            v.name.clone()
        });
    }

    replace_if_set(&mut pod.service_account_name, ov.service_account_name.as_ref());
    replace_if_set(&mut pod.priority_class_name, ov.priority_class_name.as_ref());
    replace_if_set(&mut pod.node_selector, ov.node_selector.as_ref());
    replace_if_set(&mut pod.tolerations, ov.tolerations.as_ref());
    replace_if_set(&mut pod.affinity, ov.affinity.as_ref());
    replace_if_set(&mut pod.security_context, ov.security_context.as_ref());
}

fn patch_container(container: &mut Container, ov: &DatadogAgentGenericContainer) {
    if let Some(level) = &ov.log_level {
        merge_by_name(
            container.env.get_or_insert_with(Vec::new),
            &[env_var(DD_LOG_LEVEL, level.as_str())],
            |e| e.name.clone(),
        );
    }
    if let Some(env) = &ov.env {
        merge_by_name(container.env.get_or_insert_with(Vec::new), env, |e| {
            e.name.clone()
        });
    }
    if let Some(mounts) = &ov.volume_mounts {
        merge_by_name(
            container.volume_mounts.get_or_insert_with(Vec::new),
            mounts,
            |m| m.name.clone(),
        );
    }
    if let Some(ports) = &ov.ports {
        merge_by_name(container.ports.get_or_insert_with(Vec::new), ports, port_key);
    }

    replace_if_set(&mut container.resources, ov.resources.as_ref());
    replace_if_set(&mut container.command, ov.command.as_ref());
    replace_if_set(&mut container.args, ov.args.as_ref());
    replace_if_set(&mut container.readiness_probe, ov.readiness_probe.as_ref());
    replace_if_set(&mut container.liveness_probe, ov.liveness_probe.as_ref());
    replace_if_set(&mut container.security_context, ov.security_context.as_ref());
}

/// Every mount must name a volume of the pod
fn validate_mounts(pod: &PodSpec) -> Result<(), OverrideError> {
    let volumes: HashSet<&str> = pod
        .volumes
        .iter()
        .flatten()
        .map(|v| v.name.as_str())
        .collect();
    let containers = pod.containers.iter().chain(pod.init_containers.iter().flatten());
    for container in containers {
        for mount in container.volume_mounts.iter().flatten() {
            if !volumes.contains(mount.name.as_str()) {
                return Err(OverrideError::MissingVolume {
                    container: container.name.clone(),
                    mount: mount.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Resolve an override image.
///
/// A name containing `/` is taken as fully qualified and only gets `tag`
/// appended when it carries none. A short name is prefixed with `registry`
/// (or the default registry) and suffixed with `tag` (or the component's
/// default tag).
#[must_use]
pub fn resolve_image(
    component: ComponentName,
    image: &AgentImageConfig,
    registry: Option<&str>,
) -> String {
    let (default_name, default_tag) = match component {
        ComponentName::ClusterAgent => (DEFAULT_CLUSTER_AGENT_IMAGE_NAME, DEFAULT_CLUSTER_AGENT_IMAGE_TAG),
        ComponentName::NodeAgent | ComponentName::ClusterChecksRunner => {
            (DEFAULT_AGENT_IMAGE_NAME, DEFAULT_AGENT_IMAGE_TAG)
        }
    };
    let name = image
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or(default_name);
    let tag = image.tag.as_deref().filter(|t| !t.is_empty());

    if name.contains('/') {
        let last_segment = name.rsplit('/').next().unwrap_or(name);
        return match tag {
            Some(tag) if !last_segment.contains(':') && !last_segment.contains('@') => {
                format!("{name}:{tag}")
            }
            _ => name.to_string(),
        };
    }

    let registry = registry
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REGISTRY)
        .trim_end_matches('/');
    if name.contains(':') {
        return format!("{registry}/{name}");
    }
    format!("{registry}/{name}:{}", tag.unwrap_or(default_tag))
}

/// Replace entries with the same key in place, append the rest in order
fn merge_by_name<T, F>(entries: &mut Vec<T>, patch: &[T], key: F)
where
    T: Clone,
    F: Fn(&T) -> String,
{
    for item in patch {
        let k = key(item);
        match entries.iter_mut().find(|e| key(e) == k) {
            Some(existing) => *existing = item.clone(),
            None => entries.push(item.clone()),
        }
    }
}

fn port_key(port: &ContainerPort) -> String {
    port.name.clone().unwrap_or_else(|| {
        format!(
            "{}/{}",
            port.container_port,
            port.protocol.as_deref().unwrap_or("TCP")
        )
    })
}

fn replace_if_set<T: Clone>(target: &mut Option<T>, value: Option<&T>) {
    if let Some(v) = value {
        *target = Some(v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::snapshot::AgentMeta;
    use crate::crd::ApiVersion;
    use crate::template::{host_path_volume, volume_mount};
    use k8s_openapi::api::core::v1::{EnvVar, VolumeMount};

    fn meta() -> AgentMeta {
        AgentMeta {
            name: "datadog".to_string(),
            namespace: "monitoring".to_string(),
            uid: None,
            generation: Some(1),
            api_version: ApiVersion::V2Alpha1,
        }
    }

    fn pod(draft: &ComponentDraft) -> &PodSpec {
        draft.manager.pod_template().spec.as_ref().unwrap()
    }

    fn container<'a>(draft: &'a ComponentDraft, name: &str) -> &'a Container {
        pod(draft).containers.iter().find(|c| c.name == name).unwrap()
    }

    fn env_names(c: &Container) -> Vec<&str> {
        c.env.iter().flatten().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_env_cascades_to_every_container_after_existing_entries() {
        let mut draft = ComponentDraft::new(&meta(), ComponentName::NodeAgent, &["trace-agent"]);
        draft
            .manager
            .add_env_var("agent", env_var("DD_LOGS_ENABLED", "true"))
            .unwrap();
        let ov = DatadogAgentComponentOverride {
            env: Some(vec![env_var("DD_B", "b"), env_var("DD_A", "a")]),
            ..Default::default()
        };
        apply_override(&mut draft, &ov, None).unwrap();

        assert_eq!(
            env_names(container(&draft, "agent")),
            vec!["DD_KUBERNETES_KUBELET_HOST", "DD_LOGS_ENABLED", "DD_B", "DD_A"]
        );
        assert_eq!(env_names(container(&draft, "trace-agent")), vec!["DD_B", "DD_A"]);
    }

    #[test]
    fn test_override_wins_over_derived_value() {
        let mut draft = ComponentDraft::new(&meta(), ComponentName::NodeAgent, &[]);
        draft
            .manager
            .add_env_var("agent", env_var(DD_LOG_LEVEL, "info"))
            .unwrap();
        let ov = DatadogAgentComponentOverride {
            containers: Some(BTreeMap::from([(
                "agent".to_string(),
                DatadogAgentGenericContainer {
                    log_level: Some("debug".to_string()),
                    ..Default::default()
                },
            )])),
            ..Default::default()
        };
        apply_override(&mut draft, &ov, None).unwrap();

        let env: Vec<&EnvVar> = container(&draft, "agent")
            .env
            .iter()
            .flatten()
            .filter(|e| e.name == DD_LOG_LEVEL)
            .collect();
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].value.as_deref(), Some("debug"));
    }

    #[test]
    fn test_unknown_container_leaves_draft_untouched() {
        let mut draft = ComponentDraft::new(&meta(), ComponentName::ClusterAgent, &[]);
        let before = draft.manager.pod_template().clone();
        let ov = DatadogAgentComponentOverride {
            name: Some("renamed".to_string()),
            env: Some(vec![env_var("DD_A", "a")]),
            containers: Some(BTreeMap::from([(
                "sidecar".to_string(),
                DatadogAgentGenericContainer::default(),
            )])),
            ..Default::default()
        };
        let err = apply_override(&mut draft, &ov, None).unwrap_err();
        assert_eq!(
            err,
            OverrideError::UnknownContainer {
                component: "clusterAgent".to_string(),
                container: "sidecar".to_string(),
            }
        );
        assert_eq!(draft.manager.pod_template(), &before);
        assert_eq!(draft.name, "datadog-cluster-agent");
    }

    #[test]
    fn test_mount_without_volume_is_rejected() {
        let mut draft = ComponentDraft::new(&meta(), ComponentName::NodeAgent, &[]);
        let ov = DatadogAgentComponentOverride {
            containers: Some(BTreeMap::from([(
                "agent".to_string(),
                DatadogAgentGenericContainer {
                    volume_mounts: Some(vec![volume_mount("extra", "/extra", true)]),
                    ..Default::default()
                },
            )])),
            ..Default::default()
        };
        let err = apply_override(&mut draft, &ov, None).unwrap_err();
        assert_eq!(
            err,
            OverrideError::MissingVolume {
                container: "agent".to_string(),
                mount: "extra".to_string(),
            }
        );

        let ov = DatadogAgentComponentOverride {
            volumes: Some(vec![host_path_volume("extra", "/extra")]),
            ..ov
        };
        apply_override(&mut draft, &ov, None).unwrap();
        let mounts: &Vec<VolumeMount> = container(&draft, "agent").volume_mounts.as_ref().unwrap();
        assert_eq!(mounts[0].name, "extra");
    }

    #[test]
    fn test_volume_replaced_by_name() {
        let mut draft = ComponentDraft::new(&meta(), ComponentName::NodeAgent, &[]);
        draft.manager.add_volume(host_path_volume("logs", "/var/log")).unwrap();
        draft.manager.add_volume(host_path_volume("proc", "/proc")).unwrap();
        let ov = DatadogAgentComponentOverride {
            volumes: Some(vec![host_path_volume("logs", "/custom/log")]),
            ..Default::default()
        };
        apply_override(&mut draft, &ov, None).unwrap();

        let volumes = pod(&draft).volumes.as_ref().unwrap();
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[0].name, "logs");
        assert_eq!(volumes[0].host_path.as_ref().unwrap().path, "/custom/log");
    }

    #[test]
    fn test_name_replicas_and_pod_fields() {
        let mut draft = ComponentDraft::new(&meta(), ComponentName::ClusterAgent, &[]);
        let ov = DatadogAgentComponentOverride {
            name: Some("dca".to_string()),
            replicas: Some(3),
            priority_class_name: Some("high".to_string()),
            labels: Some(BTreeMap::from([("team".to_string(), "infra".to_string())])),
            ..Default::default()
        };
        apply_override(&mut draft, &ov, None).unwrap();
        assert_eq!(draft.name, "dca");
        assert_eq!(draft.replicas, Some(3));
        assert_eq!(pod(&draft).priority_class_name.as_deref(), Some("high"));
        let labels = draft
            .manager
            .pod_template()
            .metadata
            .as_ref()
            .unwrap()
            .labels
            .as_ref()
            .unwrap();
        assert_eq!(labels.get("team").map(String::as_str), Some("infra"));
        assert_eq!(
            labels.get("app.kubernetes.io/instance").map(String::as_str),
            Some("datadog")
        );
    }

    #[test]
    fn test_replicas_ignored_for_node_agent() {
        let mut draft = ComponentDraft::new(&meta(), ComponentName::NodeAgent, &[]);
        let ov = DatadogAgentComponentOverride {
            replicas: Some(3),
            ..Default::default()
        };
        apply_override(&mut draft, &ov, None).unwrap();
        assert_eq!(draft.replicas, None);
    }

    #[test]
    fn test_resolve_image() {
        let image = |name: Option<&str>, tag: Option<&str>| AgentImageConfig {
            name: name.map(str::to_string),
            tag: tag.map(str::to_string),
            ..Default::default()
        };

        assert_eq!(
            resolve_image(ComponentName::NodeAgent, &image(None, Some("7.41.0")), None),
            "gcr.io/datadoghq/agent:7.41.0"
        );
        assert_eq!(
            resolve_image(ComponentName::ClusterAgent, &image(None, None), Some("public.ecr.aws/datadog")),
            "public.ecr.aws/datadog/cluster-agent:1.24.0"
        );
        assert_eq!(
            resolve_image(
                ComponentName::NodeAgent,
                &image(Some("docker.io/datadog/agent:latest"), Some("7.41.0")),
                None
            ),
            "docker.io/datadog/agent:latest"
        );
        assert_eq!(
            resolve_image(
                ComponentName::NodeAgent,
                &image(Some("localhost:5000/agent"), Some("dev")),
                None
            ),
            "localhost:5000/agent:dev"
        );
        assert_eq!(
            resolve_image(ComponentName::ClusterChecksRunner, &image(Some("agent:7-jmx"), None), None),
            "gcr.io/datadoghq/agent:7-jmx"
        );
    }

    #[test]
    fn test_image_applies_to_every_container() {
        let mut draft = ComponentDraft::new(&meta(), ComponentName::NodeAgent, &["process-agent"]);
        let ov = DatadogAgentComponentOverride {
            image: Some(AgentImageConfig {
                tag: Some("7.41.0".to_string()),
                pull_policy: Some("Always".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        apply_override(&mut draft, &ov, Some("registry.example.com")).unwrap();
        for c in &pod(&draft).containers {
            assert_eq!(c.image.as_deref(), Some("registry.example.com/agent:7.41.0"));
            assert_eq!(c.image_pull_policy.as_deref(), Some("Always"));
        }
    }
}

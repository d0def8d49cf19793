//! Global settings layer.

use crate::component::ComponentName;
use crate::constants::{
    DD_API_KEY, DD_APP_KEY, DD_CLUSTER_AGENT_AUTH_TOKEN, DD_CLUSTER_NAME, DD_LOG_LEVEL, DD_SITE,
    DD_TAGS, DEFAULT_REGISTRY,
};
use crate::controller::secret::CredentialRefs;
use crate::crd::v2alpha1::DatadogAgentSpec;
use crate::error::OverrideError;
use crate::template::{env_var, PodTemplateManager};
use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, SecretKeySelector};
use tracing::debug;

/// Apply `spec.global` to one component's template
pub fn apply_global(
    spec: &DatadogAgentSpec,
    component: ComponentName,
    manager: &mut PodTemplateManager,
    refs: &CredentialRefs,
) -> Result<(), OverrideError> {
    let mut env = Vec::new();

    if let Some(api_key) = &refs.api_key {
        env.push(secret_env(DD_API_KEY, api_key));
    }
    if component == ComponentName::ClusterAgent {
        if let Some(app_key) = &refs.app_key {
            env.push(secret_env(DD_APP_KEY, app_key));
        }
    }
    if spec.cluster_agent_enabled() {
        if let Some(token) = &refs.token {
            env.push(secret_env(DD_CLUSTER_AGENT_AUTH_TOKEN, token));
        }
    }

    let global = spec.global.clone().unwrap_or_default();
    if let Some(site) = global.site.filter(|s| !s.is_empty()) {
        env.push(env_var(DD_SITE, site));
    }
    if let Some(cluster_name) = global.cluster_name.filter(|s| !s.is_empty()) {
        env.push(env_var(DD_CLUSTER_NAME, cluster_name));
    }
    if let Some(level) = global.log_level.filter(|s| !s.is_empty()) {
        env.push(env_var(DD_LOG_LEVEL, level));
    }
    if let Some(tags) = global.tags.filter(|t| !t.is_empty()) {
        env.push(env_var(DD_TAGS, tags.join(" ")));
    }

    for container in manager.container_names() {
        for var in &env {
            manager
                .add_env_var(&container, var.clone())
                .map_err(|e| OverrideError::from_template(component.as_str(), e))?;
        }
    }

    let Some(pod) = manager.template_mut().spec.as_mut() else {
        return Ok(());
    };
    if let Some(registry) = global.registry.filter(|r| !r.is_empty()) {
        let inits = pod.init_containers.iter_mut().flatten();
        for container in pod.containers.iter_mut().chain(inits) {
            let rewritten = container.image.as_deref().and_then(|image| {
                image
                    .strip_prefix(DEFAULT_REGISTRY)
                    .and_then(|rest| rest.strip_prefix('/'))
                    .map(|rest| format!("{}/{rest}", registry.trim_end_matches('/')))
            });
            if rewritten.is_some() {
                container.image = rewritten;
            }
        }
        debug!(component = %component, registry = %registry, "Rewrote default image registry");
    }
    if global.node_selector.is_some() {
        pod.node_selector = global.node_selector;
    }
    if global.tolerations.is_some() {
        pod.tolerations = global.tolerations;
    }
    Ok(())
}

fn secret_env(name: &str, selector: &SecretKeySelector) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(selector.clone()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::v2alpha1::{DatadogAgentComponentOverride, DatadogAgentOverrides, GlobalConfig};
    use crate::error::{ConflictError, EntryKind};
    use crate::feature::test_support::{env_value, manager};
    use k8s_openapi::api::core::v1::{Container, Toleration};
    use std::collections::BTreeMap;

    fn selector(key: &str) -> SecretKeySelector {
        SecretKeySelector {
            name: "datadog".to_string(),
            key: key.to_string(),
            optional: None,
        }
    }

    fn refs() -> CredentialRefs {
        CredentialRefs {
            api_key: Some(selector("api_key")),
            app_key: Some(selector("app_key")),
            token: Some(selector("token")),
        }
    }

    fn env_names(mgr: &PodTemplateManager, container: &str) -> Vec<String> {
        mgr.pod_template()
            .spec
            .as_ref()
            .unwrap()
            .containers
            .iter()
            .find(|c| c.name == container)
            .and_then(|c| c.env.as_ref())
            .map(|env| env.iter().map(|e| e.name.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_credentials_wiring_per_component() {
        let spec = DatadogAgentSpec::default();

        let mut node = manager(&["agent", "trace-agent"]);
        apply_global(&spec, ComponentName::NodeAgent, &mut node, &refs()).unwrap();
        assert_eq!(env_names(&node, "agent"), vec![DD_API_KEY, DD_CLUSTER_AGENT_AUTH_TOKEN]);
        assert_eq!(
            env_names(&node, "trace-agent"),
            vec![DD_API_KEY, DD_CLUSTER_AGENT_AUTH_TOKEN]
        );

        let mut dca = manager(&["cluster-agent"]);
        apply_global(&spec, ComponentName::ClusterAgent, &mut dca, &refs()).unwrap();
        assert_eq!(
            env_names(&dca, "cluster-agent"),
            vec![DD_API_KEY, DD_APP_KEY, DD_CLUSTER_AGENT_AUTH_TOKEN]
        );
    }

    #[test]
    fn test_no_token_without_cluster_agent() {
        let spec = DatadogAgentSpec {
            overrides: Some(DatadogAgentOverrides {
                cluster_agent: Some(DatadogAgentComponentOverride {
                    disabled: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut node = manager(&["agent"]);
        apply_global(&spec, ComponentName::NodeAgent, &mut node, &refs()).unwrap();
        assert_eq!(env_names(&node, "agent"), vec![DD_API_KEY]);
    }

    #[test]
    fn test_plain_settings() {
        let spec = DatadogAgentSpec {
            global: Some(GlobalConfig {
                site: Some("datadoghq.eu".to_string()),
                cluster_name: Some("prod".to_string()),
                log_level: Some("debug".to_string()),
                tags: Some(vec!["env:prod".to_string(), "team:infra".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut node = manager(&["agent"]);
        apply_global(&spec, ComponentName::NodeAgent, &mut node, &CredentialRefs::default())
            .unwrap();
        assert_eq!(env_value(&node, "agent", DD_SITE).as_deref(), Some("datadoghq.eu"));
        assert_eq!(env_value(&node, "agent", DD_CLUSTER_NAME).as_deref(), Some("prod"));
        assert_eq!(env_value(&node, "agent", DD_LOG_LEVEL).as_deref(), Some("debug"));
        assert_eq!(
            env_value(&node, "agent", DD_TAGS).as_deref(),
            Some("env:prod team:infra")
        );
    }

    #[test]
    fn test_registry_rewrite_and_scheduling() {
        let spec = DatadogAgentSpec {
            global: Some(GlobalConfig {
                registry: Some("registry.example.com/dd/".to_string()),
                node_selector: Some(BTreeMap::from([("pool".to_string(), "monitoring".to_string())])),
                tolerations: Some(vec![Toleration {
                    operator: Some("Exists".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut node = manager(&["agent", "custom"]);
        {
            let pod = node.template_mut().spec.as_mut().unwrap();
            pod.containers[0].image = Some("gcr.io/datadoghq/agent:7.40.1".to_string());
            pod.containers[1] = Container {
                name: "custom".to_string(),
                image: Some("docker.io/library/busybox".to_string()),
                ..Default::default()
            };
        }
        apply_global(&spec, ComponentName::NodeAgent, &mut node, &CredentialRefs::default())
            .unwrap();

        let pod = node.pod_template().spec.as_ref().unwrap();
        assert_eq!(
            pod.containers[0].image.as_deref(),
            Some("registry.example.com/dd/agent:7.40.1")
        );
        assert_eq!(pod.containers[1].image.as_deref(), Some("docker.io/library/busybox"));
        assert_eq!(
            pod.node_selector.as_ref().unwrap().get("pool").map(String::as_str),
            Some("monitoring")
        );
        assert_eq!(pod.tolerations.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_conflict_with_feature_entry() {
        let spec = DatadogAgentSpec {
            global: Some(GlobalConfig {
                site: Some("datadoghq.com".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut node = manager(&["agent"]);
        node.add_env_var("agent", env_var(DD_SITE, "datadoghq.eu")).unwrap();

        let err = apply_global(&spec, ComponentName::NodeAgent, &mut node, &CredentialRefs::default())
            .unwrap_err();
        assert!(matches!(
            err,
            OverrideError::Conflict(ConflictError { kind: EntryKind::EnvVar, .. })
        ));
    }
}

//! # Cloud Security Posture Management
//!
//! Compliance checks run by the security agent on every node, plus the cluster
//! level checks run by the cluster agent.
//!
//! `checkInterval` uses duration syntax (`20m`, `1h30m`, `1.5s`) and is handed
//! to the agents as a nanosecond count.

use super::{Feature, FeatureId};
use crate::component::ComponentName;
use crate::constants::{
    CGROUPS_HOST_PATH, CGROUPS_MOUNT_PATH, CGROUPS_VOLUME_NAME, CLUSTER_AGENT_CONTAINER,
    COMPLIANCE_CONFIG_PATH, COMPLIANCE_CONFIG_VOLUME_NAME, DD_COMPLIANCE_CONFIG_CHECK_INTERVAL,
    DD_COMPLIANCE_CONFIG_ENABLED, HOST_ROOT_MOUNT_PATH, HOST_ROOT_VOLUME_NAME, PROC_HOST_PATH,
    PROC_MOUNT_PATH, PROC_VOLUME_NAME, SECURITY_AGENT_CONTAINER,
};
use crate::crd::v2alpha1::DatadogAgentSpec;
use crate::crd::ConfigMapConfig;
use crate::error::FeatureError;
use crate::template::{env_var, host_path_volume, volume_mount, PodField, PodTemplateManager};
use k8s_openapi::api::core::v1::{ConfigMapVolumeSource, Volume};
use tracing::debug;

#[derive(Debug, Default)]
pub struct CspmFeature {
    check_interval: Option<String>,
    config_map: Option<ConfigMapConfig>,
}

impl CspmFeature {
    fn add_env(&self, manager: &mut PodTemplateManager, container: &str) -> Result<(), FeatureError> {
        manager.add_env_var(container, env_var(DD_COMPLIANCE_CONFIG_ENABLED, "true"))?;
        if let Some(interval) = &self.check_interval {
            let nanos = parse_duration_nanos(interval).ok_or_else(|| FeatureError::InvalidValue {
                feature: "cspm",
                message: format!("checkInterval '{interval}' is not a valid duration"),
            })?;
            manager.add_env_var(
                container,
                env_var(DD_COMPLIANCE_CONFIG_CHECK_INTERVAL, nanos.to_string()),
            )?;
        }
        Ok(())
    }
}

impl Feature for CspmFeature {
    fn id(&self) -> FeatureId {
        FeatureId::Cspm
    }

    fn configure(&mut self, spec: &DatadogAgentSpec) -> bool {
        let Some(cspm) = spec
            .features
            .as_ref()
            .and_then(|f| f.cspm.as_ref())
            .filter(|c| c.enabled == Some(true))
        else {
            return false;
        };
        self.check_interval.clone_from(&cspm.check_interval);
        if let Some(custom) = &cspm.custom_benchmarks {
            if custom.config_data.is_some() {
                debug!("Inline compliance benchmarks are not supported, use a ConfigMap");
            }
            self.config_map.clone_from(&custom.config_map);
        }
        true
    }

    fn required_containers(&self, component: ComponentName) -> Vec<&'static str> {
        match component {
            ComponentName::NodeAgent => vec![SECURITY_AGENT_CONTAINER],
            ComponentName::ClusterAgent | ComponentName::ClusterChecksRunner => Vec::new(),
        }
    }

    fn manage_node_agent(&self, manager: &mut PodTemplateManager) -> Result<(), FeatureError> {
        self.add_env(manager, SECURITY_AGENT_CONTAINER)?;

        for (name, host_path, mount_path) in [
            (HOST_ROOT_VOLUME_NAME, "/", HOST_ROOT_MOUNT_PATH),
            (CGROUPS_VOLUME_NAME, CGROUPS_HOST_PATH, CGROUPS_MOUNT_PATH),
            (PROC_VOLUME_NAME, PROC_HOST_PATH, PROC_MOUNT_PATH),
        ] {
            manager.add_volume(host_path_volume(name, host_path))?;
            manager.add_volume_mount(SECURITY_AGENT_CONTAINER, volume_mount(name, mount_path, true))?;
        }

        if let Some(cm) = &self.config_map {
            manager.add_volume(Volume {
                name: COMPLIANCE_CONFIG_VOLUME_NAME.to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: cm.name.clone(),
                    items: cm.items.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            })?;
            manager.add_volume_mount(
                SECURITY_AGENT_CONTAINER,
                volume_mount(COMPLIANCE_CONFIG_VOLUME_NAME, COMPLIANCE_CONFIG_PATH, true),
            )?;
        }

        manager.set_pod_field(PodField::HostPid(true))?;
        Ok(())
    }

    fn manage_cluster_agent(&self, manager: &mut PodTemplateManager) -> Result<(), FeatureError> {
        self.add_env(manager, CLUSTER_AGENT_CONTAINER)
    }
}

/// Parse a duration such as `1h30m` or `250ms` into nanoseconds
fn parse_duration_nanos(input: &str) -> Option<u128> {
    if input == "0" {
        return Some(0);
    }
    let mut rest = input;
    let mut total: f64 = 0.0;
    if rest.is_empty() {
        return None;
    }
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += value * scale;
    }
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "total is a finite sum of non-negative terms"
    )]
    Some(total.round() as u128)
}

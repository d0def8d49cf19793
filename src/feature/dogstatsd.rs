//! # DogStatsD
//!
//! Metrics intake of the core agent: a UDP host port, a Unix domain socket
//! shared with the host, origin detection and metric mapper profiles.
//!
//! Everything lands on the `agent` container of the node agent. Env vars are
//! added in a fixed order:
//!
//! 1. `DD_DOGSTATSD_NON_LOCAL_TRAFFIC` (UDP host port)
//! 2. `DD_DOGSTATSD_SOCKET` (UDS)
//! 3. `DD_DOGSTATSD_ORIGIN_DETECTION`
//! 4. `DD_DOGSTATSD_MAPPER_PROFILES`

use super::{Feature, FeatureId};
use crate::constants::{
    CORE_AGENT_CONTAINER, DD_DOGSTATSD_MAPPER_PROFILES, DD_DOGSTATSD_NON_LOCAL_TRAFFIC,
    DD_DOGSTATSD_ORIGIN_DETECTION, DD_DOGSTATSD_SOCKET, DEFAULT_DOGSTATSD_PORT,
    DEFAULT_DOGSTATSD_SOCKET_PATH, DOGSTATSD_PORT_NAME, DOGSTATSD_SOCKET_VOLUME_NAME,
};
use crate::crd::v2alpha1::DatadogAgentSpec;
use crate::error::FeatureError;
use crate::template::{env_var, host_path_volume, volume_mount, PodField, PodTemplateManager};
use crate::util::canonical_json;
use k8s_openapi::api::core::v1::ContainerPort;
use tracing::debug;

#[derive(Debug, Default)]
pub struct DogstatsdFeature {
    /// Host port exposed for UDP traffic; `None` keeps UDP pod-local
    host_port: Option<i32>,
    /// Socket path shared with the host; `None` disables UDS
    socket_path: Option<String>,
    origin_detection: bool,
    /// Raw YAML mapper profiles
    mapper_profiles: Option<String>,
}

impl Feature for DogstatsdFeature {
    fn id(&self) -> FeatureId {
        FeatureId::Dogstatsd
    }

    fn configure(&mut self, spec: &DatadogAgentSpec) -> bool {
        let Some(dsd) = spec.features.as_ref().and_then(|f| f.dogstatsd.as_ref()) else {
            return true;
        };

        self.host_port = dsd
            .host_port_config
            .as_ref()
            .filter(|hp| hp.enabled == Some(true))
            .map(|hp| hp.port.unwrap_or(DEFAULT_DOGSTATSD_PORT));

        self.socket_path = dsd
            .unix_domain_socket_config
            .as_ref()
            .filter(|uds| uds.enabled == Some(true))
            .map(|uds| {
                uds.path
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DOGSTATSD_SOCKET_PATH.to_string())
            });

        self.origin_detection = dsd.origin_detection_enabled.unwrap_or(false);

        if let Some(profiles) = &dsd.mapper_profiles {
            if profiles.config_map.is_some() {
                debug!("Mapper profiles from a ConfigMap are not supported, ignoring");
            }
            self.mapper_profiles.clone_from(&profiles.config_data);
        }

        true
    }

    fn manage_node_agent(&self, manager: &mut PodTemplateManager) -> Result<(), FeatureError> {
        if let Some(host_port) = self.host_port {
            manager.add_env_var(
                CORE_AGENT_CONTAINER,
                env_var(DD_DOGSTATSD_NON_LOCAL_TRAFFIC, "true"),
            )?;
            manager.add_port(
                CORE_AGENT_CONTAINER,
                ContainerPort {
                    name: Some(DOGSTATSD_PORT_NAME.to_string()),
                    container_port: DEFAULT_DOGSTATSD_PORT,
                    host_port: Some(host_port),
                    protocol: Some("UDP".to_string()),
                    ..Default::default()
                },
            )?;
        }

        if let Some(path) = &self.socket_path {
            manager.add_volume(host_path_volume(DOGSTATSD_SOCKET_VOLUME_NAME, path))?;
            manager.add_volume_mount(
                CORE_AGENT_CONTAINER,
                volume_mount(DOGSTATSD_SOCKET_VOLUME_NAME, path, true),
            )?;
            manager.add_env_var(CORE_AGENT_CONTAINER, env_var(DD_DOGSTATSD_SOCKET, path.as_str()))?;
        }

        if self.origin_detection {
            manager.add_env_var(
                CORE_AGENT_CONTAINER,
                env_var(DD_DOGSTATSD_ORIGIN_DETECTION, "true"),
            )?;
            // PID of the sender is only resolvable through the socket
            if self.socket_path.is_some() {
                manager.set_pod_field(PodField::HostPid(true))?;
            }
        }

        if let Some(yaml) = &self.mapper_profiles {
            manager.add_env_var(
                CORE_AGENT_CONTAINER,
                env_var(DD_DOGSTATSD_MAPPER_PROFILES, mapper_profiles_json(yaml)?),
            )?;
        }

        Ok(())
    }
}

/// Re-encode YAML mapper profiles as compact JSON with sorted keys
fn mapper_profiles_json(yaml: &str) -> Result<String, FeatureError> {
    let value: serde_json::Value =
        serde_yaml::from_str(yaml).map_err(|e| FeatureError::InvalidValue {
            feature: "dogstatsd",
            message: format!("mapper profiles are not valid YAML: {e}"),
        })?;
    serde_json::to_string(&canonical_json(value)).map_err(|e| FeatureError::InvalidValue {
        feature: "dogstatsd",
        message: format!("failed to encode mapper profiles: {e}"),
    })
}

//! APM: the trace agent sidecar and its intake (TCP host port and/or UDS).

use super::{Feature, FeatureId};
use crate::component::ComponentName;
use crate::constants::{
    APM_PORT_NAME, APM_SOCKET_VOLUME_NAME, DD_APM_ENABLED, DD_APM_NON_LOCAL_TRAFFIC,
    DD_APM_RECEIVER_SOCKET, DEFAULT_APM_PORT, DEFAULT_APM_SOCKET_PATH, TRACE_AGENT_CONTAINER,
};
use crate::crd::v2alpha1::DatadogAgentSpec;
use crate::error::FeatureError;
use crate::template::{env_var, host_path_volume, volume_mount, PodTemplateManager};
use k8s_openapi::api::core::v1::ContainerPort;

#[derive(Debug, Default)]
pub struct ApmFeature {
    host_port: Option<i32>,
    socket_path: Option<String>,
}

impl Feature for ApmFeature {
    fn id(&self) -> FeatureId {
        FeatureId::Apm
    }

    fn configure(&mut self, spec: &DatadogAgentSpec) -> bool {
        let Some(apm) = spec.features.as_ref().and_then(|f| f.apm.as_ref()) else {
            return false;
        };
        if apm.enabled != Some(true) {
            return false;
        }

        // Host port is on unless explicitly disabled
        self.host_port = match &apm.host_port_config {
            Some(hp) if hp.enabled == Some(false) => None,
            Some(hp) => Some(hp.port.unwrap_or(DEFAULT_APM_PORT)),
            None => Some(DEFAULT_APM_PORT),
        };
        self.socket_path = apm
            .unix_domain_socket_config
            .as_ref()
            .filter(|uds| uds.enabled == Some(true))
            .map(|uds| {
                uds.path
                    .clone()
                    .unwrap_or_else(|| DEFAULT_APM_SOCKET_PATH.to_string())
            });
        true
    }

    fn required_containers(&self, component: ComponentName) -> Vec<&'static str> {
        match component {
            ComponentName::NodeAgent => vec![TRACE_AGENT_CONTAINER],
            ComponentName::ClusterAgent | ComponentName::ClusterChecksRunner => Vec::new(),
        }
    }

    fn manage_node_agent(&self, manager: &mut PodTemplateManager) -> Result<(), FeatureError> {
        manager.add_env_var(TRACE_AGENT_CONTAINER, env_var(DD_APM_ENABLED, "true"))?;

        if let Some(host_port) = self.host_port {
            manager.add_env_var(TRACE_AGENT_CONTAINER, env_var(DD_APM_NON_LOCAL_TRAFFIC, "true"))?;
            manager.add_port(
                TRACE_AGENT_CONTAINER,
                ContainerPort {
                    name: Some(APM_PORT_NAME.to_string()),
                    container_port: DEFAULT_APM_PORT,
                    host_port: Some(host_port),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                },
            )?;
        }

        if let Some(path) = &self.socket_path {
            manager.add_volume(host_path_volume(APM_SOCKET_VOLUME_NAME, path))?;
            manager.add_volume_mount(
                TRACE_AGENT_CONTAINER,
                volume_mount(APM_SOCKET_VOLUME_NAME, path, false),
            )?;
            manager.add_env_var(
                TRACE_AGENT_CONTAINER,
                env_var(DD_APM_RECEIVER_SOCKET, path.as_str()),
            )?;
        }
        Ok(())
    }
}

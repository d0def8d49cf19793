//! Network performance monitoring through system-probe.

use super::{Feature, FeatureId};
use crate::component::ComponentName;
use crate::constants::{
    DD_SYSPROBE_SOCKET, DD_SYSTEM_PROBE_ENABLED, DD_SYSTEM_PROBE_NETWORK_ENABLED, DEBUGFS_PATH,
    DEBUGFS_VOLUME_NAME, PROCESS_AGENT_CONTAINER, PROC_HOST_PATH, PROC_MOUNT_PATH,
    PROC_VOLUME_NAME, SYSPROBE_SOCKET_DIR, SYSPROBE_SOCKET_PATH, SYSPROBE_SOCKET_VOLUME_NAME,
    SYSTEM_PROBE_CONTAINER,
};
use crate::crd::v2alpha1::DatadogAgentSpec;
use crate::error::FeatureError;
use crate::template::{env_var, host_path_volume, volume_mount, PodTemplateManager};
use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, Volume};

#[derive(Debug, Default)]
pub struct NpmFeature;

impl Feature for NpmFeature {
    fn id(&self) -> FeatureId {
        FeatureId::Npm
    }

    fn configure(&mut self, spec: &DatadogAgentSpec) -> bool {
        spec.features
            .as_ref()
            .and_then(|f| f.npm.as_ref())
            .and_then(|npm| npm.enabled)
            .unwrap_or(false)
    }

    fn required_containers(&self, component: ComponentName) -> Vec<&'static str> {
        match component {
            ComponentName::NodeAgent => vec![SYSTEM_PROBE_CONTAINER, PROCESS_AGENT_CONTAINER],
            ComponentName::ClusterAgent | ComponentName::ClusterChecksRunner => Vec::new(),
        }
    }

    fn manage_node_agent(&self, manager: &mut PodTemplateManager) -> Result<(), FeatureError> {
        manager.add_volume(host_path_volume(DEBUGFS_VOLUME_NAME, DEBUGFS_PATH))?;
        manager.add_volume(Volume {
            name: SYSPROBE_SOCKET_VOLUME_NAME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        })?;
        manager.add_volume(host_path_volume(PROC_VOLUME_NAME, PROC_HOST_PATH))?;

        manager.add_volume_mount(
            SYSTEM_PROBE_CONTAINER,
            volume_mount(DEBUGFS_VOLUME_NAME, DEBUGFS_PATH, false),
        )?;
        manager.add_volume_mount(
            SYSTEM_PROBE_CONTAINER,
            volume_mount(SYSPROBE_SOCKET_VOLUME_NAME, SYSPROBE_SOCKET_DIR, false),
        )?;
        manager.add_volume_mount(
            SYSTEM_PROBE_CONTAINER,
            volume_mount(PROC_VOLUME_NAME, PROC_MOUNT_PATH, true),
        )?;
        manager.add_volume_mount(
            PROCESS_AGENT_CONTAINER,
            volume_mount(SYSPROBE_SOCKET_VOLUME_NAME, SYSPROBE_SOCKET_DIR, true),
        )?;

        for container in [SYSTEM_PROBE_CONTAINER, PROCESS_AGENT_CONTAINER] {
            manager.add_env_var(container, env_var(DD_SYSTEM_PROBE_NETWORK_ENABLED, "true"))?;
            manager.add_env_var(container, env_var(DD_SYSTEM_PROBE_ENABLED, "true"))?;
            manager.add_env_var(container, env_var(DD_SYSPROBE_SOCKET, SYSPROBE_SOCKET_PATH))?;
        }
        Ok(())
    }
}

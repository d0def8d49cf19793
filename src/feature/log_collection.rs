//! Log collection: tails pod and container logs from the host.

use super::{Feature, FeatureId};
use crate::constants::{
    CONTAINER_LOG_VOLUME_NAME, CORE_AGENT_CONTAINER, DD_LOGS_CONFIG_CONTAINER_COLLECT_ALL,
    DD_LOGS_CONFIG_K8S_CONTAINER_USE_FILE, DD_LOGS_CONFIG_OPEN_FILES_LIMIT, DD_LOGS_ENABLED,
    DEFAULT_CONTAINER_LOG_PATH, DEFAULT_POINTER_PATH, POD_LOG_PATH, POD_LOG_VOLUME_NAME,
    POINTER_MOUNT_PATH, POINTER_VOLUME_NAME, SYMLINK_CONTAINER_PATH, SYMLINK_CONTAINER_VOLUME_NAME,
};
use crate::crd::v2alpha1::DatadogAgentSpec;
use crate::error::FeatureError;
use crate::template::{env_var, host_path_volume, volume_mount, PodTemplateManager};

#[derive(Debug, Default)]
pub struct LogCollectionFeature {
    collect_all: bool,
    use_files: bool,
    open_files_limit: Option<i32>,
    pointer_path: String,
    pod_logs_path: String,
    container_logs_path: String,
    symlinks_path: String,
}

impl Feature for LogCollectionFeature {
    fn id(&self) -> FeatureId {
        FeatureId::LogCollection
    }

    fn configure(&mut self, spec: &DatadogAgentSpec) -> bool {
        let Some(logs) = spec
            .features
            .as_ref()
            .and_then(|f| f.log_collection.as_ref())
            .filter(|l| l.enabled == Some(true))
        else {
            return false;
        };

        self.collect_all = logs.container_collect_all.unwrap_or(false);
        self.use_files = logs.container_collect_using_files.unwrap_or(true);
        self.open_files_limit = logs.open_files_limit;
        self.pointer_path = logs
            .temp_storage_path
            .clone()
            .unwrap_or_else(|| DEFAULT_POINTER_PATH.to_string());
        self.pod_logs_path = logs
            .pod_logs_path
            .clone()
            .unwrap_or_else(|| POD_LOG_PATH.to_string());
        self.container_logs_path = logs
            .container_logs_path
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTAINER_LOG_PATH.to_string());
        self.symlinks_path = logs
            .container_symlinks_path
            .clone()
            .unwrap_or_else(|| SYMLINK_CONTAINER_PATH.to_string());
        true
    }

    fn manage_node_agent(&self, manager: &mut PodTemplateManager) -> Result<(), FeatureError> {
        manager.add_env_var(CORE_AGENT_CONTAINER, env_var(DD_LOGS_ENABLED, "true"))?;
        manager.add_env_var(
            CORE_AGENT_CONTAINER,
            env_var(
                DD_LOGS_CONFIG_CONTAINER_COLLECT_ALL,
                self.collect_all.to_string(),
            ),
        )?;
        manager.add_env_var(
            CORE_AGENT_CONTAINER,
            env_var(DD_LOGS_CONFIG_K8S_CONTAINER_USE_FILE, self.use_files.to_string()),
        )?;
        if let Some(limit) = self.open_files_limit {
            manager.add_env_var(
                CORE_AGENT_CONTAINER,
                env_var(DD_LOGS_CONFIG_OPEN_FILES_LIMIT, limit.to_string()),
            )?;
        }

        manager.add_volume(host_path_volume(POINTER_VOLUME_NAME, &self.pointer_path))?;
        manager.add_volume_mount(
            CORE_AGENT_CONTAINER,
            volume_mount(POINTER_VOLUME_NAME, POINTER_MOUNT_PATH, false),
        )?;

        for (name, path) in [
            (POD_LOG_VOLUME_NAME, &self.pod_logs_path),
            (CONTAINER_LOG_VOLUME_NAME, &self.container_logs_path),
            (SYMLINK_CONTAINER_VOLUME_NAME, &self.symlinks_path),
        ] {
            manager.add_volume(host_path_volume(name, path))?;
            manager.add_volume_mount(CORE_AGENT_CONTAINER, volume_mount(name, path, true))?;
        }
        Ok(())
    }
}

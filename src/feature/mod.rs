//! # Features
//!
//! A feature is a unit of optional agent behaviour (log collection, DogStatsD,
//! APM, ...). Each one reads the normalized configuration once and then
//! contributes volumes, mounts, env vars, ports and pod fields to the components
//! it cares about through a [`PodTemplateManager`].
//!
//! Lifecycle within one pass:
//!
//! 1. a fresh instance is built by the registry
//! 2. [`Feature::configure`] records the resolved options and reports whether the feature runs
//! 3. `manage_*` is called at most once per enabled component, in priority order
//!
//! Features never see each other; collisions surface as conflicts from the
//! template manager.

mod apm;
mod cluster_checks;
mod cspm;
mod dogstatsd;
mod log_collection;
pub mod normalize;
mod npm;
pub mod registry;

pub use apm::ApmFeature;
pub use cluster_checks::ClusterChecksFeature;
pub use cspm::CspmFeature;
pub use dogstatsd::DogstatsdFeature;
pub use log_collection::LogCollectionFeature;
pub use npm::NpmFeature;
pub use registry::{apply_features, build_features, required_containers, FeatureFactory};

use crate::component::ComponentName;
use crate::crd::v2alpha1::DatadogAgentSpec;
use crate::error::FeatureError;
use crate::template::PodTemplateManager;
use std::fmt;

/// Closed set of features known to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureId {
    LogCollection,
    Dogstatsd,
    Apm,
    Npm,
    Cspm,
    ClusterChecks,
}

impl FeatureId {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LogCollection => "logCollection",
            Self::Dogstatsd => "dogstatsd",
            Self::Apm => "apm",
            Self::Npm => "npm",
            Self::Cspm => "cspm",
            Self::ClusterChecks => "clusterChecks",
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Feature: fmt::Debug + Send + Sync {
    fn id(&self) -> FeatureId;

    /// Resolve options from the normalized configuration. Returns `true` when the
    /// feature wants to run. Called exactly once, before any `manage_*`.
    fn configure(&mut self, spec: &DatadogAgentSpec) -> bool;

    /// Containers this feature needs in `component`'s pod beyond the defaults
    fn required_containers(&self, _component: ComponentName) -> Vec<&'static str> {
        Vec::new()
    }

    fn manage_node_agent(&self, _manager: &mut PodTemplateManager) -> Result<(), FeatureError> {
        Ok(())
    }

    fn manage_cluster_agent(&self, _manager: &mut PodTemplateManager) -> Result<(), FeatureError> {
        Ok(())
    }

    fn manage_cluster_checks_runner(
        &self,
        _manager: &mut PodTemplateManager,
    ) -> Result<(), FeatureError> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::constants::CORE_AGENT_CONTAINER;
    use crate::template::PodTemplateManager;
    use k8s_openapi::api::core::v1::{
        Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, Volume, VolumeMount,
    };

    /// Manager over a pod holding only the named, otherwise empty, containers
    pub fn manager(containers: &[&str]) -> PodTemplateManager {
        PodTemplateManager::new(PodTemplateSpec {
            metadata: None,
            spec: Some(PodSpec {
                containers: containers
                    .iter()
                    .map(|n| Container {
                        name: (*n).to_string(),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }),
        })
    }

    pub fn agent_manager() -> PodTemplateManager {
        manager(&[CORE_AGENT_CONTAINER])
    }

    fn container<'a>(mgr: &'a PodTemplateManager, name: &str) -> &'a Container {
        mgr.pod_template()
            .spec
            .as_ref()
            .and_then(|s| s.containers.iter().find(|c| c.name == name))
            .unwrap_or_else(|| panic!("container {name} missing"))
    }

    pub fn env(mgr: &PodTemplateManager, name: &str) -> Vec<EnvVar> {
        container(mgr, name).env.clone().unwrap_or_default()
    }

    pub fn mounts(mgr: &PodTemplateManager, name: &str) -> Vec<VolumeMount> {
        container(mgr, name).volume_mounts.clone().unwrap_or_default()
    }

    pub fn ports(mgr: &PodTemplateManager, name: &str) -> Vec<ContainerPort> {
        container(mgr, name).ports.clone().unwrap_or_default()
    }

    pub fn volumes(mgr: &PodTemplateManager) -> Vec<Volume> {
        mgr.pod_template()
            .spec
            .as_ref()
            .and_then(|s| s.volumes.clone())
            .unwrap_or_default()
    }

    pub fn env_value(mgr: &PodTemplateManager, container: &str, name: &str) -> Option<String> {
        env(mgr, container)
            .into_iter()
            .find(|e| e.name == name)
            .and_then(|e| e.value)
    }
}

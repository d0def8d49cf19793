//! Cluster checks: the cluster agent dispatches checks either to node agents or
//! to dedicated checks runners.

use super::{Feature, FeatureId};
use crate::constants::{
    CLUSTER_AGENT_CONFIG_PROVIDERS, CLUSTER_AGENT_CONTAINER, CLUSTER_AGENT_LISTENERS,
    CLUSTER_CHECKS_RUNNER_CONFIG_PROVIDERS, CLUSTER_CHECKS_RUNNER_CONTAINER, CORE_AGENT_CONTAINER,
    DD_CLUSTER_CHECKS_ENABLED, DD_EXTRA_CONFIG_PROVIDERS, DD_EXTRA_LISTENERS,
    NODE_AGENT_CLUSTER_CHECKS_CONFIG_PROVIDERS, NODE_AGENT_ENDPOINT_CHECKS_CONFIG_PROVIDERS,
};
use crate::crd::v2alpha1::DatadogAgentSpec;
use crate::error::FeatureError;
use crate::template::{env_var, PodTemplateManager};

#[derive(Debug, Default)]
pub struct ClusterChecksFeature {
    use_runners: bool,
}

impl Feature for ClusterChecksFeature {
    fn id(&self) -> FeatureId {
        FeatureId::ClusterChecks
    }

    fn configure(&mut self, spec: &DatadogAgentSpec) -> bool {
        let Some(cc) = spec.features.as_ref().and_then(|f| f.cluster_checks.as_ref()) else {
            return false;
        };
        if cc.enabled != Some(true) || !spec.cluster_agent_enabled() {
            return false;
        }
        self.use_runners = cc.use_cluster_checks_runners.unwrap_or(false);
        true
    }

    fn manage_node_agent(&self, manager: &mut PodTemplateManager) -> Result<(), FeatureError> {
        let providers = if self.use_runners {
            NODE_AGENT_ENDPOINT_CHECKS_CONFIG_PROVIDERS
        } else {
            NODE_AGENT_CLUSTER_CHECKS_CONFIG_PROVIDERS
        };
        manager.add_env_var(
            CORE_AGENT_CONTAINER,
            env_var(DD_EXTRA_CONFIG_PROVIDERS, providers),
        )?;
        Ok(())
    }

    fn manage_cluster_agent(&self, manager: &mut PodTemplateManager) -> Result<(), FeatureError> {
        manager.add_env_var(CLUSTER_AGENT_CONTAINER, env_var(DD_CLUSTER_CHECKS_ENABLED, "true"))?;
        manager.add_env_var(
            CLUSTER_AGENT_CONTAINER,
            env_var(DD_EXTRA_CONFIG_PROVIDERS, CLUSTER_AGENT_CONFIG_PROVIDERS),
        )?;
        manager.add_env_var(
            CLUSTER_AGENT_CONTAINER,
            env_var(DD_EXTRA_LISTENERS, CLUSTER_AGENT_LISTENERS),
        )?;
        Ok(())
    }

    fn manage_cluster_checks_runner(
        &self,
        manager: &mut PodTemplateManager,
    ) -> Result<(), FeatureError> {
        manager.add_env_var(
            CLUSTER_CHECKS_RUNNER_CONTAINER,
            env_var(DD_CLUSTER_CHECKS_ENABLED, "true"),
        )?;
        manager.add_env_var(
            CLUSTER_CHECKS_RUNNER_CONTAINER,
            env_var(DD_EXTRA_CONFIG_PROVIDERS, CLUSTER_CHECKS_RUNNER_CONFIG_PROVIDERS),
        )?;
        Ok(())
    }
}

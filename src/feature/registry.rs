//! # Feature Registry
//!
//! Builds the ordered list of enabled features for a pass and drives their
//! lifecycle against one component.

use super::{
    ApmFeature, ClusterChecksFeature, CspmFeature, DogstatsdFeature, Feature, FeatureId,
    LogCollectionFeature, NpmFeature,
};
use crate::component::ComponentName;
use crate::crd::v2alpha1::DatadogAgentSpec;
use crate::error::FeatureError;
use crate::template::PodTemplateManager;
use tracing::debug;

/// Builds the enabled features for a normalized spec
pub type FeatureFactory = fn(&DatadogAgentSpec) -> Vec<Box<dyn Feature>>;

/// Order in which features mutate a template. Total and independent of the
/// order fields appear in the configuration.
pub const FEATURE_PRIORITY: [FeatureId; 6] = [
    FeatureId::LogCollection,
    FeatureId::Dogstatsd,
    FeatureId::Apm,
    FeatureId::Npm,
    FeatureId::Cspm,
    FeatureId::ClusterChecks,
];

fn new_feature(id: FeatureId) -> Box<dyn Feature> {
    match id {
        FeatureId::LogCollection => Box::new(LogCollectionFeature::default()),
        FeatureId::Dogstatsd => Box::new(DogstatsdFeature::default()),
        FeatureId::Apm => Box::new(ApmFeature::default()),
        FeatureId::Npm => Box::new(NpmFeature),
        FeatureId::Cspm => Box::new(CspmFeature::default()),
        FeatureId::ClusterChecks => Box::new(ClusterChecksFeature::default()),
    }
}

/// Configure every known feature and keep, in priority order, those that want to run
#[must_use]
pub fn build_features(spec: &DatadogAgentSpec) -> Vec<Box<dyn Feature>> {
    FEATURE_PRIORITY
        .iter()
        .filter_map(|id| {
            let mut feature = new_feature(*id);
            let enabled = feature.configure(spec);
            debug!(feature = %id, enabled, "Configured feature");
            enabled.then_some(feature)
        })
        .collect()
}

/// Union of the extra containers `features` need in `component`, without duplicates
#[must_use]
pub fn required_containers(
    features: &[Box<dyn Feature>],
    component: ComponentName,
) -> Vec<&'static str> {
    let mut containers = Vec::new();
    for name in features
        .iter()
        .flat_map(|f| f.required_containers(component))
    {
        if !containers.contains(&name) {
            containers.push(name);
        }
    }
    containers
}

/// Let each feature mutate `component`'s template. The first failure aborts the
/// component.
pub fn apply_features(
    features: &[Box<dyn Feature>],
    component: ComponentName,
    manager: &mut PodTemplateManager,
) -> Result<(), FeatureError> {
    for feature in features {
        debug!(feature = %feature.id(), component = %component, "Applying feature");
        match component {
            ComponentName::NodeAgent => feature.manage_node_agent(manager)?,
            ComponentName::ClusterAgent => feature.manage_cluster_agent(manager)?,
            ComponentName::ClusterChecksRunner => feature.manage_cluster_checks_runner(manager)?,
        }
    }
    Ok(())
}

//! # Normalization
//!
//! Translates a legacy `v1alpha1` spec into the structured `v2alpha1` shape and
//! validates the result. Runs once per pass, before any feature is configured.
//!
//! When a legacy field and its structured counterpart are both set the
//! structured one wins:
//!
//! | Structured | Legacy |
//! |------------|--------|
//! | `features.logCollection` | `agent.log` |
//! | `features.networkMonitoring` | `agent.systemProbe` |
//! | `credentials.apiSecret` / `appSecret` | `credentials.apiKeyExistingSecret` / `appKeyExistingSecret` |
//!
//! Translation is all-or-nothing: a contradiction fails with a
//! [`ConfigTranslationError`] and no partial spec is produced.

use crate::constants::{API_KEY_KEY, APP_KEY_KEY};
use crate::crd::v1alpha1;
use crate::crd::v2alpha1::{
    ApmFeatureConfig, ClusterChecksFeatureConfig, CspmFeatureConfig, DatadogAgentComponentOverride,
    DatadogAgentOverrides, DatadogAgentSpec, DatadogCredentials, DatadogFeatures,
    DogstatsdFeatureConfig, GlobalConfig, LogCollectionFeatureConfig, NpmFeatureConfig,
};
use crate::crd::{ConfigMapConfig, CustomConfig, HostPortConfig, SecretConfig, UnixDomainSocketConfig};
use crate::error::ConfigTranslationError;

/// Translate a legacy spec into the structured representation
pub fn normalize_v1(
    spec: &v1alpha1::DatadogAgentSpec,
) -> Result<DatadogAgentSpec, ConfigTranslationError> {
    let agent = spec.agent.clone().unwrap_or_default();
    let agent_config = agent.config.clone().unwrap_or_default();
    let cluster_agent = spec.cluster_agent.clone().unwrap_or_default();
    let runner = spec.cluster_checks_runner.clone().unwrap_or_default();

    if let Some(port) = agent_config.host_port {
        check_port("agent.config.hostPort", port)?;
    }
    let dsd = agent_config.dogstatsd.clone().unwrap_or_default();
    if let Some(path) = dsd
        .unix_domain_socket
        .as_ref()
        .and_then(|uds| uds.host_filepath.as_deref())
    {
        check_socket_path("agent.config.dogstatsd.unixDomainSocket.hostFilepath", path)?;
    }

    let cluster_agent_enabled = cluster_agent.enabled.unwrap_or(false);
    let cluster_checks_enabled = cluster_agent
        .config
        .as_ref()
        .and_then(|c| c.cluster_checks_enabled)
        .unwrap_or(false);
    let runner_enabled = runner.enabled.unwrap_or(false);
    if runner_enabled && !cluster_agent_enabled {
        return Err(ConfigTranslationError::ChecksRunnerWithoutClusterChecks {
            requirement: "clusterAgent",
        });
    }
    if runner_enabled && !cluster_checks_enabled {
        return Err(ConfigTranslationError::ChecksRunnerWithoutClusterChecks {
            requirement: "clusterAgent.config.clusterChecksEnabled",
        });
    }

    let features = DatadogFeatures {
        log_collection: translate_logs(spec, &agent),
        dogstatsd: Some(DogstatsdFeatureConfig {
            origin_detection_enabled: dsd.dogstatsd_origin_detection,
            // UDP is always exposed on the host with the legacy schema
            host_port_config: Some(HostPortConfig {
                enabled: Some(true),
                port: agent_config.host_port,
            }),
            unix_domain_socket_config: dsd.unix_domain_socket.map(|uds| UnixDomainSocketConfig {
                enabled: uds.enabled,
                path: uds.host_filepath,
            }),
            mapper_profiles: dsd.mapper_profiles,
        }),
        apm: agent.apm.as_ref().map(|apm| ApmFeatureConfig {
            enabled: apm.enabled,
            host_port_config: Some(HostPortConfig {
                enabled: Some(true),
                port: apm.host_port,
            }),
            unix_domain_socket_config: None,
        }),
        npm: translate_npm(spec, &agent),
        cspm: agent
            .security
            .as_ref()
            .and_then(|s| s.compliance.as_ref())
            .map(|compliance| CspmFeatureConfig {
                enabled: compliance.enabled,
                check_interval: compliance.check_interval.clone(),
                custom_benchmarks: compliance.config_dir.as_ref().map(|dir| CustomConfig {
                    config_data: None,
                    config_map: Some(ConfigMapConfig {
                        name: dir.config_map_name.clone(),
                        items: None,
                    }),
                }),
            }),
        cluster_checks: (cluster_checks_enabled || runner_enabled).then_some(
            ClusterChecksFeatureConfig {
                enabled: Some(cluster_checks_enabled),
                use_cluster_checks_runners: Some(runner_enabled),
            },
        ),
    };

    let global = GlobalConfig {
        credentials: spec.credentials.as_ref().map(translate_credentials),
        cluster_agent_token: spec.credentials.as_ref().and_then(|c| c.token.clone()),
        site: spec.site.clone(),
        registry: spec.registry.clone(),
        cluster_name: spec.cluster_name.clone(),
        log_level: agent_config.log_level.clone(),
        tags: agent_config.tags.clone(),
        node_selector: None,
        tolerations: None,
    };

    let node_agent = DatadogAgentComponentOverride {
        image: agent.image.clone(),
        env: agent.env.clone(),
        priority_class_name: agent.priority_class_name.clone(),
        tolerations: agent_config.tolerations.clone(),
        ..Default::default()
    };
    let cluster_agent_override = DatadogAgentComponentOverride {
        disabled: (!cluster_agent_enabled).then_some(true),
        image: cluster_agent.image.clone(),
        replicas: cluster_agent.replicas,
        env: cluster_agent.config.as_ref().and_then(|c| c.env.clone()),
        ..Default::default()
    };
    let runner_override = DatadogAgentComponentOverride {
        image: runner.image.clone(),
        replicas: runner.replicas,
        ..Default::default()
    };

    let normalized = DatadogAgentSpec {
        features: Some(features),
        global: Some(global),
        overrides: Some(DatadogAgentOverrides {
            node_agent: non_empty(node_agent),
            cluster_agent: non_empty(cluster_agent_override),
            cluster_checks_runner: non_empty(runner_override),
        }),
    };
    validate(&normalized)?;
    Ok(normalized)
}

/// Reject structured configuration the features cannot act on
pub fn validate(spec: &DatadogAgentSpec) -> Result<(), ConfigTranslationError> {
    let Some(features) = &spec.features else {
        return Ok(());
    };

    if let Some(dsd) = &features.dogstatsd {
        if let Some(port) = dsd.host_port_config.as_ref().and_then(|hp| hp.port) {
            check_port("features.dogstatsd.hostPortConfig.port", port)?;
        }
        if let Some(path) = dsd.unix_domain_socket_config.as_ref().and_then(|u| u.path.as_deref()) {
            check_socket_path("features.dogstatsd.unixDomainSocketConfig.path", path)?;
        }
        if let Some(profiles) = &dsd.mapper_profiles {
            check_custom_config("features.dogstatsd.mapperProfiles", profiles)?;
        }
    }

    if let Some(apm) = &features.apm {
        if let Some(port) = apm.host_port_config.as_ref().and_then(|hp| hp.port) {
            check_port("features.apm.hostPortConfig.port", port)?;
        }
        if let Some(path) = apm.unix_domain_socket_config.as_ref().and_then(|u| u.path.as_deref()) {
            check_socket_path("features.apm.unixDomainSocketConfig.path", path)?;
        }
    }

    if let Some(benchmarks) = features.cspm.as_ref().and_then(|c| c.custom_benchmarks.as_ref()) {
        check_custom_config("features.cspm.customBenchmarks", benchmarks)?;
    }
    Ok(())
}

fn translate_logs(
    spec: &v1alpha1::DatadogAgentSpec,
    agent: &v1alpha1::DatadogAgentSpecAgentSpec,
) -> Option<LogCollectionFeatureConfig> {
    let logs = spec
        .features
        .as_ref()
        .and_then(|f| f.log_collection.as_ref())
        .or(agent.log.as_ref())?;
    Some(LogCollectionFeatureConfig {
        enabled: logs.logs_enabled,
        container_collect_all: logs.logs_config_container_collect_all,
        container_collect_using_files: logs.container_collect_using_files,
        container_logs_path: logs.container_logs_path.clone(),
        pod_logs_path: logs.pod_logs_path.clone(),
        container_symlinks_path: logs.container_symlinks_path.clone(),
        temp_storage_path: logs.temp_storage_path.clone(),
        open_files_limit: logs.open_files_limit,
    })
}

fn translate_npm(
    spec: &v1alpha1::DatadogAgentSpec,
    agent: &v1alpha1::DatadogAgentSpecAgentSpec,
) -> Option<NpmFeatureConfig> {
    let enabled = spec
        .features
        .as_ref()
        .and_then(|f| f.network_monitoring.as_ref())
        .map(|n| n.enabled)
        .or_else(|| agent.system_probe.as_ref().map(|sp| sp.enabled))?;
    Some(NpmFeatureConfig { enabled })
}

fn translate_credentials(creds: &v1alpha1::AgentCredentials) -> DatadogCredentials {
    let legacy_secret = |name: &Option<String>, key: &str| {
        name.as_ref().map(|secret_name| SecretConfig {
            secret_name: secret_name.clone(),
            key_name: Some(key.to_string()),
        })
    };
    DatadogCredentials {
        api_key: creds.api_key.clone(),
        api_secret: creds
            .api_secret
            .clone()
            .or_else(|| legacy_secret(&creds.api_key_existing_secret, API_KEY_KEY)),
        app_key: creds.app_key.clone(),
        app_secret: creds
            .app_secret
            .clone()
            .or_else(|| legacy_secret(&creds.app_key_existing_secret, APP_KEY_KEY)),
    }
}

fn non_empty(o: DatadogAgentComponentOverride) -> Option<DatadogAgentComponentOverride> {
    (o != DatadogAgentComponentOverride::default()).then_some(o)
}

fn check_port(field: &str, port: i32) -> Result<(), ConfigTranslationError> {
    if (1..=65535).contains(&port) {
        return Ok(());
    }
    Err(ConfigTranslationError::InvalidValue {
        field: field.to_string(),
        message: format!("port {port} is outside 1..=65535"),
    })
}

fn check_socket_path(field: &str, path: &str) -> Result<(), ConfigTranslationError> {
    if path.starts_with('/') {
        return Ok(());
    }
    Err(ConfigTranslationError::InvalidValue {
        field: field.to_string(),
        message: format!("path '{path}' is not absolute"),
    })
}

fn check_custom_config(field: &str, config: &CustomConfig) -> Result<(), ConfigTranslationError> {
    if config.config_data.is_some() && config.config_map.is_some() {
        return Err(ConfigTranslationError::AmbiguousCustomConfig {
            field: field.to_string(),
        });
    }
    Ok(())
}

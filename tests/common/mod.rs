//! Common test utilities for the integration tests
//!
//! Provides an in-memory cluster implementing the controller's client traits,
//! with write counting and failure injection, plus builders for `DatadogAgent`
//! objects.

#![allow(dead_code, reason = "Each test binary uses a different subset")]

use async_trait::async_trait;
use datadog_agent_controller::config::ControllerConfig;
use datadog_agent_controller::controller::client::{ObjectClient, StatusWriter};
use datadog_agent_controller::controller::reconciler::Reconciler;
use datadog_agent_controller::crd::{v1alpha1, v2alpha1, ApiVersion, DatadogAgentStatus};
use datadog_agent_controller::error::ClientError;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Container, Secret};
use kube::Resource;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const NAMESPACE: &str = "monitoring";
pub const NAME: &str = "datadog";

/// In-memory cluster
#[derive(Debug, Default)]
pub struct FakeCluster {
    daemonsets: Mutex<BTreeMap<String, DaemonSet>>,
    deployments: Mutex<BTreeMap<String, Deployment>>,
    secrets: Mutex<BTreeMap<String, Secret>>,
    statuses: Mutex<Vec<DatadogAgentStatus>>,
    writes: AtomicUsize,
    /// Kind -> error returned by every create/update of that kind
    failures: Mutex<HashMap<&'static str, ClientError>>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of object creates and updates, status patches excluded
    pub fn object_writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn status_patches(&self) -> usize {
        self.statuses.lock().unwrap().len()
    }

    pub fn last_status(&self) -> Option<DatadogAgentStatus> {
        self.statuses.lock().unwrap().last().cloned()
    }

    pub fn fail_writes(&self, kind: &'static str, error: ClientError) {
        self.failures.lock().unwrap().insert(kind, error);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn daemonset(&self, name: &str) -> Option<DaemonSet> {
        self.daemonsets.lock().unwrap().get(name).cloned()
    }

    pub fn deployment(&self, name: &str) -> Option<Deployment> {
        self.deployments.lock().unwrap().get(name).cloned()
    }

    pub fn secret(&self, name: &str) -> Option<Secret> {
        self.secrets.lock().unwrap().get(name).cloned()
    }

    pub fn deployment_names(&self) -> Vec<String> {
        self.deployments.lock().unwrap().keys().cloned().collect()
    }

    /// Mutate a stored DaemonSet as another writer would
    pub fn edit_daemonset(&self, name: &str, edit: impl FnOnce(&mut DaemonSet)) {
        if let Some(ds) = self.daemonsets.lock().unwrap().get_mut(name) {
            edit(ds);
            bump_version(ds);
        }
    }

    /// Mutate a stored Secret as another writer would
    pub fn edit_secret(&self, name: &str, edit: impl FnOnce(&mut Secret)) {
        if let Some(secret) = self.secrets.lock().unwrap().get_mut(name) {
            edit(secret);
            bump_version(secret);
        }
    }

    fn check_failure(&self, kind: &'static str) -> Result<(), ClientError> {
        match self.failures.lock().unwrap().get(kind) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

fn bump_version<K: Resource>(obj: &mut K) {
    let next = obj
        .meta()
        .resource_version
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    obj.meta_mut().resource_version = Some(next.to_string());
}

macro_rules! fake_object_client {
    ($kind:ty, $field:ident, $name:literal) => {
        #[async_trait]
        impl ObjectClient<$kind> for FakeCluster {
            async fn get(&self, namespace: &str, name: &str) -> Result<Option<$kind>, ClientError> {
                assert_eq!(namespace, NAMESPACE);
                Ok(self.$field.lock().unwrap().get(name).cloned())
            }

            async fn create(&self, obj: &$kind) -> Result<$kind, ClientError> {
                self.check_failure($name)?;
                let name = obj.meta().name.clone().unwrap();
                let mut store = self.$field.lock().unwrap();
                if store.contains_key(&name) {
                    return Err(ClientError::Api {
                        code: 409,
                        message: format!("{} {name} already exists", $name),
                    });
                }
                let mut stored = obj.clone();
                bump_version(&mut stored);
                store.insert(name, stored.clone());
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(stored)
            }

            async fn update(&self, obj: &$kind) -> Result<$kind, ClientError> {
                self.check_failure($name)?;
                let name = obj.meta().name.clone().unwrap();
                let mut store = self.$field.lock().unwrap();
                let live_version = store
                    .get(&name)
                    .and_then(|live| live.meta().resource_version.clone());
                if live_version.is_none() || live_version != obj.meta().resource_version {
                    return Err(ClientError::Api {
                        code: 409,
                        message: format!("{} {name} was modified", $name),
                    });
                }
                let mut stored = obj.clone();
                bump_version(&mut stored);
                store.insert(name, stored.clone());
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(stored)
            }
        }
    };
}

fake_object_client!(DaemonSet, daemonsets, "DaemonSet");
fake_object_client!(Deployment, deployments, "Deployment");
fake_object_client!(Secret, secrets, "Secret");

#[async_trait]
impl StatusWriter for FakeCluster {
    async fn patch_status(
        &self,
        _api_version: ApiVersion,
        namespace: &str,
        name: &str,
        status: &DatadogAgentStatus,
    ) -> Result<(), ClientError> {
        assert_eq!(namespace, NAMESPACE);
        assert_eq!(name, NAME);
        self.statuses.lock().unwrap().push(status.clone());
        Ok(())
    }
}

pub fn reconciler(cluster: &Arc<FakeCluster>) -> Reconciler {
    reconciler_with(cluster, ControllerConfig::default())
}

pub fn reconciler_with(cluster: &Arc<FakeCluster>, config: ControllerConfig) -> Reconciler {
    let client = Arc::clone(cluster);
    Reconciler::new(client, config)
}

/// `v2alpha1` object from the JSON form of its spec
pub fn v2_agent(spec: Value) -> v2alpha1::DatadogAgent {
    let spec: v2alpha1::DatadogAgentSpec = serde_json::from_value(spec).unwrap();
    let mut agent = v2alpha1::DatadogAgent::new(NAME, spec);
    set_identity(&mut agent.metadata);
    agent
}

/// `v1alpha1` object from the JSON form of its spec
pub fn v1_agent(spec: Value) -> v1alpha1::DatadogAgent {
    let spec: v1alpha1::DatadogAgentSpec = serde_json::from_value(spec).unwrap();
    let mut agent = v1alpha1::DatadogAgent::new(NAME, spec);
    set_identity(&mut agent.metadata);
    agent
}

fn set_identity(meta: &mut kube::api::ObjectMeta) {
    meta.namespace = Some(NAMESPACE.to_string());
    meta.uid = Some("0b4e6a4e-3c5f-4a9e-9a39-8e2f7d6c1a01".to_string());
    meta.generation = Some(1);
}

/// Container `name` of the node agent DaemonSet
pub fn node_agent_container(cluster: &FakeCluster, name: &str) -> Container {
    cluster
        .daemonset(&format!("{NAME}-agent"))
        .and_then(|ds| ds.spec)
        .and_then(|spec| spec.template.spec)
        .and_then(|pod| pod.containers.into_iter().find(|c| c.name == name))
        .unwrap_or_else(|| panic!("node agent container {name} not found"))
}

pub fn env_value(container: &Container, name: &str) -> Option<String> {
    container
        .env
        .iter()
        .flatten()
        .find(|e| e.name == name)
        .and_then(|e| e.value.clone())
}

pub fn env_names(container: &Container) -> Vec<String> {
    container.env.iter().flatten().map(|e| e.name.clone()).collect()
}

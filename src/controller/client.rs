//! # Cluster Client
//!
//! Narrow capabilities a pass needs from the API server: read, create and
//! replace owned objects, and patch the `DatadogAgent` status. The kube-backed
//! [`KubeClusterClient`] is used in production; tests substitute an in-memory
//! implementation.

use crate::constants::FIELD_MANAGER;
use crate::crd::{v1alpha1, v2alpha1, ApiVersion, DatadogAgentStatus};
use crate::error::ClientError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::fmt::Debug;

/// Read and write access to one kind of namespaced object
#[async_trait]
pub trait ObjectClient<K>: Send + Sync {
    /// Fetch an object; absence is `Ok(None)`
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ClientError>;

    async fn create(&self, obj: &K) -> Result<K, ClientError>;

    /// Replace an object. `metadata.resourceVersion` must carry the live version.
    async fn update(&self, obj: &K) -> Result<K, ClientError>;
}

/// Write access to the `DatadogAgent` status subresource
#[async_trait]
pub trait StatusWriter: Send + Sync {
    async fn patch_status(
        &self,
        api_version: ApiVersion,
        namespace: &str,
        name: &str,
        status: &DatadogAgentStatus,
    ) -> Result<(), ClientError>;
}

/// Everything a pass touches on the cluster
pub trait ClusterClient:
    ObjectClient<DaemonSet> + ObjectClient<Deployment> + ObjectClient<Secret> + StatusWriter
{
}

impl<T> ClusterClient for T where
    T: ObjectClient<DaemonSet> + ObjectClient<Deployment> + ObjectClient<Secret> + StatusWriter
{
}

#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn object_key<K: Resource>(obj: &K) -> Result<(&str, &str), ClientError> {
    let meta = obj.meta();
    let namespace = meta
        .namespace
        .as_deref()
        .ok_or_else(|| ClientError::InvalidObject("object has no namespace".to_string()))?;
    let name = meta
        .name
        .as_deref()
        .ok_or_else(|| ClientError::InvalidObject("object has no name".to_string()))?;
    Ok((namespace, name))
}

#[async_trait]
impl<K> ObjectClient<K> for KubeClusterClient
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, ClientError> {
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }

    async fn create(&self, obj: &K) -> Result<K, ClientError> {
        let (namespace, _) = object_key(obj)?;
        Ok(self
            .api::<K>(namespace)
            .create(&PostParams::default(), obj)
            .await?)
    }

    async fn update(&self, obj: &K) -> Result<K, ClientError> {
        let (namespace, name) = object_key(obj)?;
        Ok(self
            .api::<K>(namespace)
            .replace(name, &PostParams::default(), obj)
            .await?)
    }
}

#[async_trait]
impl StatusWriter for KubeClusterClient {
    async fn patch_status(
        &self,
        api_version: ApiVersion,
        namespace: &str,
        name: &str,
        status: &DatadogAgentStatus,
    ) -> Result<(), ClientError> {
        let params = PatchParams::apply(FIELD_MANAGER);
        let patch = Patch::Merge(json!({ "status": status }));
        match api_version {
            ApiVersion::V1Alpha1 => {
                self.api::<v1alpha1::DatadogAgent>(namespace)
                    .patch_status(name, &params, &patch)
                    .await?;
            }
            ApiVersion::V2Alpha1 => {
                self.api::<v2alpha1::DatadogAgent>(namespace)
                    .patch_status(name, &params, &patch)
                    .await?;
            }
        }
        Ok(())
    }
}

//! # Convergence
//!
//! Brings one live object in line with its desired state, writing only when the
//! controller-owned content actually differs.
//!
//! The owned content of an object (`spec` for workloads, `type` and key names
//! for secrets) is hashed over canonical JSON and stored in the
//! `agent.datadoghq.com/spec-hash` annotation. Secret values never reach the
//! annotation; they are compared against the live object directly. An update
//! is issued when:
//!
//! - the live hash annotation differs from the desired hash,
//! - a label or annotation the controller sets is missing or different on the live object, or
//! - content compared directly (secret values) differs
//!
//! Labels and annotations added by others are carried over on update, along with
//! the live `resourceVersion` so concurrent writers surface as 409 conflicts.

use crate::constants::SPEC_HASH_ANNOTATION;
use crate::controller::client::ObjectClient;
use crate::crd::DatadogAgentStatus;
use crate::error::{ClientError, ConvergenceError};
use crate::observability::metrics;
use crate::util::canonical_json;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::Secret;
use kube::Resource;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Outcome of converging one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Created,
    Updated,
    Unchanged,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An object kind the controller converges
pub trait Converge: Resource<DynamicType = ()> + Clone + Send + Sync {
    const KIND: &'static str;

    /// Content owned by the controller, compared through its hash
    fn owned_content(&self) -> Result<Value, serde_json::Error>;

    /// Owned content kept out of the hash and compared against the live object
    fn unhashed_content_matches(&self, _live: &Self) -> bool {
        true
    }
}

impl Converge for DaemonSet {
    const KIND: &'static str = "DaemonSet";

    fn owned_content(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.spec)
    }
}

impl Converge for Deployment {
    const KIND: &'static str = "Deployment";

    fn owned_content(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.spec)
    }
}

impl Converge for Secret {
    const KIND: &'static str = "Secret";

    fn owned_content(&self) -> Result<Value, serde_json::Error> {
        let keys: Vec<&String> = self.data.iter().flat_map(BTreeMap::keys).collect();
        Ok(json!({
            "type": serde_json::to_value(&self.type_)?,
            "keys": keys,
        }))
    }

    fn unhashed_content_matches(&self, live: &Self) -> bool {
        self.data == live.data
    }
}

/// MD5 of the canonical JSON of the object's owned content
pub fn spec_hash<K: Converge>(obj: &K) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(&canonical_json(obj.owned_content()?))?;
    Ok(format!("{:x}", md5::compute(bytes)))
}

/// Converge `desired` and report the outcome to `update_status` on every
/// terminal branch, success or failure.
pub async fn converge<K, C, F>(
    client: &C,
    desired: K,
    status: &mut DatadogAgentStatus,
    update_status: F,
) -> Result<Operation, ConvergenceError>
where
    K: Converge,
    C: ObjectClient<K> + ?Sized,
    F: FnOnce(&mut DatadogAgentStatus, &Result<Operation, ConvergenceError>),
{
    let result = converge_object(client, desired).await;
    update_status(status, &result);
    result
}

async fn converge_object<K, C>(client: &C, mut desired: K) -> Result<Operation, ConvergenceError>
where
    K: Converge,
    C: ObjectClient<K> + ?Sized,
{
    let name = desired.meta().name.clone().unwrap_or_default();
    let fail = |e: ClientError| ConvergenceError::from_client(K::KIND, &name, e);

    let namespace = desired
        .meta()
        .namespace
        .clone()
        .ok_or_else(|| fail(ClientError::InvalidObject("object has no namespace".to_string())))?;
    let hash = spec_hash(&desired).map_err(|e| fail(ClientError::Serialization(e.to_string())))?;
    desired
        .meta_mut()
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(SPEC_HASH_ANNOTATION.to_string(), hash);

    let live = client.get(&namespace, &name).await.map_err(fail)?;

    let Some(live) = live else {
        client.create(&desired).await.map_err(fail)?;
        info!(kind = K::KIND, name = %name, namespace = %namespace, "Created object");
        metrics::increment_object_writes(K::KIND, Operation::Created.as_str());
        return Ok(Operation::Created);
    };

    if !needs_update(&live, &desired) && desired.unhashed_content_matches(&live) {
        debug!(kind = K::KIND, name = %name, "Object up to date");
        return Ok(Operation::Unchanged);
    }

    let live_meta = live.meta();
    let meta = desired.meta_mut();
    meta.resource_version.clone_from(&live_meta.resource_version);
    meta.labels = merged(live_meta.labels.as_ref(), meta.labels.take());
    meta.annotations = merged(live_meta.annotations.as_ref(), meta.annotations.take());

    client.update(&desired).await.map_err(fail)?;
    info!(kind = K::KIND, name = %name, namespace = %namespace, "Updated object");
    metrics::increment_object_writes(K::KIND, Operation::Updated.as_str());
    Ok(Operation::Updated)
}

/// Whether `live` differs from `desired` in anything the controller owns.
/// `desired` must already carry its hash annotation.
fn needs_update<K: Resource>(live: &K, desired: &K) -> bool {
    let live_meta = live.meta();
    let desired_meta = desired.meta();
    !is_subset(desired_meta.labels.as_ref(), live_meta.labels.as_ref())
        || !is_subset(desired_meta.annotations.as_ref(), live_meta.annotations.as_ref())
}

fn is_subset(
    wanted: Option<&BTreeMap<String, String>>,
    actual: Option<&BTreeMap<String, String>>,
) -> bool {
    let Some(wanted) = wanted else {
        return true;
    };
    wanted
        .iter()
        .all(|(k, v)| actual.and_then(|a| a.get(k)) == Some(v))
}

/// Live entries overlaid with desired ones
fn merged(
    live: Option<&BTreeMap<String, String>>,
    desired: Option<BTreeMap<String, String>>,
) -> Option<BTreeMap<String, String>> {
    match (live, desired) {
        (None, desired) => desired,
        (Some(live), None) => Some(live.clone()),
        (Some(live), Some(desired)) => {
            let mut out = live.clone();
            out.extend(desired);
            Some(out)
        }
    }
}
